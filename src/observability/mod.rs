//! # Observability Infrastructure
//!
//! Structured logging for the harness lifecycle.

pub mod logging;

pub use logging::init_logging;
