//! # Error Handling
//!
//! Error types shared by the provisioner, fixture loader and upgrade harness.

pub mod types;

pub use types::{HarnessError, Result};
