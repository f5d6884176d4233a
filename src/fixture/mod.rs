//! # Fixtures
//!
//! Legacy-site snapshots loaded into the source database.

pub mod loader;
pub mod script;

pub use loader::{apply_to_connection, load_fixture, Fixture, FixtureReport, COMPRESSED_EXTENSION};
pub use script::split_statements;
