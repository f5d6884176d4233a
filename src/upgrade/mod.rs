//! # Upgrade Tests
//!
//! The harness driving an upgrade from a provisioned legacy source database
//! into the primary database, and the verification of its outcome.

pub mod harness;
pub mod runner;
pub mod verify;

pub use harness::{run_scenario, UpgradeHarness, UpgradeScenario};
pub use runner::{UpgradeRequest, UpgradeRunner};
pub use verify::{verify_entity_counts, CountReport, EntityCounts};
