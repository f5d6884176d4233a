//! # migrate-harness
//!
//! Test support for a content-management system's upgrade path. A test run
//! gets an isolated, disposable "legacy site" database next to the system's
//! primary database, loads a fixture snapshot into it, lets the upgrade
//! process migrate it, and checks what arrived.
//!
//! ## Architecture
//!
//! ```text
//! HarnessConfig → TestRun + ConnectionRegistry → provision() → ProvisionedConnection
//!                                                    ↓
//!                      load_fixture() → UpgradeRunner → verify_entity_counts()
//! ```
//!
//! - **Provisioning**: sqlite primaries get a fresh database file in the run's
//!   scratch directory; MySQL/PostgreSQL primaries get the primary table
//!   prefix with `0` appended.
//! - **Registry**: aliases to connection settings, owned by the run, with a
//!   scoped active-connection guard.
//! - **Fixtures**: SQL scripts (optionally gzipped) naming tables as `{table}`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use migrate_harness::{ConnectionConfig, HarnessConfig, Result, UpgradeHarness};
//!
//! # async fn example() -> Result<()> {
//! let config = HarnessConfig::new(ConnectionConfig::sqlite("/tmp/site.sqlite"));
//! let mut harness = UpgradeHarness::new(config)?;
//! harness.set_up()?;
//! harness.load_fixture("fixtures/drupal7.sql.gz").await?;
//! let credentials = harness.source_credentials()?;
//! # let _ = credentials;
//! harness.tear_down().await
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod fixture;
pub mod observability;
pub mod provision;
pub mod storage;
pub mod upgrade;

// Re-export commonly used types and traits
pub use config::{ConnectionConfig, Driver, HarnessConfig, TablePrefix};
pub use errors::{HarnessError, Result};
pub use fixture::{load_fixture, Fixture, FixtureReport};
pub use provision::{provision, ConnectionState, ProvisionedConnection, SourceCredentials, TestRun};
pub use storage::{ConnectionRegistry, DbPool};
pub use upgrade::{run_scenario, EntityCounts, UpgradeHarness, UpgradeRunner, UpgradeScenario};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
