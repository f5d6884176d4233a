//! # Configuration Management
//!
//! Loads harness configuration from an optional file layered under
//! `MIGRATE_HARNESS__*` environment variables.

pub mod settings;

pub use settings::{
    ConnectionConfig, DatabasePoolConfig, Driver, HarnessConfig, Isolation, LoggingConfig,
    TablePrefix, DEFAULT_SOURCE_ALIAS,
};

use crate::errors::{HarnessError, Result};
use std::path::Path;

/// Environment prefix for layered configuration keys
pub const ENV_PREFIX: &str = "MIGRATE_HARNESS";

/// Environment variables consulted for a primary connection URL, in order
pub const DB_URL_VARS: [&str; 2] = ["MIGRATE_HARNESS_DB_URL", "SIMPLETEST_DB"];

impl HarnessConfig {
    /// Load configuration from an optional file and the environment.
    ///
    /// Environment keys use `__` as the nesting separator, e.g.
    /// `MIGRATE_HARNESS__PRIMARY__DRIVER=sqlite`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__");
        builder = builder.add_source(env);

        let config: HarnessConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            driver = %config.primary.driver,
            source_alias = %config.source_alias,
            from_file = path.is_some(),
            "Harness configuration loaded"
        );
        Ok(config)
    }

    /// Create a configuration from the first database URL variable that is set
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = DB_URL_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|value| !value.is_empty()))
            .ok_or_else(|| {
                HarnessError::config(format!(
                    "none of {} is set; cannot determine the primary database",
                    DB_URL_VARS.join(", ")
                ))
            })?;

        let config = Self::new(ConnectionConfig::from_url(&url)?);
        config.validate()?;
        Ok(config)
    }
}
