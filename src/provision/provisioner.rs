//! # Source Database Provisioning
//!
//! Derives an isolated secondary connection from the primary one and
//! registers it for the duration of a test run.
//!
//! File-based drivers get a fresh database file in the run's scratch
//! directory. Prefix-based drivers share the primary server and get the
//! primary prefix extended by [`SOURCE_PREFIX_SUFFIX`]; the run's table sweep
//! removes everything under the primary prefix, so the extended prefix is
//! cleaned up with it.
//!
//! Isolation between parallel runs on a shared server relies on each run
//! already owning a unique primary prefix. That is a precondition of
//! [`provision`], not something it checks.

use crate::config::{ConnectionConfig, Driver, Isolation, TablePrefix};
use crate::errors::{HarnessError, Result};
use crate::provision::TestRun;
use crate::storage::{ConnectionRegistry, DbPool};
use serde::Serialize;
use std::fs::OpenOptions;

/// Appended to the primary table prefix for prefix-based isolation
pub const SOURCE_PREFIX_SUFFIX: &str = "0";

/// File name suffix of a file-based source database
pub const SOURCE_FILE_SUFFIX: &str = "-migrate.db.sqlite";

/// Lifecycle state of a provisioned connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Provisioned,
    Released,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Provisioned => write!(f, "provisioned"),
            ConnectionState::Released => write!(f, "released"),
        }
    }
}

/// Credentials of the source database as handed to an upgrade process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCredentials {
    pub driver: Driver,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// The connection's default table prefix
    pub prefix: String,
}

impl From<&ConnectionConfig> for SourceCredentials {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            driver: config.driver,
            database: config.database.clone(),
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            prefix: config.prefix.default_prefix().to_string(),
        }
    }
}

impl SourceCredentials {
    /// Connection settings an upgrade process can open the source with
    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            driver: self.driver,
            database: self.database.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            prefix: TablePrefix::Single(self.prefix.clone()),
        }
    }
}

/// A registered alias for an isolated source database
#[derive(Debug)]
pub struct ProvisionedConnection {
    alias: String,
    config: ConnectionConfig,
    state: ConnectionState,
}

/// Derive the source connection configuration for `run` from `primary`.
///
/// Pure: no file is created and nothing is registered.
pub fn derive_source_config(primary: &ConnectionConfig, run: &TestRun) -> ConnectionConfig {
    let mut config = primary.clone();
    match primary.driver.isolation() {
        Isolation::File => {
            let name = format!("{}{}", run.id(), SOURCE_FILE_SUFFIX);
            let file = run.files_dir().join(name);
            config.database = file.display().to_string();
            config.prefix = TablePrefix::default();
        }
        Isolation::Prefix => {
            config.prefix = TablePrefix::Single(format!(
                "{}{}",
                primary.prefix.default_prefix(),
                SOURCE_PREFIX_SUFFIX
            ));
        }
    }
    config
}

/// Provision an isolated source database and register it under `alias`.
///
/// For file-based drivers the database file is created empty before
/// registration. Fails with a provisioning error if the alias is taken or the
/// file cannot be created.
pub fn provision(
    primary: &ConnectionConfig,
    run: &TestRun,
    registry: &mut ConnectionRegistry,
    alias: &str,
) -> Result<ProvisionedConnection> {
    let span = crate::harness_span!("provision", run.id(), alias = alias);
    let _entered = span.enter();

    if registry.contains(alias) {
        return Err(HarnessError::provisioning(format!(
            "connection alias '{}' is already registered",
            alias
        )));
    }

    let config = derive_source_config(primary, run);
    if config.driver.isolation() == Isolation::File {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&config.database)
            .map_err(|e| {
                HarnessError::provisioning_io(
                    format!("cannot create source database file {}", config.database),
                    e,
                )
            })?;
    }

    registry.add(alias, config.clone())?;

    tracing::info!(
        alias,
        driver = %config.driver,
        location = %config.location(),
        prefix = %config.prefix.default_prefix(),
        "Source database provisioned"
    );

    Ok(ProvisionedConnection {
        alias: alias.to_string(),
        config,
        state: ConnectionState::Provisioned,
    })
}

impl ProvisionedConnection {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.state == ConnectionState::Released
    }

    /// Fail with an invalid state error unless still provisioned
    pub fn ensure_provisioned(&self, operation: &str) -> Result<()> {
        match self.state {
            ConnectionState::Provisioned => Ok(()),
            state => Err(HarnessError::invalid_state(
                format!("{} on '{}'", operation, self.alias),
                state.to_string(),
            )),
        }
    }

    /// Resolved configuration of the source database
    pub fn config(&self) -> Result<&ConnectionConfig> {
        self.ensure_provisioned("config")?;
        Ok(&self.config)
    }

    pub fn credentials(&self) -> Result<SourceCredentials> {
        self.ensure_provisioned("credentials")?;
        Ok(SourceCredentials::from(&self.config))
    }

    /// Pool for the source database, opened through the registry
    pub async fn pool(&self, registry: &mut ConnectionRegistry) -> Result<DbPool> {
        self.ensure_provisioned("pool")?;
        registry.pool(&self.alias).await
    }

    /// Unregister the alias. Releasing twice is a no-op.
    ///
    /// The backing file stays in the run's scratch directory until the run
    /// is closed.
    pub fn release(&mut self, registry: &mut ConnectionRegistry) -> Result<()> {
        if self.state == ConnectionState::Released {
            tracing::trace!(alias = %self.alias, "Source connection already released");
            return Ok(());
        }

        registry.remove(&self.alias)?;
        self.state = ConnectionState::Released;
        tracing::info!(alias = %self.alias, "Source connection released");
        Ok(())
    }
}
