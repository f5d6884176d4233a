//! # Connection Registry
//!
//! Named database connections owned by a single test run. The primary
//! connection lives under [`DEFAULT_CONNECTION`]; other aliases are added by
//! provisioning and removed on release. One alias is "active" at a time and
//! [`ConnectionRegistry::activate`] swaps it for the lifetime of a guard.

use crate::config::{ConnectionConfig, DatabasePoolConfig};
use crate::errors::{HarnessError, Result};
use crate::storage::pool::{create_pool, DbPool};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// Alias of the primary connection
pub const DEFAULT_CONNECTION: &str = "default";

struct RegisteredConnection {
    config: ConnectionConfig,
    pool: Option<DbPool>,
}

impl RegisteredConnection {
    fn new(config: ConnectionConfig) -> Self {
        Self { config, pool: None }
    }
}

/// Alias to connection mapping with a current active alias
pub struct ConnectionRegistry {
    connections: HashMap<String, RegisteredConnection>,
    active: String,
    pool_config: DatabasePoolConfig,
}

impl ConnectionRegistry {
    /// Create a registry with `primary` registered and active
    pub fn new(primary: ConnectionConfig) -> Self {
        Self::with_pool_config(primary, DatabasePoolConfig::default())
    }

    pub fn with_pool_config(primary: ConnectionConfig, pool_config: DatabasePoolConfig) -> Self {
        let primary = RegisteredConnection::new(primary);
        let connections = HashMap::from([(DEFAULT_CONNECTION.to_string(), primary)]);
        Self {
            connections,
            active: DEFAULT_CONNECTION.to_string(),
            pool_config,
        }
    }

    /// Register `config` under `alias`
    pub fn add(&mut self, alias: &str, config: ConnectionConfig) -> Result<()> {
        if self.connections.contains_key(alias) {
            return Err(HarnessError::provisioning(format!(
                "connection alias '{}' is already registered",
                alias
            )));
        }

        tracing::debug!(
            alias,
            driver = %config.driver,
            location = %config.location(),
            "Connection registered"
        );
        let entry = RegisteredConnection::new(config);
        self.connections.insert(alias.to_string(), entry);
        Ok(())
    }

    /// Drop the registration for `alias` and its pool.
    ///
    /// Returns the removed configuration, or `None` when the alias was not
    /// registered. Removing the active alias makes the primary active again.
    pub fn remove(&mut self, alias: &str) -> Result<Option<ConnectionConfig>> {
        if alias == DEFAULT_CONNECTION {
            return Err(HarnessError::invalid_state(
                "removing the primary connection",
                "the registry is in use",
            ));
        }

        let removed = self.connections.remove(alias);
        if removed.is_some() && self.active == alias {
            tracing::warn!(alias, "Active connection removed; falling back to primary");
            self.active = DEFAULT_CONNECTION.to_string();
        }
        if removed.is_some() {
            tracing::debug!(alias, "Connection removed");
        }
        Ok(removed.map(|entry| entry.config))
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.connections.contains_key(alias)
    }

    pub fn config(&self, alias: &str) -> Option<&ConnectionConfig> {
        self.connections.get(alias).map(|entry| &entry.config)
    }

    pub fn primary(&self) -> &ConnectionConfig {
        // the primary entry cannot be removed
        &self.connections[DEFAULT_CONNECTION].config
    }

    /// Alias of the active connection
    pub fn active_alias(&self) -> &str {
        &self.active
    }

    pub fn active_config(&self) -> &ConnectionConfig {
        &self.connections[self.active.as_str()].config
    }

    /// Pool for `alias`, opened on first use
    pub async fn pool(&mut self, alias: &str) -> Result<DbPool> {
        let pool_config = self.pool_config.clone();
        let entry = self.connections.get_mut(alias).ok_or_else(|| {
            HarnessError::invalid_state(
                format!("using connection '{}'", alias),
                "it is not registered",
            )
        })?;

        if let Some(pool) = &entry.pool {
            return Ok(pool.clone());
        }

        let pool = create_pool(&entry.config, &pool_config).await?;
        entry.pool = Some(pool.clone());
        Ok(pool)
    }

    /// Pool for the active connection
    pub async fn active_pool(&mut self) -> Result<DbPool> {
        let alias = self.active.clone();
        self.pool(&alias).await
    }

    /// Make `alias` active until the returned guard is dropped
    pub fn activate(&mut self, alias: &str) -> Result<ActiveConnectionGuard<'_>> {
        if !self.contains(alias) {
            return Err(HarnessError::invalid_state(
                format!("activating connection '{}'", alias),
                "it is not registered",
            ));
        }

        let previous = std::mem::replace(&mut self.active, alias.to_string());
        tracing::trace!(from = %previous, to = alias, "Active connection swapped");
        Ok(ActiveConnectionGuard {
            registry: self,
            previous,
        })
    }

    /// Close every open pool
    pub async fn close_all(&mut self) {
        for (alias, entry) in self.connections.iter_mut() {
            if let Some(pool) = entry.pool.take() {
                pool.close().await;
                tracing::trace!(alias = %alias, "Connection pool closed");
            }
        }
    }
}

/// Restores the previously active connection when dropped
pub struct ActiveConnectionGuard<'a> {
    registry: &'a mut ConnectionRegistry,
    previous: String,
}

impl ActiveConnectionGuard<'_> {
    /// Alias that becomes active again on drop
    pub fn previous_alias(&self) -> &str {
        &self.previous
    }
}

impl Deref for ActiveConnectionGuard<'_> {
    type Target = ConnectionRegistry;

    fn deref(&self) -> &Self::Target {
        self.registry
    }
}

impl DerefMut for ActiveConnectionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.registry
    }
}

impl Drop for ActiveConnectionGuard<'_> {
    fn drop(&mut self) {
        // the previous alias may have been removed while the guard was held
        let restored = if self.registry.contains(&self.previous) {
            std::mem::take(&mut self.previous)
        } else {
            DEFAULT_CONNECTION.to_string()
        };
        tracing::trace!(to = %restored, "Active connection restored");
        self.registry.active = restored;
    }
}
