//! # Storage and Persistence
//!
//! Connection pools, the per-run connection registry and table helpers.

pub mod pool;
pub mod prefix;
pub mod registry;
pub mod tables;

pub use pool::{create_pool, sanitize_url, DbPool};
pub use prefix::prefix_tables;
pub use registry::{ActiveConnectionGuard, ConnectionRegistry, DEFAULT_CONNECTION};
pub use tables::{count_rows, list_tables, sweep_prefixed_tables};

use crate::errors::{HarnessError, Result};

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| HarnessError::database(e, "Database connectivity check failed"))?;

    Ok(())
}
