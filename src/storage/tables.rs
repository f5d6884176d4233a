//! Table inspection helpers used for verification and teardown sweeps.

use crate::config::{ConnectionConfig, Driver, TablePrefix};
use crate::errors::{HarnessError, Result};
use crate::storage::pool::DbPool;

/// Names of all base tables visible through `pool`, sorted
pub async fn list_tables(pool: &DbPool, driver: Driver) -> Result<Vec<String>> {
    let sql = match driver {
        Driver::Sqlite => {
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'"
        }
        Driver::Mysql => {
            "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'"
        }
        Driver::Pgsql => {
            "SELECT tablename::text FROM pg_tables WHERE schemaname = current_schema()"
        }
    };

    let mut tables: Vec<String> = sqlx::query_scalar(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| HarnessError::database(e, format!("Failed to list {} tables", driver)))?;
    tables.sort();
    Ok(tables)
}

/// Row count of the logical table `table`, resolved through `prefix`
pub async fn count_rows(pool: &DbPool, prefix: &TablePrefix, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}{}", prefix.for_table(table), table);
    sqlx::query_scalar(&sql)
        .fetch_one(pool)
        .await
        .map_err(|e| HarnessError::database(e, format!("Failed to count rows in '{}'", table)))
}

/// Drop every table whose name starts with the connection's default prefix.
///
/// Does nothing for an empty prefix, since that would match every table.
/// Matching is a plain `starts_with`, so it assumes primary prefixes of one
/// fixed length (`test` + digits in the Simpletest scheme). A shorter primary
/// prefix that is a leading part of another run's prefix would sweep that
/// run's tables too. Returns the dropped table names.
pub async fn sweep_prefixed_tables(
    pool: &DbPool,
    connection: &ConnectionConfig,
) -> Result<Vec<String>> {
    let prefix = connection.prefix.default_prefix();
    if prefix.is_empty() {
        return Ok(Vec::new());
    }

    let doomed: Vec<String> = list_tables(pool, connection.driver)
        .await?
        .into_iter()
        .filter(|table| table.starts_with(prefix))
        .collect();

    for table in &doomed {
        let quoted = quote_identifier(connection.driver, table);
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted))
            .execute(pool)
            .await
            .map_err(|e| HarnessError::database(e, format!("Failed to drop table '{}'", table)))?;
    }

    if !doomed.is_empty() {
        tracing::info!(prefix, dropped = doomed.len(), "Swept prefixed tables");
    }
    Ok(doomed)
}

fn quote_identifier(driver: Driver, name: &str) -> String {
    match driver {
        Driver::Mysql => format!("`{}`", name.replace('`', "``")),
        Driver::Sqlite | Driver::Pgsql => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}
