//! Common test utilities for all integration tests.
//!
//! Provides sqlite-backed harness configuration, fixture writers and upgrade
//! runners standing in for the system's upgrade pipeline.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use migrate_harness::config::DatabasePoolConfig;
use migrate_harness::storage::{create_pool, prefix_tables};
use migrate_harness::upgrade::UpgradeRequest;
use migrate_harness::{ConnectionConfig, DbPool, HarnessConfig, UpgradeRunner};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A small legacy site: three nodes and two users
pub const LEGACY_SITE: &str = r#"
-- Legacy site snapshot
CREATE TABLE {node} (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
CREATE TABLE {users} (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
INSERT INTO {node} (id, title) VALUES (1, 'Welcome; first post');
INSERT INTO {node} (id, title) VALUES (2, 'About {us}');
INSERT INTO {node} (id, title) VALUES (3, 'Contact');
INSERT INTO {users} (id, title) VALUES (1, 'admin');
INSERT INTO {users} (id, title) VALUES (2, 'editor');
"#;

/// Rows appended on every load; no primary key, so repeated loads stack up
pub const APPEND_ONLY: &str = r#"
CREATE TABLE IF NOT EXISTS {watchdog} (message TEXT);
INSERT INTO {watchdog} (message) VALUES ('cron ran');
INSERT INTO {watchdog} (message) VALUES ('cache cleared');
"#;

/// Harness configuration whose primary is a sqlite file inside `dir`
pub fn sqlite_harness_config(dir: &TempDir) -> HarnessConfig {
    let primary = ConnectionConfig::sqlite(dir.path().join("primary.sqlite").display().to_string());
    let mut config = HarnessConfig::new(primary);
    config.scratch_root = Some(dir.path().to_path_buf());
    config.pool = DatabasePoolConfig {
        max_connections: 2,
        ..Default::default()
    };
    config
}

pub fn write_fixture(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sql).expect("write fixture");
    path
}

pub fn write_gz_fixture(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("create gz fixture");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(sql.as_bytes()).expect("compress fixture");
    encoder.finish().expect("finish gz fixture");
    path
}

pub async fn count(pool: &DbPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count rows")
}

/// Copies `(id, title)` rows of the listed tables from the source database
/// into same-named tables of the target database.
pub struct CopyTablesRunner {
    pub tables: Vec<&'static str>,
}

#[async_trait]
impl UpgradeRunner for CopyTablesRunner {
    async fn run_upgrade(&self, request: &UpgradeRequest, target: &DbPool) -> anyhow::Result<()> {
        let source_config = request.source.to_connection_config();
        let source = create_pool(&source_config, &DatabasePoolConfig::default())
            .await?;

        for table in &self.tables {
            let select = prefix_tables(
                &format!("SELECT id, title FROM {{{}}} ORDER BY id", table),
                &source_config.prefix,
                source_config.driver,
            );
            let rows: Vec<(i64, String)> = sqlx::query_as(&select).fetch_all(&source).await?;

            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, title TEXT NOT NULL)",
                table
            ))
            .execute(target)
            .await?;

            for (id, title) in rows {
                sqlx::query(&format!("INSERT INTO {} (id, title) VALUES (?, ?)", table))
                    .bind(id)
                    .bind(title)
                    .execute(target)
                    .await?;
            }
        }

        source.close().await;
        Ok(())
    }
}

/// An upgrade that always fails
pub struct FailingRunner;

#[async_trait]
impl UpgradeRunner for FailingRunner {
    async fn run_upgrade(&self, _request: &UpgradeRequest, _target: &DbPool) -> anyhow::Result<()> {
        anyhow::bail!("source database schema version is not supported")
    }
}
