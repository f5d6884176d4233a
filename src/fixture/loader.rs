//! # Fixture Loading
//!
//! Reads legacy-site fixtures and applies them to a provisioned source
//! connection. Fixtures are SQL scripts that name tables as `{table}`; paths
//! ending in `.gz` are gunzipped while reading.

use crate::config::{ConnectionConfig, Driver};
use crate::errors::{HarnessError, Result};
use crate::fixture::script::split_statements;
use crate::provision::ProvisionedConnection;
use crate::storage::{prefix_tables, ConnectionRegistry, DbPool};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// Extension marking a gzip-compressed fixture
pub const COMPRESSED_EXTENSION: &str = "gz";

/// A fixture script read into memory.
///
/// Statements are split when the fixture is applied, since literal escaping
/// depends on the target driver.
#[derive(Debug, Clone)]
pub struct Fixture {
    path: PathBuf,
    script: String,
}

/// Outcome of loading a fixture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureReport {
    pub path: PathBuf,
    /// Alias the statements were executed against
    pub alias: String,
    pub statements_executed: usize,
}

impl Fixture {
    /// Read a fixture, decompressing `.gz` files
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| HarnessError::fixture_load("cannot open fixture", path, Some(e)))?;

        let mut script = String::new();
        let compressed = is_compressed(path);
        let read = if compressed {
            GzDecoder::new(file).read_to_string(&mut script)
        } else {
            let mut file = file;
            file.read_to_string(&mut script)
        };
        read.map_err(|e| {
            let message = if compressed {
                "cannot decompress fixture"
            } else {
                "cannot read fixture"
            };
            HarnessError::fixture_load(message, path, Some(e))
        })?;

        tracing::debug!(
            path = %path.display(),
            compressed,
            bytes = script.len(),
            "Fixture read"
        );
        Ok(Self {
            path: path.to_path_buf(),
            script,
        })
    }

    /// Build a fixture from in-memory SQL
    pub fn from_sql<P: Into<PathBuf>>(label: P, script: &str) -> Self {
        Self {
            path: label.into(),
            script: script.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Statements of the script as `driver` would split them
    pub fn statements(&self, driver: Driver) -> Vec<String> {
        split_statements(&self.script, driver)
    }

    /// Execute every statement in order against `pool`, expanding `{table}`
    /// placeholders with the prefix of `connection`. Returns the number of
    /// statements executed.
    pub async fn apply(&self, pool: &DbPool, connection: &ConnectionConfig) -> Result<usize> {
        let statements = self.statements(connection.driver);
        for (index, statement) in statements.iter().enumerate() {
            let sql = prefix_tables(statement, &connection.prefix, connection.driver);
            sqlx::query(&sql).execute(pool).await.map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %self.path.display(),
                    statement = index + 1,
                    "Fixture statement failed"
                );
                HarnessError::database(
                    e,
                    format!(
                        "Fixture {} statement {} failed",
                        self.path.display(),
                        index + 1
                    ),
                )
            })?;
        }
        Ok(statements.len())
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == COMPRESSED_EXTENSION)
}

/// Load the fixture at `path` into the source connection `conn`.
///
/// `conn` is the registry's active connection while the statements run; the
/// previous active connection is restored afterwards whether or not loading
/// succeeded. Loading the same fixture twice applies it twice.
pub async fn load_fixture<P: AsRef<Path>>(
    registry: &mut ConnectionRegistry,
    conn: &ProvisionedConnection,
    path: P,
) -> Result<FixtureReport> {
    conn.ensure_provisioned("load_fixture")?;
    let fixture = Fixture::read(path)?;
    apply_to_connection(registry, conn, &fixture).await
}

/// Apply an already-read fixture to `conn` with the same scoped swap as
/// [`load_fixture`]
pub async fn apply_to_connection(
    registry: &mut ConnectionRegistry,
    conn: &ProvisionedConnection,
    fixture: &Fixture,
) -> Result<FixtureReport> {
    conn.ensure_provisioned("load_fixture")?;
    let span = tracing::info_span!(
        "load_fixture",
        alias = %conn.alias(),
        path = %fixture.path().display()
    );

    async {
        let mut guard = registry.activate(conn.alias())?;
        let pool = guard.active_pool().await?;
        let connection = guard.active_config().clone();
        let statements_executed = fixture.apply(&pool, &connection).await?;

        tracing::info!(
            statements = statements_executed,
            restoring = %guard.previous_alias(),
            "Fixture loaded"
        );
        Ok::<_, HarnessError>(FixtureReport {
            path: fixture.path().to_path_buf(),
            alias: conn.alias().to_string(),
            statements_executed,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabasePoolConfig;
    use crate::storage::create_pool;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    async fn sqlite_target(dir: &tempfile::TempDir, prefix: &str) -> (DbPool, ConnectionConfig) {
        let path = dir.path().join("apply.sqlite");
        let config = ConnectionConfig::sqlite(path.display().to_string()).with_prefix(prefix);
        let pool = create_pool(&config, &DatabasePoolConfig::default())
            .await
            .unwrap();
        (pool, config)
    }

    #[test]
    fn test_is_compressed() {
        assert!(is_compressed(Path::new("fixtures/drupal7.sql.gz")));
        assert!(!is_compressed(Path::new("fixtures/drupal7.sql")));
        assert!(!is_compressed(Path::new("fixtures/gz")));
    }

    #[test]
    fn test_read_plain_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.sql");
        let script = "CREATE TABLE {node} (nid INTEGER);\nINSERT INTO {node} VALUES (1);";
        std::fs::write(&path, script).unwrap();

        let fixture = Fixture::read(&path).unwrap();
        assert_eq!(fixture.statements(Driver::Sqlite).len(), 2);
        assert_eq!(fixture.path(), path.as_path());
    }

    #[test]
    fn test_read_gzipped_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.sql.gz");
        let script = b"INSERT INTO {users} VALUES (1);INSERT INTO {users} VALUES (2);";
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(script).unwrap();
        encoder.finish().unwrap();

        let fixture = Fixture::read(&path).unwrap();
        assert_eq!(
            fixture.statements(Driver::Sqlite),
            vec![
                "INSERT INTO {users} VALUES (1)".to_string(),
                "INSERT INTO {users} VALUES (2)".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_fixture() {
        let err = Fixture::read("/nonexistent/fixture.sql").unwrap_err();
        assert!(err.is_fixture_load());
    }

    #[test]
    fn test_corrupt_gzip_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.sql.gz");
        std::fs::write(&path, b"this is not gzip data").unwrap();

        let err = Fixture::read(&path).unwrap_err();
        assert!(err.is_fixture_load());
        assert!(err.to_string().contains("decompress"));
    }

    #[tokio::test]
    async fn test_apply_expands_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, config) = sqlite_target(&dir, "src_").await;

        let fixture = Fixture::from_sql(
            "inline.sql",
            "CREATE TABLE {node} (nid INTEGER); INSERT INTO {node} VALUES (1), (2);",
        );
        let executed = fixture.apply(&pool, &config).await.unwrap();
        assert_eq!(executed, 2);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM src_node")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_apply_keeps_trailing_backslash_literal_on_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, config) = sqlite_target(&dir, "src_").await;

        let fixture = Fixture::from_sql(
            "windows_paths.sql",
            r"CREATE TABLE {variable} (name TEXT, value TEXT);
INSERT INTO {variable} VALUES ('file_temporary_path', 'C:\');
INSERT INTO {variable} VALUES ('site_name', 'Legacy');",
        );
        assert_eq!(fixture.apply(&pool, &config).await.unwrap(), 3);

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, value FROM src_variable ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            rows,
            vec![
                ("file_temporary_path".to_string(), r"C:\".to_string()),
                ("site_name".to_string(), "Legacy".to_string()),
            ]
        );
    }
}
