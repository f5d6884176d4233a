//! Per-test run identity and scratch directory.

use crate::errors::{HarnessError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use uuid::Uuid;

/// Counter for generating unique run ids within a process
static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a run id unique across processes and within this one
fn unique_run_id() -> String {
    let counter = RUN_COUNTER.fetch_add(1, Ordering::SeqCst);
    let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
    format!("test{}_{}_{}", std::process::id(), counter, uuid_short)
}

/// One test run: a unique id plus a scratch directory that is removed
/// recursively when the run is dropped or closed.
#[derive(Debug)]
pub struct TestRun {
    id: String,
    files_dir: TempDir,
}

impl TestRun {
    /// Create a run with its scratch directory in the system temp dir
    pub fn new() -> Result<Self> {
        Self::create(None)
    }

    /// Create a run with its scratch directory under `root`
    pub fn in_dir(root: &Path) -> Result<Self> {
        Self::create(Some(root))
    }

    fn create(root: Option<&Path>) -> Result<Self> {
        let id = unique_run_id();
        let suffix = format!("-{}", id);
        let mut builder = tempfile::Builder::new();
        builder.prefix("migrate-harness-").suffix(&suffix);

        let location = root.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let files_dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            HarnessError::provisioning_io(
                format!("cannot create scratch directory in {}", location.display()),
                e,
            )
        })?;

        tracing::debug!(
            test_id = %id,
            files_dir = %files_dir.path().display(),
            "Test run created"
        );
        Ok(Self { id, files_dir })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Scratch directory owned by this run
    pub fn files_dir(&self) -> &Path {
        self.files_dir.path()
    }

    /// Remove the scratch directory, reporting failures instead of ignoring them
    pub fn close(self) -> Result<()> {
        let path = self.files_dir.path().display().to_string();
        self.files_dir
            .close()
            .map_err(|e| HarnessError::from(e).add_context(&format!("Removing {}", path)))?;
        tracing::debug!(test_id = %self.id, "Test run scratch directory removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = TestRun::new().unwrap();
        let b = TestRun::new().unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.files_dir(), b.files_dir());
        assert!(a.id().starts_with("test"));
    }

    #[test]
    fn test_files_dir_removed_on_drop() {
        let path = {
            let run = TestRun::new().unwrap();
            std::fs::write(run.files_dir().join("leftover.sqlite"), b"").unwrap();
            run.files_dir().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_close_removes_files_dir() {
        let root = tempfile::tempdir().unwrap();
        let run = TestRun::in_dir(root.path()).unwrap();
        let path = run.files_dir().to_path_buf();
        assert!(path.starts_with(root.path()));
        run.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_root_is_provisioning_error() {
        let err = TestRun::in_dir(Path::new("/nonexistent/scratch/root")).unwrap_err();
        assert!(err.is_provisioning());
    }
}
