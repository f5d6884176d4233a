//! The external upgrade process seam.

use crate::provision::SourceCredentials;
use crate::storage::DbPool;
use async_trait::async_trait;
use serde::Serialize;

/// What the upgrade process is told about the legacy site
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeRequest {
    /// Credentials of the provisioned source database
    pub source: SourceCredentials,
    /// Location of the legacy site's public files, if the test has any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_base_path: Option<String>,
}

/// Runs the system's upgrade pipeline from a legacy source database into the
/// primary database.
///
/// Implementations drive whatever the system exposes (a wizard, a command, a
/// library call). The harness only checks the outcome.
#[async_trait]
pub trait UpgradeRunner: Send + Sync {
    async fn run_upgrade(&self, request: &UpgradeRequest, target: &DbPool) -> anyhow::Result<()>;
}
