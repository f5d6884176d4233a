//! # Upgrade Harness
//!
//! Lifecycle of one upgrade test: provision the source database, load a
//! legacy-site fixture into it, let an [`UpgradeRunner`] migrate it into the
//! primary database, check entity counts, and tear everything down.

use crate::config::{HarnessConfig, Isolation};
use crate::errors::{HarnessError, Result};
use crate::fixture::{load_fixture, FixtureReport};
use crate::observability::init_logging;
use crate::provision::{provision, ProvisionedConnection, SourceCredentials, TestRun};
use crate::storage::{
    check_connection, sweep_prefixed_tables, ConnectionRegistry, DbPool, DEFAULT_CONNECTION,
};
use crate::upgrade::runner::{UpgradeRequest, UpgradeRunner};
use crate::upgrade::verify::{verify_entity_counts, CountReport, EntityCounts};
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// A complete upgrade test case
#[derive(Debug, Clone)]
pub struct UpgradeScenario {
    /// Legacy-site fixture, optionally gzipped
    pub fixture: PathBuf,
    /// Public files of the legacy site, passed through to the runner
    pub source_base_path: Option<String>,
    /// Expected row counts in the primary database after the upgrade
    pub expected: EntityCounts,
}

/// Harness state for a single upgrade test
pub struct UpgradeHarness {
    config: HarnessConfig,
    test_id: String,
    run: Option<TestRun>,
    registry: ConnectionRegistry,
    source: Option<ProvisionedConnection>,
}

impl UpgradeHarness {
    /// Create the test run and registry. Nothing is provisioned yet.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        init_logging(&config.logging);

        let run = match &config.scratch_root {
            Some(root) => TestRun::in_dir(root)?,
            None => TestRun::new()?,
        };
        let registry =
            ConnectionRegistry::with_pool_config(config.primary.clone(), config.pool.clone());

        Ok(Self {
            test_id: run.id().to_string(),
            config,
            run: Some(run),
            registry,
            source: None,
        })
    }

    /// Provision and register the source database
    pub fn set_up(&mut self) -> Result<&ProvisionedConnection> {
        if let Some(source) = &self.source {
            return Err(HarnessError::invalid_state(
                "set_up",
                format!("source is {}", source.state()),
            ));
        }
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| HarnessError::invalid_state("set_up", "the test run is closed"))?;

        let source = provision(
            &self.config.primary,
            run,
            &mut self.registry,
            &self.config.source_alias,
        )?;
        Ok(&*self.source.insert(source))
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Scratch directory of the run, until tear-down closes it
    pub fn files_dir(&self) -> Option<&Path> {
        self.run.as_ref().map(TestRun::files_dir)
    }

    pub fn registry(&mut self) -> &mut ConnectionRegistry {
        &mut self.registry
    }

    fn source(&self, operation: &str) -> Result<&ProvisionedConnection> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| HarnessError::invalid_state(operation, "unprovisioned"))?;
        source.ensure_provisioned(operation)?;
        Ok(source)
    }

    /// The provisioned source connection
    pub fn source_connection(&self) -> Result<&ProvisionedConnection> {
        self.source("source_connection")
    }

    pub async fn load_fixture<P: AsRef<Path>>(&mut self, path: P) -> Result<FixtureReport> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| HarnessError::invalid_state("load_fixture", "unprovisioned"))?;
        load_fixture(&mut self.registry, source, path).await
    }

    pub fn source_credentials(&self) -> Result<SourceCredentials> {
        self.source("source_credentials")?.credentials()
    }

    pub async fn source_pool(&mut self) -> Result<DbPool> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| HarnessError::invalid_state("source_pool", "unprovisioned"))?;
        source.pool(&mut self.registry).await
    }

    pub async fn primary_pool(&mut self) -> Result<DbPool> {
        self.registry.pool(DEFAULT_CONNECTION).await
    }

    /// Hand the source credentials to `runner` and let it upgrade into the
    /// primary database
    pub async fn perform_upgrade(
        &mut self,
        runner: &dyn UpgradeRunner,
        source_base_path: Option<&str>,
    ) -> Result<()> {
        let request = UpgradeRequest {
            source: self.source_credentials()?,
            source_base_path: source_base_path.map(str::to_string),
        };
        let target = self.primary_pool().await?;
        check_connection(&target).await?;

        tracing::info!(
            test_id = %self.test_id,
            driver = %request.source.driver,
            source_prefix = %request.source.prefix,
            "Running upgrade"
        );
        runner.run_upgrade(&request, &target).await.map_err(|source| {
            tracing::error!(test_id = %self.test_id, error = %source, "Upgrade failed");
            HarnessError::Upgrade { source }
        })?;
        tracing::info!(test_id = %self.test_id, "Upgrade completed");
        Ok(())
    }

    /// Check row counts in the primary database
    pub async fn verify_entity_counts(&mut self, expected: &EntityCounts) -> Result<CountReport> {
        let pool = self.primary_pool().await?;
        let prefix = self.registry.primary().prefix.clone();
        verify_entity_counts(&pool, &prefix, expected).await
    }

    /// Release the source connection, sweep its prefixed tables and remove
    /// the scratch directory.
    ///
    /// Every step is attempted; the first failure is returned.
    pub async fn tear_down(&mut self) -> Result<()> {
        let mut first_error: Option<HarnessError> = None;

        if let Some(source) = self.source.as_mut() {
            if !source.is_released() {
                if let Err(e) = sweep_source_tables(&mut self.registry, source).await {
                    tracing::warn!(
                        test_id = %self.test_id,
                        error = %e,
                        "Source table sweep failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
            if let Err(e) = source.release(&mut self.registry) {
                first_error.get_or_insert(e);
            }
        }

        self.registry.close_all().await;

        if let Some(run) = self.run.take() {
            if let Err(e) = run.close() {
                tracing::warn!(
                    test_id = %self.test_id,
                    error = %e,
                    "Scratch directory cleanup failed"
                );
                first_error.get_or_insert(e);
            }
        }

        tracing::debug!(
            test_id = %self.test_id,
            clean = first_error.is_none(),
            "Harness torn down"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn execute(
        &mut self,
        scenario: &UpgradeScenario,
        runner: &dyn UpgradeRunner,
    ) -> Result<CountReport> {
        self.set_up()?;
        self.load_fixture(&scenario.fixture).await?;
        let source_base_path = scenario.source_base_path.as_deref();
        self.perform_upgrade(runner, source_base_path).await?;
        self.verify_entity_counts(&scenario.expected).await
    }
}

/// Drop tables created under the source prefix on a shared server
async fn sweep_source_tables(
    registry: &mut ConnectionRegistry,
    source: &ProvisionedConnection,
) -> Result<()> {
    let config = source.config()?.clone();
    if config.driver.isolation() != Isolation::Prefix {
        return Ok(());
    }
    let pool = source.pool(registry).await?;
    sweep_prefixed_tables(&pool, &config).await?;
    Ok(())
}

impl Drop for UpgradeHarness {
    fn drop(&mut self) {
        if let Some(source) = self.source.as_mut() {
            if !source.is_released() {
                tracing::warn!(test_id = %self.test_id, "Harness dropped without tear_down");
                let _ = source.release(&mut self.registry);
            }
        }
    }
}

/// Run `scenario` end to end. Tear-down runs whether or not the scenario
/// succeeds; a scenario failure takes precedence over a tear-down failure.
pub async fn run_scenario(
    config: HarnessConfig,
    scenario: &UpgradeScenario,
    runner: &dyn UpgradeRunner,
) -> Result<CountReport> {
    let mut harness = UpgradeHarness::new(config)?;
    let span = crate::harness_span!("run_scenario", harness.test_id());

    async move {
        let outcome = harness.execute(scenario, runner).await;
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "Upgrade scenario failed; tearing down");
        }
        let teardown = harness.tear_down().await;

        match (outcome, teardown) {
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
            (Ok(report), Ok(())) => Ok(report),
        }
    }
    .instrument(span)
    .await
}
