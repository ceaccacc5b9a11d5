//! Immutable per-run migration context.

use super::{MigrationConfig, RunId};
use std::sync::Arc;

/// Immutable context for one migration run.
///
/// Built once before the first channel and shared read-only (via `Arc`)
/// with every component; never mutated after construction.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    run_id: RunId,
    workspace_admin: String,
    export_root: String,
    config: Arc<MigrationConfig>,
    dry_run: bool,
}

impl MigrationContext {
    /// Creates the context for a run.
    #[must_use]
    pub fn new(
        workspace_admin: impl Into<String>,
        export_root: impl Into<String>,
        config: MigrationConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            workspace_admin: workspace_admin.into(),
            export_root: export_root.into(),
            config: Arc::new(config),
            dry_run,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the destination admin identity used for non-impersonated
    /// calls.
    #[must_use]
    pub fn workspace_admin(&self) -> &str {
        &self.workspace_admin
    }

    /// Returns the export root location, for reporting.
    #[must_use]
    pub fn export_root(&self) -> &str {
        &self.export_root
    }

    /// Returns the effective run configuration.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Returns a shared handle to the configuration.
    #[must_use]
    pub fn config_handle(&self) -> Arc<MigrationConfig> {
        Arc::clone(&self.config)
    }

    /// Returns true when the run is a dry-run forecast.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Mode-aware log prefix, empty for live runs.
    #[must_use]
    pub const fn log_prefix(&self) -> &'static str {
        if self.dry_run { "[DRY RUN] " } else { "" }
    }
}
