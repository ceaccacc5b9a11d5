//! Run coordinator.
//!
//! Owns the run: validates configuration, loads the export, drives one
//! channel pipeline at a time, always runs the terminal cleanup sweep, and
//! assembles the final report. The mutable run state lives here and is
//! threaded through every step by mutable reference.

use crate::migration::domain::{
    ChannelOutcome, ChannelRecord, CleanupReport, ErrorRecord, MigrationContext, MigrationState,
    RunReport,
};
use crate::migration::error::{MigrationError, MigrationResult};
use crate::migration::ports::{ExportReader, FileApi, SpaceApi};
use crate::migration::services::{ChannelPipeline, CleanupSweeper, IdentityResolver};
use mockable::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Drives a full migration run from export to report.
pub struct MigrationCoordinator<S, F, C> {
    context: MigrationContext,
    spaces: Arc<S>,
    files: Arc<F>,
    clock: Arc<C>,
    cancel: Arc<AtomicBool>,
}

impl<S: SpaceApi, F: FileApi, C: Clock> MigrationCoordinator<S, F, C> {
    /// Creates a coordinator over the given destination adapters.
    #[must_use]
    pub fn new(context: MigrationContext, spaces: Arc<S>, files: Arc<F>, clock: Arc<C>) -> Self {
        Self {
            context,
            spaces,
            files,
            clock,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the cancellation flag; setting it stops the run at the next
    /// message boundary, after which the cleanup sweep still runs.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Runs the migration against the given export.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Configuration`] for invalid settings and
    /// [`MigrationError::Export`] when the archive cannot be read; both
    /// occur before any destination mutation. Later failures are recorded
    /// in the report instead.
    pub async fn run<R: ExportReader>(&self, reader: &R) -> MigrationResult<RunReport> {
        self.context.config().validate()?;

        let users = reader.load_users().await?;
        let channels = reader.load_channels().await?;
        info!(
            users = users.len(),
            channels = channels.len(),
            "{}loaded export archive",
            self.context.log_prefix()
        );

        let known: Vec<&str> = channels.iter().map(ChannelRecord::name).collect();
        for entry in self.context.config().unmatched_filter_entries(&known) {
            warn!(entry, "channel filter entry matches no exported channel");
        }

        let identity = Arc::new(IdentityResolver::new(self.context.config_handle(), users));
        let pipeline = ChannelPipeline::new(
            self.context.clone(),
            Arc::clone(&self.spaces),
            Arc::clone(&self.files),
            Arc::clone(&identity),
            Arc::clone(&self.cancel),
        );
        let sweeper = CleanupSweeper::new(
            self.context.clone(),
            Arc::clone(&self.spaces),
            Arc::clone(&identity),
        );

        let mut state = MigrationState::new();
        self.run_channels(&pipeline, &channels, &mut state).await;

        let cleanup = match sweeper.run(&channels, &mut state).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "cleanup sweep could not list managed spaces");
                state.record_error(ErrorRecord::run_scoped("cleanup_sweep", err.to_string()));
                CleanupReport::default()
            }
        };

        Ok(RunReport::from_state(
            &self.context,
            &state,
            cleanup,
            self.clock.as_ref(),
        ))
    }

    async fn run_channels(
        &self,
        pipeline: &ChannelPipeline<S, F>,
        channels: &[ChannelRecord],
        state: &mut MigrationState,
    ) {
        let mut halted = false;
        for channel in channels {
            let name = channel.name();
            if halted || self.cancel.load(Ordering::SeqCst) {
                state.record_outcome(name, ChannelOutcome::Aborted);
                continue;
            }
            if !self.context.config().should_process(name) {
                info!(channel = name, "channel excluded by configuration");
                state.record_outcome(name, ChannelOutcome::Excluded);
                continue;
            }

            match pipeline.run(channel, state).await {
                Ok(ChannelOutcome::Aborted) => {
                    halted = true;
                }
                Ok(_) => {}
                Err(err @ MigrationError::ThresholdExceeded { .. }) => {
                    error!(channel = name, error = %err, "halting run");
                    state.record_error(ErrorRecord::run_scoped("abort_on_error", err.to_string()));
                    halted = true;
                }
                Err(err) => {
                    // Creation failures skip the channel; `Aborted` is
                    // reserved for channels the halt never reached.
                    error!(channel = name, error = %err, "channel failed");
                    state.record_outcome(name, ChannelOutcome::SkippedDueToFailures);
                    state.record_error(ErrorRecord::channel_scoped(
                        name,
                        "create_space",
                        err.to_string(),
                    ));
                    if self.context.config().abort_on_error {
                        halted = true;
                    }
                }
            }
        }
    }
}
