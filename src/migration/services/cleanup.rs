//! Terminal cleanup sweep.
//!
//! Runs after every migration, whatever the run's outcome, so no space is
//! left stranded in import mode. The sweep lists every managed space,
//! completes the ones still importing, re-grants external access where it
//! was held before completion, and reapplies regular membership where the
//! pipeline never got to it. Running the sweep twice changes nothing the
//! second time.

use crate::migration::domain::{
    ChannelRecord, CleanupReport, ErrorRecord, MigrationContext, MigrationState, SpaceId,
};
use crate::migration::error::MigrationResult;
use crate::migration::ports::SpaceApi;
use crate::migration::services::{IdentityResolver, RetryPolicy};
use std::sync::Arc;
use tracing::{info, warn};

/// Sweeps destination spaces into a terminal state.
pub struct CleanupSweeper<S> {
    context: MigrationContext,
    spaces: Arc<S>,
    identity: Arc<IdentityResolver>,
    retry: RetryPolicy,
}

impl<S: SpaceApi> CleanupSweeper<S> {
    /// Creates a sweeper bound to one run's context and collaborators.
    #[must_use]
    pub fn new(context: MigrationContext, spaces: Arc<S>, identity: Arc<IdentityResolver>) -> Self {
        let retry = RetryPolicy::from_config(context.config());
        Self {
            context,
            spaces,
            identity,
            retry,
        }
    }

    /// Runs the sweep.
    ///
    /// # Errors
    ///
    /// Fails only when the managed-space listing itself fails; per-space
    /// failures are recorded in `state` and reflected in the report.
    pub async fn run(
        &self,
        channels: &[ChannelRecord],
        state: &mut MigrationState,
    ) -> MigrationResult<CleanupReport> {
        let managed = self
            .retry
            .run("list_spaces", || self.spaces.list_managed_spaces())
            .await?;

        let mut report = CleanupReport::default();
        for space in &managed {
            report.spaces_examined += 1;
            if state.deleted_spaces().contains(space.id()) {
                continue;
            }

            if space.import_mode() {
                self.complete_stuck_space(space.id(), state, &mut report)
                    .await;
            }
            if report.deleted.contains(space.id()) {
                continue;
            }

            if let Some(channel) =
                self.channel_for(space.id(), space.display_name(), channels, state)
                && !state.is_membership_complete(space.id())
            {
                self.reapply_membership(space.id(), channel, state, &mut report)
                    .await;
            }
        }

        if report.is_noop() {
            info!(
                examined = report.spaces_examined,
                "{}cleanup sweep found nothing to do",
                self.context.log_prefix()
            );
        } else {
            info!(
                examined = report.spaces_examined,
                completed = report.completed.len(),
                deleted = report.deleted.len(),
                memberships = report.memberships_reapplied.len(),
                "{}cleanup sweep finished",
                self.context.log_prefix()
            );
        }
        Ok(report)
    }

    async fn complete_stuck_space(
        &self,
        space: &SpaceId,
        state: &mut MigrationState,
        report: &mut CleanupReport,
    ) {
        let result = self
            .retry
            .run("complete_import", || self.spaces.complete_import(space))
            .await;
        match result {
            Ok(()) => {
                report.completed.push(space.clone());
                // Completing import resets the grant; restore it where the
                // run observed external members.
                if state.has_external_users(space) {
                    self.regrant_external_access(space, state).await;
                }
            }
            Err(error) => {
                warn!(space = %space, error = %error, "stuck space completion failed");
                state.record_error(ErrorRecord::run_scoped(
                    "complete_import",
                    format!("{space}: {error}"),
                ));
                if self.context.config().cleanup_on_error {
                    self.delete_stuck_space(space, state, report).await;
                } else {
                    report.needs_manual_completion.push(space.clone());
                }
            }
        }
    }

    async fn regrant_external_access(&self, space: &SpaceId, state: &mut MigrationState) {
        let result = self
            .retry
            .run("set_external", || {
                self.spaces.set_external_users_allowed(space)
            })
            .await;
        if let Err(error) = result {
            warn!(space = %space, error = %error, "external access re-grant failed");
            state.record_error(ErrorRecord::run_scoped(
                "set_external",
                format!("{space}: {error}"),
            ));
        }
    }

    async fn delete_stuck_space(
        &self,
        space: &SpaceId,
        state: &mut MigrationState,
        report: &mut CleanupReport,
    ) {
        let result = self
            .retry
            .run("delete_space", || self.spaces.delete_space(space))
            .await;
        match result {
            Ok(()) => {
                state.record_space_deleted(space.clone());
                report.deleted.push(space.clone());
            }
            Err(error) => {
                warn!(space = %space, error = %error, "stuck space deletion failed");
                state.record_error(ErrorRecord::run_scoped(
                    "delete_space",
                    format!("{space}: {error}"),
                ));
                report.needs_manual_completion.push(space.clone());
            }
        }
    }

    /// Resolves the source channel a space belongs to: the run's own
    /// space-to-channel map first, display name as fallback for spaces left
    /// over from earlier runs.
    fn channel_for<'a>(
        &self,
        space: &SpaceId,
        display_name: &str,
        channels: &'a [ChannelRecord],
        state: &MigrationState,
    ) -> Option<&'a ChannelRecord> {
        let name = state
            .channel_for_space(space)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| display_name.to_owned());
        channels.iter().find(|channel| channel.name() == name)
    }

    async fn reapply_membership(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
        report: &mut CleanupReport,
    ) {
        let mut all_added = true;
        let mut any_attempted = false;
        for user in channel.roster() {
            if self.context.config().ignore_bots && self.identity.is_bot(user) {
                continue;
            }
            let identity = self.identity.resolve(user, state);
            let Some(email) = identity.email().map(ToOwned::to_owned) else {
                continue;
            };
            any_attempted = true;

            let result = self
                .retry
                .run("add_member", || self.spaces.add_member(space, &email, false))
                .await;
            if let Err(error) = result {
                all_added = false;
                state.stats_mut(channel.name()).member_add_failures += 1;
                state.record_error(ErrorRecord::channel_scoped(
                    channel.name(),
                    "add_member",
                    error.to_string(),
                ));
            }
        }

        if any_attempted {
            report.memberships_reapplied.push(space.clone());
        }
        if all_added {
            state.record_membership_complete(space.clone());
        }
    }
}
