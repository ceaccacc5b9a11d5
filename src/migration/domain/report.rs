//! Run and cleanup report structures.

use super::{
    ChannelOutcome, ChannelStats, ErrorRecord, MigrationContext, MigrationState, SkippedReaction,
    SourceUserId, SpaceId, UnresolvedUser,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate counters across all channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Channels given an outcome other than `Excluded`.
    pub channels_processed: u64,
    /// Messages created at the destination.
    pub messages_created: u64,
    /// Messages that failed to import.
    pub messages_failed: u64,
    /// Reactions created at the destination.
    pub reactions_created: u64,
    /// Reactions recorded as skipped.
    pub reactions_skipped: u64,
    /// Distinct attachments uploaded.
    pub files_uploaded: usize,
    /// Source users with no resolvable email.
    pub users_without_email: usize,
}

/// One channel's slice of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReport {
    /// Terminal outcome of the channel's pipeline.
    pub outcome: ChannelOutcome,
    /// Counters accumulated for the channel.
    pub stats: ChannelStats,
}

/// An actionable follow-up surfaced by the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// What the recommendation concerns.
    pub subject: String,
    /// The suggested action.
    pub action: String,
}

/// Findings of the post-run cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Destination spaces listed during the sweep.
    pub spaces_examined: u64,
    /// Spaces whose import mode the sweep completed.
    pub completed: Vec<SpaceId>,
    /// Spaces deleted after exhausted completion retries.
    pub deleted: Vec<SpaceId>,
    /// Spaces left in import mode, needing manual completion.
    pub needs_manual_completion: Vec<SpaceId>,
    /// Spaces whose regular membership the sweep reapplied.
    pub memberships_reapplied: Vec<SpaceId>,
}

impl CleanupReport {
    /// Returns true when the sweep changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.completed.is_empty()
            && self.deleted.is_empty()
            && self.memberships_reapplied.is_empty()
    }
}

/// The final report of a migration run.
///
/// For a dry run this is semantically a forecast; the counting logic is
/// identical, only destination side effects differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of the run this report describes.
    pub run_id: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Whether the run was a dry-run forecast.
    pub dry_run: bool,
    /// Export location the run read from.
    pub export_root: String,
    /// Per-channel outcomes and counters.
    pub channels: BTreeMap<String, ChannelReport>,
    /// Aggregate counters.
    pub totals: RunTotals,
    /// Users with no resolvable destination email.
    pub users_without_email: Vec<UnresolvedUser>,
    /// Source users that resolved to an external email.
    pub external_identities: BTreeMap<SourceUserId, String>,
    /// Reactions recorded as skipped.
    pub skipped_reactions: Vec<SkippedReaction>,
    /// Non-fatal errors accumulated during the run.
    pub errors: Vec<ErrorRecord>,
    /// Actionable follow-ups.
    pub recommendations: Vec<Recommendation>,
    /// Findings of the terminal cleanup sweep.
    pub cleanup: CleanupReport,
}

impl RunReport {
    /// Assembles the report from accumulated run state.
    #[must_use]
    pub fn from_state(
        ctx: &MigrationContext,
        state: &MigrationState,
        cleanup: CleanupReport,
        clock: &impl Clock,
    ) -> Self {
        let channels: BTreeMap<String, ChannelReport> = state
            .outcomes()
            .iter()
            .map(|(name, outcome)| {
                let stats = state.stats(name).cloned().unwrap_or_default();
                (
                    name.clone(),
                    ChannelReport {
                        outcome: *outcome,
                        stats,
                    },
                )
            })
            .collect();

        let mut totals = RunTotals {
            users_without_email: state.users_without_email().len(),
            files_uploaded: state.uploaded_count(),
            ..RunTotals::default()
        };
        for report in channels.values() {
            if report.outcome != ChannelOutcome::Excluded {
                totals.channels_processed += 1;
            }
            totals.messages_created += report.stats.created_messages;
            totals.messages_failed += report.stats.failed_messages;
            totals.reactions_created += report.stats.reactions_created;
            totals.reactions_skipped += report.stats.reactions_skipped;
        }

        let external_identities: BTreeMap<SourceUserId, String> = state
            .resolutions()
            .iter()
            .filter(|(_, identity)| identity.is_external())
            .filter_map(|(id, identity)| {
                identity.email().map(|email| (id.clone(), email.to_owned()))
            })
            .collect();

        let recommendations =
            Self::build_recommendations(&channels, state, &external_identities, &cleanup);

        Self {
            run_id: ctx.run_id().to_string(),
            generated_at: clock.utc(),
            dry_run: ctx.dry_run(),
            export_root: ctx.export_root().to_owned(),
            channels,
            totals,
            users_without_email: state.users_without_email().to_vec(),
            external_identities,
            skipped_reactions: state.skipped_reactions().to_vec(),
            errors: state.errors().to_vec(),
            recommendations,
            cleanup,
        }
    }

    fn build_recommendations(
        channels: &BTreeMap<String, ChannelReport>,
        state: &MigrationState,
        external_identities: &BTreeMap<SourceUserId, String>,
        cleanup: &CleanupReport,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for (name, report) in channels {
            if report.outcome == ChannelOutcome::SkippedDueToFailures {
                recommendations.push(Recommendation {
                    subject: format!("channel {name}"),
                    action: format!(
                        "{} of {} messages failed; inspect the error records and re-run \
                         this channel",
                        report.stats.failed_messages, report.stats.attempted_messages
                    ),
                });
            }
        }

        if !state.users_without_email().is_empty() {
            recommendations.push(Recommendation {
                subject: "users without email".to_owned(),
                action: format!(
                    "{} users have no resolvable email; add user_overrides entries for them",
                    state.users_without_email().len()
                ),
            });
        }

        if !external_identities.is_empty() {
            recommendations.push(Recommendation {
                subject: "external identities".to_owned(),
                action: format!(
                    "{} users resolved to external emails; verify the mappings are intended",
                    external_identities.len()
                ),
            });
        }

        if !cleanup.needs_manual_completion.is_empty() {
            recommendations.push(Recommendation {
                subject: "stuck spaces".to_owned(),
                action: format!(
                    "{} spaces remain in import mode and need manual completion",
                    cleanup.needs_manual_completion.len()
                ),
            });
        }

        recommendations
    }
}
