//! Mutable run state, owned by the coordinator.
//!
//! `MigrationState` is threaded explicitly (by mutable reference) through
//! every pipeline step rather than living in process-wide scope. Pipeline
//! steps may only append to it, never remove.

use super::{Fingerprint, FileRef, ResolvedIdentity, SourceUserId, SpaceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-channel counters accumulated during a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Messages the pipeline attempted to import.
    pub attempted_messages: u64,
    /// Messages created at the destination.
    pub created_messages: u64,
    /// Messages that failed to import.
    pub failed_messages: u64,
    /// Reactions re-issued at the destination.
    pub reactions_created: u64,
    /// Reactions skipped because the reactor had no usable identity.
    pub reactions_skipped: u64,
    /// Reactions whose destination call failed.
    pub reactions_failed: u64,
    /// Attachments uploaded (deduplicated uploads count once).
    pub files_uploaded: u64,
    /// Membership adds that failed, historical and regular combined.
    pub member_add_failures: u64,
    /// Non-fatal failures outside the message loop (metadata post, import
    /// completion).
    pub other_errors: u64,
}

impl ChannelStats {
    /// Total error count used by the `skip_on_error` completion strategy.
    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.failed_messages + self.reactions_failed + self.member_add_failures + self.other_errors
    }
}

/// Terminal state of one channel's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOutcome {
    /// All steps ran; the space reached its configured terminal state.
    Completed,
    /// The channel was skipped mid-run after too many failures.
    SkippedDueToFailures,
    /// The run was halted before or during this channel.
    Aborted,
    /// Channel filtered out by the include/exclude configuration.
    Excluded,
}

impl std::fmt::Display for ChannelOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Completed => "completed",
            Self::SkippedDueToFailures => "skipped_due_to_failures",
            Self::Aborted => "aborted",
            Self::Excluded => "excluded",
        };
        write!(f, "{text}")
    }
}

/// One recorded non-fatal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Channel the failure occurred in, when channel-scoped.
    pub channel: Option<String>,
    /// The remote operation or pipeline step that failed.
    pub operation: String,
    /// Human-readable failure detail.
    pub detail: String,
}

impl ErrorRecord {
    /// Creates an error record scoped to a channel.
    #[must_use]
    pub fn channel_scoped(
        channel: impl Into<String>,
        operation: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            channel: Some(channel.into()),
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Creates an error record with run scope.
    #[must_use]
    pub fn run_scoped(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            channel: None,
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

/// A reaction that was recorded as skipped instead of attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedReaction {
    /// Channel the reaction belonged to.
    pub channel: String,
    /// Emoji name.
    pub emoji: String,
    /// The reactor whose identity could not be used.
    pub reactor: SourceUserId,
}

/// A source user with no resolvable destination email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedUser {
    /// Source user identifier.
    pub id: SourceUserId,
    /// Source display name.
    pub name: String,
    /// Whether the user is a bot or app user.
    pub is_bot: bool,
}

/// All mutable tracking state for one migration run.
#[derive(Debug, Default)]
pub struct MigrationState {
    channel_stats: BTreeMap<String, ChannelStats>,
    outcomes: BTreeMap<String, ChannelOutcome>,
    uploads: HashMap<Fingerprint, FileRef>,
    spaces: BTreeMap<SpaceId, String>,
    deleted_spaces: BTreeSet<SpaceId>,
    membership_complete: BTreeSet<SpaceId>,
    external_spaces: BTreeSet<SpaceId>,
    resolutions: BTreeMap<SourceUserId, ResolvedIdentity>,
    users_without_email: Vec<UnresolvedUser>,
    skipped_reactions: Vec<SkippedReaction>,
    errors: Vec<ErrorRecord>,
}

impl MigrationState {
    /// Creates empty run state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters for a channel, creating them on first access.
    pub fn stats_mut(&mut self, channel: &str) -> &mut ChannelStats {
        self.channel_stats.entry(channel.to_owned()).or_default()
    }

    /// Returns the counters recorded for a channel.
    #[must_use]
    pub fn stats(&self, channel: &str) -> Option<&ChannelStats> {
        self.channel_stats.get(channel)
    }

    /// Returns all per-channel counters.
    #[must_use]
    pub const fn all_stats(&self) -> &BTreeMap<String, ChannelStats> {
        &self.channel_stats
    }

    /// Records a channel's terminal outcome.
    pub fn record_outcome(&mut self, channel: &str, outcome: ChannelOutcome) {
        self.outcomes.insert(channel.to_owned(), outcome);
    }

    /// Returns a channel's recorded outcome.
    #[must_use]
    pub fn outcome(&self, channel: &str) -> Option<ChannelOutcome> {
        self.outcomes.get(channel).copied()
    }

    /// Returns all recorded outcomes.
    #[must_use]
    pub const fn outcomes(&self) -> &BTreeMap<String, ChannelOutcome> {
        &self.outcomes
    }

    /// Maps a created destination space to its channel.
    pub fn record_space(&mut self, space: SpaceId, channel: &str) {
        self.spaces.insert(space, channel.to_owned());
    }

    /// Returns the channel a space was created for.
    #[must_use]
    pub fn channel_for_space(&self, space: &SpaceId) -> Option<&str> {
        self.spaces.get(space).map(String::as_str)
    }

    /// Returns the space-to-channel mapping.
    #[must_use]
    pub const fn spaces(&self) -> &BTreeMap<SpaceId, String> {
        &self.spaces
    }

    /// Marks a space as deleted during error cleanup.
    pub fn record_space_deleted(&mut self, space: SpaceId) {
        self.deleted_spaces.insert(space);
    }

    /// Returns spaces deleted during error cleanup.
    #[must_use]
    pub const fn deleted_spaces(&self) -> &BTreeSet<SpaceId> {
        &self.deleted_spaces
    }

    /// Marks a space's regular-membership step as fully applied.
    pub fn record_membership_complete(&mut self, space: SpaceId) {
        self.membership_complete.insert(space);
    }

    /// Returns true when a space's regular membership has been applied.
    #[must_use]
    pub fn is_membership_complete(&self, space: &SpaceId) -> bool {
        self.membership_complete.contains(space)
    }

    /// Marks a space as holding external-user access grants to preserve.
    pub fn record_external_space(&mut self, space: SpaceId) {
        self.external_spaces.insert(space);
    }

    /// Returns true when external-user access must be preserved on a space.
    #[must_use]
    pub fn has_external_users(&self, space: &SpaceId) -> bool {
        self.external_spaces.contains(space)
    }

    /// Records an identity resolution, once per unique source user.
    ///
    /// Repeated calls for the same user keep the first recording.
    pub fn record_resolution(&mut self, user: &SourceUserId, identity: ResolvedIdentity) {
        self.resolutions.entry(user.clone()).or_insert(identity);
    }

    /// Returns the recorded resolution for a user.
    #[must_use]
    pub fn resolution(&self, user: &SourceUserId) -> Option<&ResolvedIdentity> {
        self.resolutions.get(user)
    }

    /// Returns every recorded identity resolution.
    #[must_use]
    pub const fn resolutions(&self) -> &BTreeMap<SourceUserId, ResolvedIdentity> {
        &self.resolutions
    }

    /// Records a user that resolved to no email.
    pub fn record_user_without_email(&mut self, user: UnresolvedUser) {
        if !self.users_without_email.iter().any(|u| u.id == user.id) {
            self.users_without_email.push(user);
        }
    }

    /// Returns users that resolved to no email.
    #[must_use]
    pub fn users_without_email(&self) -> &[UnresolvedUser] {
        &self.users_without_email
    }

    /// Records a reaction skipped instead of attempted.
    pub fn record_skipped_reaction(&mut self, skipped: SkippedReaction) {
        self.skipped_reactions.push(skipped);
    }

    /// Returns skipped reactions.
    #[must_use]
    pub fn skipped_reactions(&self) -> &[SkippedReaction] {
        &self.skipped_reactions
    }

    /// Appends a non-fatal error record.
    pub fn record_error(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }

    /// Returns accumulated non-fatal errors.
    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Returns the destination reference recorded for a fingerprint.
    #[must_use]
    pub fn uploaded_reference(&self, fingerprint: &Fingerprint) -> Option<&FileRef> {
        self.uploads.get(fingerprint)
    }

    /// Records the destination reference for an uploaded fingerprint.
    pub fn record_upload(&mut self, fingerprint: Fingerprint, reference: FileRef) {
        self.uploads.insert(fingerprint, reference);
    }

    /// Returns the number of distinct uploaded artifacts.
    #[must_use]
    pub fn uploaded_count(&self) -> usize {
        self.uploads.len()
    }
}
