//! Per-channel import pipeline.
//!
//! Runs one channel end to end: create the destination space, post channel
//! metadata, add historical members, import messages (threads, attachments,
//! reactions), exit import mode per the configured strategy, then apply
//! regular membership. Counters and failures accumulate in the run state;
//! only space creation is fatal to the channel.

use crate::migration::domain::{
    ChannelOutcome, ChannelRecord, ChannelStats, DestinationMessageId, ErrorRecord, FileRef,
    ImportCompletionStrategy, MessageUnit, MigrationContext, MigrationState, SkippedReaction,
    SourceTimestamp, SourceUserId, SpaceId, TextSegment, ThreadKey,
};
use crate::migration::error::{MigrationError, MigrationResult};
use crate::migration::ports::{FileApi, OutgoingMessage, SpaceApi};
use crate::migration::services::{ContentDeduplicator, IdentityResolver, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Timestamp given to the synthetic metadata message so it sorts before
/// every exported message.
const METADATA_TIMESTAMP: &str = "0.000000";

/// Imports one source channel into a destination space.
pub struct ChannelPipeline<S, F> {
    context: MigrationContext,
    spaces: Arc<S>,
    files: Arc<F>,
    identity: Arc<IdentityResolver>,
    dedup: ContentDeduplicator,
    retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
}

impl<S: SpaceApi, F: FileApi> ChannelPipeline<S, F> {
    /// Creates a pipeline bound to one run's context and collaborators.
    #[must_use]
    pub fn new(
        context: MigrationContext,
        spaces: Arc<S>,
        files: Arc<F>,
        identity: Arc<IdentityResolver>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let retry = RetryPolicy::from_config(context.config());
        Self {
            context,
            spaces,
            files,
            identity,
            dedup: ContentDeduplicator::new(),
            retry,
            cancel,
        }
    }

    /// Runs the pipeline for `channel`, recording everything in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::ResourceCreation`] when the destination
    /// space cannot be created; every later failure is recorded in `state`
    /// and reflected in the returned outcome instead.
    pub async fn run(
        &self,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) -> MigrationResult<ChannelOutcome> {
        let name = channel.name();
        info!(
            channel = name,
            messages = channel.messages().len(),
            "{}importing channel",
            self.context.log_prefix()
        );

        let space = self.create_space(channel).await?;
        state.record_space(space.clone(), name);

        self.add_historical_members(&space, channel, state).await;
        self.post_metadata(&space, channel, state).await;

        let outcome = self.import_messages(&space, channel, state).await;
        if outcome == ChannelOutcome::SkippedDueToFailures {
            self.discard_failed_space(&space, channel, state).await;
            state.record_outcome(name, outcome);
            if self.context.config().abort_on_error {
                let stats = state.stats(name).cloned().unwrap_or_default();
                return Err(MigrationError::ThresholdExceeded {
                    channel: name.to_owned(),
                    failed: stats.failed_messages,
                    attempted: stats.attempted_messages,
                });
            }
            return Ok(outcome);
        }
        if outcome == ChannelOutcome::Aborted {
            state.record_outcome(name, outcome);
            return Ok(outcome);
        }

        let completed = self.finish_import(&space, channel, state).await;
        if completed {
            self.add_regular_members(&space, channel, state).await;
        }

        state.record_outcome(name, ChannelOutcome::Completed);
        Ok(ChannelOutcome::Completed)
    }

    async fn create_space(&self, channel: &ChannelRecord) -> MigrationResult<SpaceId> {
        let display_name = channel.name();
        self.retry
            .run("create_space", || {
                self.spaces.create_import_space(display_name)
            })
            .await
            .map_err(|source| MigrationError::ResourceCreation {
                channel: display_name.to_owned(),
                source,
            })
    }

    /// Posts the channel purpose and topic as the space's first message.
    async fn post_metadata(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) {
        let mut text = String::new();
        if let Some(purpose) = channel.purpose() {
            text.push_str("Purpose: ");
            text.push_str(purpose);
        }
        if let Some(topic) = channel.topic() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("Topic: ");
            text.push_str(topic);
        }
        if text.is_empty() {
            return;
        }

        let message = OutgoingMessage::new(text, SourceTimestamp::new(METADATA_TIMESTAMP))
            .with_sender(self.context.workspace_admin());
        let result = self
            .retry
            .run("post_metadata", || self.spaces.post_message(space, &message))
            .await;
        if let Err(error) = result {
            warn!(channel = channel.name(), error = %error, "metadata message failed");
            state.stats_mut(channel.name()).other_errors += 1;
            state.record_error(ErrorRecord::channel_scoped(
                channel.name(),
                "post_metadata",
                error.to_string(),
            ));
        }
    }

    async fn add_historical_members(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) {
        let mut external_granted = false;
        for user in channel.roster() {
            if self.context.config().ignore_bots && self.identity.is_bot(user) {
                continue;
            }
            let identity = self.identity.resolve(user, state);
            let Some(email) = identity.email().map(ToOwned::to_owned) else {
                continue;
            };

            if identity.is_external() && !external_granted {
                self.grant_external_access(space, channel, state).await;
                external_granted = true;
            }

            let result = self
                .retry
                .run("add_member", || self.spaces.add_member(space, &email, true))
                .await;
            if let Err(error) = result {
                warn!(
                    channel = channel.name(),
                    member = email,
                    error = %error,
                    "historical membership add failed"
                );
                state.stats_mut(channel.name()).member_add_failures += 1;
                state.record_error(ErrorRecord::channel_scoped(
                    channel.name(),
                    "add_member",
                    error.to_string(),
                ));
            }
        }
    }

    async fn grant_external_access(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) {
        state.record_external_space(space.clone());
        let result = self
            .retry
            .run("set_external", || {
                self.spaces.set_external_users_allowed(space)
            })
            .await;
        if let Err(error) = result {
            warn!(channel = channel.name(), error = %error, "external access grant failed");
            state.stats_mut(channel.name()).other_errors += 1;
            state.record_error(ErrorRecord::channel_scoped(
                channel.name(),
                "set_external",
                error.to_string(),
            ));
        }
    }

    /// Imports the message log; returns the outcome the loop ended in.
    async fn import_messages(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) -> ChannelOutcome {
        let threshold = u64::from(self.context.config().max_failure_percentage);
        let mut thread_arena: HashMap<ThreadKey, DestinationMessageId> = HashMap::new();

        for message in channel.messages() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(channel = channel.name(), "cancellation requested, stopping channel");
                return ChannelOutcome::Aborted;
            }
            if self.context.config().ignore_bots && self.identity.is_bot(message.author()) {
                debug!(
                    channel = channel.name(),
                    author = %message.author(),
                    "skipping bot message"
                );
                continue;
            }

            state.stats_mut(channel.name()).attempted_messages += 1;
            self.import_one_message(space, channel, message, &mut thread_arena, state)
                .await;

            let stats = state.stats_mut(channel.name());
            let attempted = stats.attempted_messages;
            let failed = stats.failed_messages;
            if attempted >= 2 && failed * 100 > threshold * attempted {
                warn!(
                    channel = channel.name(),
                    failed,
                    attempted,
                    threshold_percent = threshold,
                    "failure threshold exceeded, skipping remaining messages"
                );
                state.record_error(ErrorRecord::channel_scoped(
                    channel.name(),
                    "failure_threshold",
                    format!("{failed} of {attempted} attempted messages failed"),
                ));
                return ChannelOutcome::SkippedDueToFailures;
            }
        }
        ChannelOutcome::Completed
    }

    async fn import_one_message(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        message: &MessageUnit,
        thread_arena: &mut HashMap<ThreadKey, DestinationMessageId>,
        state: &mut MigrationState,
    ) {
        let Some(file_refs) = self.upload_attachments(channel, message, state).await else {
            state.stats_mut(channel.name()).failed_messages += 1;
            return;
        };

        // A reply whose parent failed to import (or is yet to come) falls
        // back to a top-level message.
        let parent = message
            .thread_key()
            .filter(|_| message.is_thread_reply())
            .and_then(|key| thread_arena.get(key))
            .cloned();
        let mut outgoing = self.build_outgoing(message, file_refs, state);
        if let Some(parent_id) = parent {
            outgoing = outgoing.with_thread_parent(parent_id);
        }
        let result = self
            .retry
            .run("post_message", || self.spaces.post_message(space, &outgoing))
            .await;

        match result {
            Ok(destination_id) => {
                state.stats_mut(channel.name()).created_messages += 1;
                thread_arena.insert(message.own_thread_key(), destination_id.clone());
                self.apply_reactions(space, channel, message, &destination_id, state)
                    .await;
            }
            Err(error) => {
                warn!(
                    channel = channel.name(),
                    timestamp = message.timestamp().as_str(),
                    error = %error,
                    "message import failed"
                );
                state.stats_mut(channel.name()).failed_messages += 1;
                state.record_error(ErrorRecord::channel_scoped(
                    channel.name(),
                    "post_message",
                    error.to_string(),
                ));
            }
        }
    }

    /// Uploads the message's attachments, deduplicating by content.
    ///
    /// An upload failure fails the whole message; `None` here means the
    /// failure was already recorded.
    async fn upload_attachments(
        &self,
        channel: &ChannelRecord,
        message: &MessageUnit,
        state: &mut MigrationState,
    ) -> Option<Vec<FileRef>> {
        let folder = self.context.config().attachments_folder.clone();
        let mut refs = Vec::with_capacity(message.attachments().len());

        for attachment in message.attachments() {
            let (fingerprint, existing) = self.dedup.known_reference(attachment, state);
            if let Some(reference) = existing {
                refs.push(reference);
                continue;
            }

            let uploaded = self
                .retry
                .run("upload_attachment", || {
                    self.files
                        .upload(attachment.name(), attachment.content(), &folder)
                })
                .await;
            match uploaded {
                Ok(reference) => {
                    self.dedup
                        .record_uploaded(fingerprint, reference.clone(), state);
                    state.stats_mut(channel.name()).files_uploaded += 1;
                    refs.push(reference);
                }
                Err(error) => {
                    warn!(
                        channel = channel.name(),
                        attachment = attachment.name(),
                        error = %error,
                        "attachment upload failed"
                    );
                    state.record_error(ErrorRecord::channel_scoped(
                        channel.name(),
                        "upload_attachment",
                        error.to_string(),
                    ));
                    return None;
                }
            }
        }
        Some(refs)
    }

    fn build_outgoing(
        &self,
        message: &MessageUnit,
        file_refs: Vec<FileRef>,
        state: &mut MigrationState,
    ) -> OutgoingMessage {
        let mentions = self.resolve_mentions(message, state);
        let text = message.render_body(|user| mentions.get(user).cloned());

        let author = self.identity.resolve(message.author(), state);
        let outgoing = if let Some(email) = author.email() {
            OutgoingMessage::new(text, message.timestamp().clone()).with_sender(email)
        } else {
            // No impersonable identity; attribute in the text instead.
            let name = self
                .identity
                .display_name(message.author())
                .unwrap_or(message.author().as_str());
            OutgoingMessage::new(format!("{name}: {text}"), message.timestamp().clone())
        };
        outgoing.with_file_refs(file_refs)
    }

    fn resolve_mentions(
        &self,
        message: &MessageUnit,
        state: &mut MigrationState,
    ) -> HashMap<SourceUserId, String> {
        let mut mentions = HashMap::new();
        for segment in message.body() {
            let TextSegment::Mention(user) = segment else {
                continue;
            };
            if mentions.contains_key(user) {
                continue;
            }
            let resolved = self.identity.resolve(user, state);
            let rendered = resolved
                .email()
                .map(ToOwned::to_owned)
                .or_else(|| self.identity.display_name(user).map(ToOwned::to_owned));
            if let Some(text) = rendered {
                mentions.insert(user.clone(), text);
            }
        }
        mentions
    }

    async fn apply_reactions(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        message: &MessageUnit,
        destination_id: &DestinationMessageId,
        state: &mut MigrationState,
    ) {
        for reaction in message.reactions() {
            for reactor in reaction.reactors() {
                if self.context.config().ignore_bots && self.identity.is_bot(reactor) {
                    continue;
                }
                let identity = self.identity.resolve(reactor, state);
                let usable = identity.email().filter(|_| !identity.is_external());
                let Some(email) = usable.map(ToOwned::to_owned) else {
                    state.stats_mut(channel.name()).reactions_skipped += 1;
                    state.record_skipped_reaction(SkippedReaction {
                        channel: channel.name().to_owned(),
                        emoji: reaction.emoji().to_owned(),
                        reactor: reactor.clone(),
                    });
                    continue;
                };

                let result = self
                    .retry
                    .run("add_reaction", || {
                        self.spaces
                            .add_reaction(space, destination_id, reaction.emoji(), &email)
                    })
                    .await;
                match result {
                    Ok(()) => state.stats_mut(channel.name()).reactions_created += 1,
                    Err(error) => {
                        state.stats_mut(channel.name()).reactions_failed += 1;
                        state.record_error(ErrorRecord::channel_scoped(
                            channel.name(),
                            "add_reaction",
                            error.to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// Exits import mode per the configured strategy; returns whether the
    /// space was completed.
    async fn finish_import(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) -> bool {
        let errors = state
            .stats(channel.name())
            .map_or(0, ChannelStats::error_count);
        let should_complete = match self.context.config().import_completion_strategy {
            ImportCompletionStrategy::SkipOnError => errors == 0,
            ImportCompletionStrategy::ForceComplete => true,
            ImportCompletionStrategy::AlwaysSkip => false,
        };
        if !should_complete {
            info!(
                channel = channel.name(),
                errors, "leaving space in import mode"
            );
            return false;
        }

        let result = self
            .retry
            .run("complete_import", || self.spaces.complete_import(space))
            .await;
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(channel = channel.name(), error = %error, "import completion failed");
                state.stats_mut(channel.name()).other_errors += 1;
                state.record_error(ErrorRecord::channel_scoped(
                    channel.name(),
                    "complete_import",
                    error.to_string(),
                ));
                false
            }
        }
    }

    /// Re-adds the roster as regular members after import mode ends.
    async fn add_regular_members(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) {
        let mut all_added = true;
        for user in channel.roster() {
            if self.context.config().ignore_bots && self.identity.is_bot(user) {
                continue;
            }
            let identity = self.identity.resolve(user, state);
            let Some(email) = identity.email().map(ToOwned::to_owned) else {
                continue;
            };

            let result = self
                .retry
                .run("add_member", || {
                    self.spaces.add_member(space, &email, false)
                })
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
        if all_added {
            state.record_membership_complete(space.clone());
        }
    }

    /// Deletes a space whose channel tripped the failure threshold, when
    /// configured to.
    async fn discard_failed_space(
        &self,
        space: &SpaceId,
        channel: &ChannelRecord,
        state: &mut MigrationState,
    ) {
        if !self.context.config().cleanup_on_error || self.context.dry_run() {
            return;
        }
        let result = self
            .retry
            .run("delete_space", || self.spaces.delete_space(space))
            .await;
        match result {
            Ok(()) => {
                info!(channel = channel.name(), space = %space, "deleted failed space");
                state.record_space_deleted(space.clone());
            }
            Err(error) => {
                warn!(channel = channel.name(), error = %error, "failed-space deletion failed");
                state.record_error(ErrorRecord::channel_scoped(
                    channel.name(),
                    "delete_space",
                    error.to_string(),
                ));
            }
        }
    }
}
