//! End-to-end migration scenarios over the in-memory destination doubles.
//!
//! These tests drive the coordinator exactly the way the binary does,
//! verifying pipeline behaviour, failure handling, and the terminal cleanup
//! sweep against observable destination state.

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]
#![expect(
    clippy::indexing_slicing,
    reason = "Test code uses indexing after length checks"
)]

use async_trait::async_trait;
use chatlift::migration::adapters::memory::ops;
use chatlift::migration::adapters::{InMemoryFileApi, InMemorySpaceApi};
use chatlift::migration::domain::{
    Attachment, ChannelOutcome, ChannelRecord, DestinationSpace, ImportCompletionStrategy,
    MessageUnit, MigrationConfig, MigrationContext, Reaction, RunReport, SourceTimestamp,
    SourceUser, SourceUserId, TextSegment, ThreadKey,
};
use chatlift::migration::ports::{ApiError, ExportReader, ExportResult, SpaceApi};
use chatlift::migration::services::MigrationCoordinator;
use mockable::DefaultClock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Export reader over fixed in-memory data.
struct StaticExport {
    users: HashMap<SourceUserId, SourceUser>,
    channels: Vec<ChannelRecord>,
}

#[async_trait]
impl ExportReader for StaticExport {
    async fn load_users(&self) -> ExportResult<HashMap<SourceUserId, SourceUser>> {
        Ok(self.users.clone())
    }

    async fn load_channels(&self) -> ExportResult<Vec<ChannelRecord>> {
        Ok(self.channels.clone())
    }
}

fn directory() -> HashMap<SourceUserId, SourceUser> {
    let mut users = HashMap::new();
    users.insert(
        SourceUserId::new("U001"),
        SourceUser::new("alice").with_email("alice@corp.example"),
    );
    users.insert(
        SourceUserId::new("U002"),
        SourceUser::new("bob").with_email("bob@corp.example"),
    );
    users.insert(SourceUserId::new("U003"), SourceUser::new("mallory"));
    users.insert(
        SourceUserId::new("U100"),
        SourceUser::new("guest").with_email("guest@elsewhere.example"),
    );
    users
}

fn base_config() -> MigrationConfig {
    MigrationConfig {
        workspace_domain: Some("corp.example".to_owned()),
        retry_delay_ms: 1,
        ..MigrationConfig::default()
    }
}

fn text(author: &str, ts: &str, body: &str) -> MessageUnit {
    MessageUnit::new(SourceUserId::new(author), SourceTimestamp::new(ts))
        .with_body(vec![TextSegment::Plain(body.to_owned())])
}

fn channel(name: &str, members: &[&str], messages: Vec<MessageUnit>) -> ChannelRecord {
    let roster: BTreeSet<SourceUserId> = members.iter().map(|id| SourceUserId::new(*id)).collect();
    ChannelRecord::new(name, roster, messages)
}

struct Harness {
    spaces: Arc<InMemorySpaceApi<DefaultClock>>,
    files: Arc<InMemoryFileApi>,
    coordinator: MigrationCoordinator<InMemorySpaceApi<DefaultClock>, InMemoryFileApi, DefaultClock>,
}

fn harness(config: MigrationConfig) -> Harness {
    harness_with(config, false)
}

fn harness_with(config: MigrationConfig, dry_run: bool) -> Harness {
    let clock = Arc::new(DefaultClock);
    let spaces = Arc::new(InMemorySpaceApi::new(Arc::clone(&clock)));
    let files = Arc::new(InMemoryFileApi::new());
    let context = MigrationContext::new("admin@corp.example", "/exports/acme", config, dry_run);
    let coordinator =
        MigrationCoordinator::new(context, Arc::clone(&spaces), Arc::clone(&files), clock);
    Harness {
        spaces,
        files,
        coordinator,
    }
}

async fn run(harness: &Harness, channels: Vec<ChannelRecord>) -> RunReport {
    let export = StaticExport {
        users: directory(),
        channels,
    };
    harness
        .coordinator
        .run(&export)
        .await
        .expect("run should produce a report")
}

async fn single_space(spaces: &InMemorySpaceApi<DefaultClock>) -> DestinationSpace {
    let managed = spaces
        .list_managed_spaces()
        .await
        .expect("listing should succeed");
    assert_eq!(managed.len(), 1);
    managed[0].clone()
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn full_channel_import_reaches_a_completed_space() {
    let harness = harness(base_config());
    let messages = vec![
        text("U001", "100.000000", "first"),
        text("U002", "200.000000", "second"),
    ];
    let record = channel("general", &["U001", "U002"], messages).with_purpose("daily chatter");

    let report = run(&harness, vec![record]).await;

    assert_eq!(report.channels["general"].outcome, ChannelOutcome::Completed);
    assert_eq!(report.totals.messages_created, 2);
    assert_eq!(report.totals.messages_failed, 0);

    let space = single_space(&harness.spaces).await;
    assert!(!space.import_mode());

    let stored = harness
        .spaces
        .messages_in(space.id())
        .expect("snapshot should succeed");
    // Metadata message plus the two imported ones.
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].message.text, "Purpose: daily chatter");
    assert_eq!(
        stored[1].message.sender.as_deref(),
        Some("alice@corp.example")
    );

    let members = harness
        .spaces
        .members_of(space.id())
        .expect("snapshot should succeed");
    // Two historical adds during import, two regular adds after completion.
    assert_eq!(members.iter().filter(|m| m.historical).count(), 2);
    assert_eq!(members.iter().filter(|m| !m.historical).count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn thread_replies_reference_their_imported_parent() {
    let harness = harness(base_config());
    let parent = text("U001", "100.000000", "root")
        .with_thread_key(ThreadKey::new("100.000000"));
    let reply = text("U002", "200.000000", "child")
        .with_thread_key(ThreadKey::new("100.000000"));

    run(&harness, vec![channel("general", &["U001"], vec![parent, reply])]).await;

    let space = single_space(&harness.spaces).await;
    let messages = harness
        .spaces
        .messages_in(space.id())
        .expect("snapshot should succeed");
    let root = messages
        .iter()
        .find(|m| m.message.text == "root")
        .expect("root message should exist");
    let child = messages
        .iter()
        .find(|m| m.message.text == "child")
        .expect("child message should exist");
    assert_eq!(child.message.thread_parent.as_ref(), Some(&root.id));
    assert_eq!(root.message.thread_parent, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn unresolved_author_is_attributed_in_the_text() {
    let harness = harness(base_config());
    let record = channel(
        "general",
        &["U001"],
        vec![text("U003", "100.000000", "hello")],
    );

    let report = run(&harness, vec![record]).await;
    assert_eq!(report.users_without_email.len(), 1);

    let space = single_space(&harness.spaces).await;
    let messages = harness
        .spaces
        .messages_in(space.id())
        .expect("snapshot should succeed");
    assert_eq!(messages[0].message.sender, None);
    assert_eq!(messages[0].message.text, "mallory: hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn historical_members_are_seeded_before_the_metadata_message() {
    let harness = harness(base_config());
    let record = channel("general", &["U001", "U002"], vec![]).with_purpose("daily chatter");

    run(&harness, vec![record]).await;

    let log = harness
        .spaces
        .operation_log()
        .expect("log should succeed");
    let first_member = log
        .iter()
        .position(|op| op == ops::ADD_MEMBER)
        .expect("members should be added");
    let first_post = log
        .iter()
        .position(|op| op == ops::POST_MESSAGE)
        .expect("metadata should be posted");
    assert!(first_member < first_post);
}

// ============================================================================
// Attachments and retries
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn transient_upload_failures_are_absorbed_by_retries() {
    let harness = harness(base_config());
    harness
        .files
        .fail_times(&ApiError::RateLimited("slow down".to_owned()), 2)
        .expect("scripting should succeed");

    let message = text("U001", "100.000000", "with file")
        .with_attachment(Attachment::new("logo.png", vec![1, 2, 3]));
    let report = run(&harness, vec![channel("general", &["U001"], vec![message])]).await;

    assert_eq!(report.totals.messages_created, 1);
    assert_eq!(report.totals.messages_failed, 0);
    assert_eq!(report.totals.files_uploaded, 1);
    // Two scripted failures, success on the third attempt.
    assert_eq!(harness.files.upload_calls().expect("count"), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_attachment_content_uploads_once() {
    let harness = harness(base_config());
    let first = text("U001", "100.000000", "report v1")
        .with_attachment(Attachment::new("report.pdf", vec![9, 9, 9]));
    let second = text("U002", "200.000000", "report again")
        .with_attachment(Attachment::new("report.pdf", vec![9, 9, 9]));

    let report = run(
        &harness,
        vec![channel("general", &["U001"], vec![first, second])],
    )
    .await;

    assert_eq!(report.totals.messages_created, 2);
    assert_eq!(report.totals.files_uploaded, 1);
    assert_eq!(harness.files.upload_calls().expect("count"), 1);

    let space = single_space(&harness.spaces).await;
    let messages = harness
        .spaces
        .messages_in(space.id())
        .expect("snapshot should succeed");
    let refs: BTreeSet<String> = messages
        .iter()
        .flat_map(|m| m.message.file_refs.iter())
        .map(|r| r.as_str().to_owned())
        .collect();
    assert_eq!(refs.len(), 1);
}

// ============================================================================
// Reactions
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn reactions_from_external_or_unresolved_users_are_skipped() {
    let harness = harness(base_config());
    let message = text("U001", "100.000000", "announcement").with_reaction(Reaction::new(
        "tada",
        vec![
            SourceUserId::new("U002"),
            SourceUserId::new("U003"),
            SourceUserId::new("U100"),
        ],
    ));

    let report = run(&harness, vec![channel("general", &["U001"], vec![message])]).await;

    assert_eq!(report.totals.reactions_created, 1);
    assert_eq!(report.totals.reactions_skipped, 2);
    assert_eq!(report.skipped_reactions.len(), 2);

    let space = single_space(&harness.spaces).await;
    let messages = harness
        .spaces
        .messages_in(space.id())
        .expect("snapshot should succeed");
    let reactions = harness
        .spaces
        .reactions_on(&messages[0].id)
        .expect("snapshot should succeed");
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].email, "bob@corp.example");
}

// ============================================================================
// Failure gate
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn failure_gate_skips_the_rest_of_the_channel() {
    let harness = harness(base_config());
    // Two permanent message failures against a 10 percent threshold.
    harness
        .spaces
        .fail_times(
            ops::POST_MESSAGE,
            &ApiError::PermissionDenied("no".to_owned()),
            2,
        )
        .expect("scripting should succeed");

    let messages: Vec<MessageUnit> = (1..=10)
        .map(|i| text("U001", &format!("{i}00.000000"), &format!("message {i}")))
        .collect();
    let report = run(&harness, vec![channel("general", &["U001"], messages)]).await;

    let general = &report.channels["general"];
    assert_eq!(general.outcome, ChannelOutcome::SkippedDueToFailures);
    assert_eq!(general.stats.attempted_messages, 2);
    assert_eq!(general.stats.failed_messages, 2);
    assert_eq!(general.stats.created_messages, 0);
    assert!(
        report
            .recommendations
            .iter()
            .any(|r| r.subject == "channel general")
    );
    // The sweep still brings the abandoned space out of import mode.
    assert_eq!(report.cleanup.completed.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn abort_on_error_halts_later_channels() {
    let config = MigrationConfig {
        abort_on_error: true,
        ..base_config()
    };
    let harness = harness(config);
    harness
        .spaces
        .fail_times(
            ops::POST_MESSAGE,
            &ApiError::PermissionDenied("no".to_owned()),
            2,
        )
        .expect("scripting should succeed");

    let first = channel(
        "flaky",
        &["U001"],
        vec![
            text("U001", "100.000000", "one"),
            text("U001", "200.000000", "two"),
        ],
    );
    let second = channel("healthy", &["U001"], vec![text("U001", "300.000000", "x")]);
    let report = run(&harness, vec![first, second]).await;

    assert_eq!(
        report.channels["flaky"].outcome,
        ChannelOutcome::SkippedDueToFailures
    );
    assert_eq!(report.channels["healthy"].outcome, ChannelOutcome::Aborted);
    assert!(report.errors.iter().any(|e| e.operation == "abort_on_error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn space_creation_failure_skips_only_that_channel() {
    let harness = harness(base_config());
    harness
        .spaces
        .fail_times(
            ops::CREATE_SPACE,
            &ApiError::PermissionDenied("no".to_owned()),
            1,
        )
        .expect("scripting should succeed");

    let report = run(
        &harness,
        vec![
            channel("general", &["U001"], vec![text("U001", "100.000000", "a")]),
            channel("random", &["U001"], vec![text("U001", "200.000000", "b")]),
        ],
    )
    .await;

    assert_eq!(
        report.channels["general"].outcome,
        ChannelOutcome::SkippedDueToFailures
    );
    // The failure stays scoped to its channel; the run carries on.
    assert_eq!(report.channels["random"].outcome, ChannelOutcome::Completed);
    assert!(report.errors.iter().any(|e| e.operation == "create_space"));
    assert!(
        report
            .recommendations
            .iter()
            .any(|r| r.subject == "channel general")
    );
}

// ============================================================================
// Channel filtering
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn excluded_channels_create_no_destination_resources() {
    let config = MigrationConfig {
        include_channels: vec!["general".to_owned()],
        ..base_config()
    };
    let harness = harness(config);
    let report = run(
        &harness,
        vec![
            channel("general", &["U001"], vec![text("U001", "100.000000", "in")]),
            channel("random", &["U001"], vec![text("U001", "200.000000", "out")]),
        ],
    )
    .await;

    assert_eq!(report.channels["random"].outcome, ChannelOutcome::Excluded);
    assert_eq!(report.totals.channels_processed, 1);
    assert_eq!(harness.spaces.calls(ops::CREATE_SPACE).expect("count"), 1);
}

// ============================================================================
// Cleanup sweep
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn always_skip_strategy_leaves_completion_to_the_sweep() {
    let config = MigrationConfig {
        import_completion_strategy: ImportCompletionStrategy::AlwaysSkip,
        ..base_config()
    };
    let harness = harness(config);
    let report = run(
        &harness,
        vec![channel(
            "general",
            &["U001", "U002"],
            vec![text("U001", "100.000000", "hello")],
        )],
    )
    .await;

    assert_eq!(report.cleanup.completed.len(), 1);
    assert_eq!(report.cleanup.memberships_reapplied.len(), 1);

    let space = single_space(&harness.spaces).await;
    assert!(!space.import_mode());
    let members = harness
        .spaces
        .members_of(space.id())
        .expect("snapshot should succeed");
    // Regular membership applied by the sweep, not the pipeline.
    assert_eq!(members.iter().filter(|m| !m.historical).count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn sweep_deletes_uncompletable_spaces_when_configured() {
    let config = MigrationConfig {
        import_completion_strategy: ImportCompletionStrategy::AlwaysSkip,
        cleanup_on_error: true,
        ..base_config()
    };
    let harness = harness(config);
    harness
        .spaces
        .fail_times(
            ops::COMPLETE_IMPORT,
            &ApiError::PermissionDenied("no".to_owned()),
            1,
        )
        .expect("scripting should succeed");

    let report = run(
        &harness,
        vec![channel(
            "general",
            &["U001"],
            vec![text("U001", "100.000000", "hello")],
        )],
    )
    .await;

    assert_eq!(report.cleanup.deleted.len(), 1);
    assert!(report.cleanup.completed.is_empty());
    assert!(
        harness
            .spaces
            .list_managed_spaces()
            .await
            .expect("listing should succeed")
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn running_the_sweep_twice_changes_nothing() {
    let config = MigrationConfig {
        import_completion_strategy: ImportCompletionStrategy::AlwaysSkip,
        ..base_config()
    };
    let harness = harness(config);
    let record = channel(
        "general",
        &["U001"],
        vec![text("U001", "100.000000", "hello")],
    );

    let first = run(&harness, vec![record.clone()]).await;
    assert_eq!(first.cleanup.completed.len(), 1);
    let completions_after_first = harness
        .spaces
        .calls(ops::COMPLETE_IMPORT)
        .expect("count");

    // A second run over the same destination finds nothing left to
    // complete; the space is already terminal.
    let second = run(&harness, vec![record]).await;
    let stuck_completions = harness
        .spaces
        .calls(ops::COMPLETE_IMPORT)
        .expect("count")
        - completions_after_first;
    // One completion for the second run's own new space only.
    assert_eq!(stuck_completions, 1);
    assert_eq!(second.cleanup.completed.len(), 1);
}

// ============================================================================
// External users
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn external_members_grant_and_survive_completion() {
    let harness = harness(base_config());
    let report = run(
        &harness,
        vec![channel(
            "partners",
            &["U001", "U100"],
            vec![text("U001", "100.000000", "welcome")],
        )],
    )
    .await;

    assert_eq!(report.external_identities.len(), 1);
    let space = single_space(&harness.spaces).await;
    assert!(space.external_users_allowed());
}

// ============================================================================
// Dry run parity
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn dry_and_live_runs_report_identical_totals() {
    let config = MigrationConfig {
        cleanup_on_error: true,
        ..base_config()
    };
    let export = || {
        let flaky_messages: Vec<MessageUnit> = (1..=10)
            .map(|i| text("U001", &format!("{i}00.000000"), &format!("message {i}")))
            .collect();
        vec![
            channel("flaky", &["U001"], flaky_messages),
            channel(
                "steady",
                &["U002"],
                vec![
                    text("U002", "100.000000", "one"),
                    text("U002", "200.000000", "two"),
                ],
            ),
        ]
    };

    let dry = harness_with(config.clone(), true);
    let live = harness_with(config, false);
    for scripted in [&dry, &live] {
        scripted
            .spaces
            .fail_times(
                ops::POST_MESSAGE,
                &ApiError::PermissionDenied("no".to_owned()),
                2,
            )
            .expect("scripting should succeed");
    }

    let dry_report = run(&dry, export()).await;
    let live_report = run(&live, export()).await;

    assert!(dry_report.dry_run);
    assert!(!live_report.dry_run);
    assert_eq!(dry_report.totals, live_report.totals);
    assert_eq!(dry_report.channels["flaky"], live_report.channels["flaky"]);
    assert_eq!(dry_report.channels["steady"], live_report.channels["steady"]);

    // The live run deletes the failed space during the pipeline; the dry
    // run leaves it for the sweep to bring out of import mode.
    let live_spaces = live
        .spaces
        .list_managed_spaces()
        .await
        .expect("listing should succeed");
    assert_eq!(live_spaces.len(), 1);
    let dry_spaces = dry
        .spaces
        .list_managed_spaces()
        .await
        .expect("listing should succeed");
    assert_eq!(dry_spaces.len(), 2);
    assert_eq!(dry_report.cleanup.completed.len(), 1);
}
