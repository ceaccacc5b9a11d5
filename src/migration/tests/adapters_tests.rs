//! Unit tests for the bundled adapters.

use crate::migration::adapters::memory::ops;
use crate::migration::adapters::{InMemoryFileApi, InMemorySpaceApi, parse_segments};
use crate::migration::domain::{SourceTimestamp, SourceUserId, SpaceId, TextSegment};
use crate::migration::ports::{ApiError, FileApi, OutgoingMessage, SpaceApi};
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;

// ============================================================================
// Markup parsing tests
// ============================================================================

#[rstest]
fn plain_text_is_one_segment() {
    assert_eq!(
        parse_segments("hello world"),
        [TextSegment::Plain("hello world".to_owned())]
    );
}

#[rstest]
fn mentions_are_extracted() {
    let segments = parse_segments("ping <@U001> please");
    assert_eq!(
        segments,
        [
            TextSegment::Plain("ping ".to_owned()),
            TextSegment::Mention(SourceUserId::new("U001")),
            TextSegment::Plain(" please".to_owned()),
        ]
    );
}

#[rstest]
fn mention_display_hint_is_dropped() {
    assert_eq!(
        parse_segments("<@U001|alice>"),
        [TextSegment::Mention(SourceUserId::new("U001"))]
    );
}

#[rstest]
fn labelled_links_split_url_and_label() {
    assert_eq!(
        parse_segments("<https://example.com|the docs>"),
        [TextSegment::Link {
            url: "https://example.com".to_owned(),
            label: Some("the docs".to_owned()),
        }]
    );
}

#[rstest]
fn bare_links_have_no_label() {
    assert_eq!(
        parse_segments("<https://example.com>"),
        [TextSegment::Link {
            url: "https://example.com".to_owned(),
            label: None,
        }]
    );
}

#[rstest]
fn unknown_angle_tokens_stay_literal() {
    assert_eq!(
        parse_segments("a <b> c"),
        [TextSegment::Plain("a <b> c".to_owned())]
    );
}

#[rstest]
fn unclosed_angle_bracket_stays_literal() {
    assert_eq!(
        parse_segments("tilt <@U001"),
        [TextSegment::Plain("tilt <@U001".to_owned())]
    );
}

#[rstest]
fn empty_text_yields_no_segments() {
    assert!(parse_segments("").is_empty());
}

// ============================================================================
// In-memory space adapter tests
// ============================================================================

fn space_api() -> InMemorySpaceApi<DefaultClock> {
    InMemorySpaceApi::new(Arc::new(DefaultClock))
}

fn outgoing(text: &str, ts: &str) -> OutgoingMessage {
    OutgoingMessage::new(text.to_owned(), SourceTimestamp::new(ts))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_space_starts_in_import_mode() {
    let api = space_api();
    let id = api
        .create_import_space("general")
        .await
        .expect("creation should succeed");

    let space = api
        .space(&id)
        .expect("lookup should succeed")
        .expect("space should exist");
    assert!(space.import_mode());
    assert_eq!(space.display_name(), "general");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn messages_are_stored_against_their_space() {
    let api = space_api();
    let id = api
        .create_import_space("general")
        .await
        .expect("creation should succeed");

    api.post_message(&id, &outgoing("hello", "1.000000"))
        .await
        .expect("post should succeed");

    let messages = api.messages_in(&id).expect("snapshot should succeed");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message.text, "hello");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn posting_into_a_missing_space_is_not_found() {
    let api = space_api();
    let result = api
        .post_message(&SpaceId::new("spaces/ghost"), &outgoing("x", "1.000000"))
        .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completing_twice_is_an_invalid_argument() {
    let api = space_api();
    let id = api
        .create_import_space("general")
        .await
        .expect("creation should succeed");

    api.complete_import(&id).await.expect("first completion");
    let second = api.complete_import(&id).await;
    assert!(matches!(second, Err(ApiError::InvalidArgument(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scripted_failures_fire_then_clear() {
    let api = space_api();
    api.fail_times(
        ops::CREATE_SPACE,
        &ApiError::Unavailable("down".to_owned()),
        1,
    )
    .expect("scripting should succeed");

    let first = api.create_import_space("general").await;
    assert!(matches!(first, Err(ApiError::Unavailable(_))));

    api.create_import_space("general")
        .await
        .expect("second call should succeed");
    assert_eq!(api.calls(ops::CREATE_SPACE).expect("count"), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_space_removes_its_content() {
    let api = space_api();
    let id = api
        .create_import_space("general")
        .await
        .expect("creation should succeed");
    api.post_message(&id, &outgoing("hello", "1.000000"))
        .await
        .expect("post should succeed");

    api.delete_space(&id).await.expect("delete should succeed");
    assert!(api.space(&id).expect("lookup").is_none());
    assert!(api.messages_in(&id).expect("snapshot").is_empty());
    assert!(
        api.list_managed_spaces()
            .await
            .expect("listing should succeed")
            .is_empty()
    );
}

// ============================================================================
// In-memory file adapter tests
// ============================================================================

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn uploads_record_name_folder_and_size() {
    let api = InMemoryFileApi::new();
    let reference = api
        .upload("logo.png", &[1, 2, 3], "Imported Attachments")
        .await
        .expect("upload should succeed");
    assert!(reference.as_str().starts_with("files/"));

    let uploads = api.uploads().expect("snapshot should succeed");
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].name, "logo.png");
    assert_eq!(uploads[0].folder, "Imported Attachments");
    assert_eq!(uploads[0].size, 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scripted_upload_failure_fires_once() {
    let api = InMemoryFileApi::new();
    api.fail_times(&ApiError::RateLimited("slow down".to_owned()), 1)
        .expect("scripting should succeed");

    let first = api.upload("a.txt", b"x", "folder").await;
    assert!(matches!(first, Err(ApiError::RateLimited(_))));
    api.upload("a.txt", b"x", "folder")
        .await
        .expect("second upload should succeed");
    assert_eq!(api.upload_calls().expect("count"), 2);
}
