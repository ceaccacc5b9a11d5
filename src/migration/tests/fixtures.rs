//! Shared fixtures and helpers for migration tests.

use crate::migration::domain::{
    ChannelRecord, MessageUnit, MigrationConfig, MigrationContext, SourceTimestamp, SourceUser,
    SourceUserId, TextSegment,
};
use mockable::DefaultClock;
use rstest::fixture;
use std::collections::{BTreeSet, HashMap};

#[fixture]
pub fn clock() -> DefaultClock {
    DefaultClock
}

#[fixture]
pub fn config() -> MigrationConfig {
    MigrationConfig {
        workspace_domain: Some("corp.example".to_owned()),
        ..MigrationConfig::default()
    }
}

/// A live-run context over a default configuration.
#[fixture]
pub fn context(config: MigrationConfig) -> MigrationContext {
    MigrationContext::new("admin@corp.example", "/exports/acme", config, false)
}

/// User directory with one resolvable user, one bot, and one user without
/// an email.
#[fixture]
pub fn users() -> HashMap<SourceUserId, SourceUser> {
    let mut users = HashMap::new();
    users.insert(
        SourceUserId::new("U001"),
        SourceUser::new("alice").with_email("alice@corp.example"),
    );
    users.insert(
        SourceUserId::new("U002"),
        SourceUser::new("reminder-bot").with_bot_flag(true),
    );
    users.insert(SourceUserId::new("U003"), SourceUser::new("mallory"));
    users
}

/// Builds a plain-text message for tests.
pub fn text_message(author: &str, ts: &str, text: &str) -> MessageUnit {
    MessageUnit::new(SourceUserId::new(author), SourceTimestamp::new(ts))
        .with_body(vec![TextSegment::Plain(text.to_owned())])
}

/// Builds a channel with the given members and messages.
pub fn channel(name: &str, members: &[&str], messages: Vec<MessageUnit>) -> ChannelRecord {
    let roster: BTreeSet<SourceUserId> = members.iter().map(|id| SourceUserId::new(*id)).collect();
    ChannelRecord::new(name, roster, messages)
}
