//! Source channel records and message units.

use super::{Fingerprint, SourceTimestamp, SourceUserId, ThreadKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One segment of a rich-text message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextSegment {
    /// Literal text.
    Plain(String),
    /// A mention of a source user, rendered with the resolved identity.
    Mention(SourceUserId),
    /// A hyperlink with an optional label.
    Link {
        /// Target URL.
        url: String,
        /// Display label; the URL itself when absent.
        label: Option<String>,
    },
}

/// An attachment carried by a message, with its content loaded from the
/// export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    name: String,
    content: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from its file name and content bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Returns the attachment file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the content bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Computes the deduplication fingerprint for this attachment.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.name.clone(), &self.content)
    }
}

/// One reaction on a message: an emoji and the users who reacted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    emoji: String,
    reactors: Vec<SourceUserId>,
}

impl Reaction {
    /// Creates a reaction record.
    #[must_use]
    pub fn new(emoji: impl Into<String>, reactors: Vec<SourceUserId>) -> Self {
        Self {
            emoji: emoji.into(),
            reactors,
        }
    }

    /// Returns the emoji name.
    #[must_use]
    pub fn emoji(&self) -> &str {
        &self.emoji
    }

    /// Returns the users who reacted.
    #[must_use]
    pub fn reactors(&self) -> &[SourceUserId] {
        &self.reactors
    }
}

/// One logical message from the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUnit {
    author: SourceUserId,
    timestamp: SourceTimestamp,
    body: Vec<TextSegment>,
    thread_key: Option<ThreadKey>,
    attachments: Vec<Attachment>,
    reactions: Vec<Reaction>,
}

impl MessageUnit {
    /// Creates a message unit with an empty body.
    #[must_use]
    pub const fn new(author: SourceUserId, timestamp: SourceTimestamp) -> Self {
        Self {
            author,
            timestamp,
            body: Vec::new(),
            thread_key: None,
            attachments: Vec::new(),
            reactions: Vec::new(),
        }
    }

    /// Replaces the rich-text body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<TextSegment>) -> Self {
        self.body = body;
        self
    }

    /// Marks the message as a reply within the thread identified by `key`.
    #[must_use]
    pub fn with_thread_key(mut self, key: ThreadKey) -> Self {
        self.thread_key = Some(key);
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Appends a reaction.
    #[must_use]
    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.reactions.push(reaction);
        self
    }

    /// Returns the authoring source user.
    #[must_use]
    pub const fn author(&self) -> &SourceUserId {
        &self.author
    }

    /// Returns the source timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> &SourceTimestamp {
        &self.timestamp
    }

    /// Returns the rich-text body segments.
    #[must_use]
    pub fn body(&self) -> &[TextSegment] {
        &self.body
    }

    /// Returns the parent-thread key for replies.
    ///
    /// A reply whose key equals its own timestamp is a thread parent, not a
    /// child; see [`MessageUnit::is_thread_reply`].
    #[must_use]
    pub const fn thread_key(&self) -> Option<&ThreadKey> {
        self.thread_key.as_ref()
    }

    /// Returns the thread key under which this message's destination id is
    /// recorded, so later replies can resolve it.
    #[must_use]
    pub fn own_thread_key(&self) -> ThreadKey {
        ThreadKey::from(&self.timestamp)
    }

    /// Returns true when this message replies to an earlier message.
    #[must_use]
    pub fn is_thread_reply(&self) -> bool {
        self.thread_key
            .as_ref()
            .is_some_and(|key| key.as_str() != self.timestamp.as_str())
    }

    /// Returns the attachments.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns the reactions.
    #[must_use]
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Flattens the body into plain text, resolving mentions through
    /// `mention`.
    ///
    /// Unresolvable mentions fall back to the raw source user id.
    #[must_use]
    pub fn render_body(&self, mention: impl Fn(&SourceUserId) -> Option<String>) -> String {
        let mut text = String::new();
        for segment in &self.body {
            match segment {
                TextSegment::Plain(value) => text.push_str(value),
                TextSegment::Mention(user) => {
                    let rendered = mention(user).unwrap_or_else(|| user.as_str().to_owned());
                    text.push('@');
                    text.push_str(&rendered);
                }
                TextSegment::Link { url, label } => {
                    text.push_str(label.as_deref().unwrap_or(url));
                }
            }
        }
        text
    }
}

/// One source channel: metadata, membership roster, and messages in
/// chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    name: String,
    purpose: Option<String>,
    topic: Option<String>,
    roster: BTreeSet<SourceUserId>,
    messages: Vec<MessageUnit>,
}

impl ChannelRecord {
    /// Creates a channel record, sorting messages chronologically.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        roster: BTreeSet<SourceUserId>,
        mut messages: Vec<MessageUnit>,
    ) -> Self {
        messages.sort_by_key(|m| m.timestamp().sort_key());
        Self {
            name: name.into(),
            purpose: None,
            topic: None,
            roster,
            messages,
        }
    }

    /// Sets the channel purpose.
    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Sets the channel topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the channel purpose.
    #[must_use]
    pub fn purpose(&self) -> Option<&str> {
        self.purpose.as_deref()
    }

    /// Returns the channel topic.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Returns the set of users observed in the channel.
    #[must_use]
    pub const fn roster(&self) -> &BTreeSet<SourceUserId> {
        &self.roster
    }

    /// Returns the messages in chronological order.
    #[must_use]
    pub fn messages(&self) -> &[MessageUnit] {
        &self.messages
    }
}
