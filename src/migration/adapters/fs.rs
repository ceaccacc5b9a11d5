//! Filesystem export reader.
//!
//! Reads an export tree through a capability-scoped directory
//! handle: `users.json` and `channels.json` at the root, one JSON file per
//! day inside each channel directory, and attachment payloads under
//! `__uploads/<file-id>/<name>`.

use crate::migration::domain::{
    Attachment, ChannelRecord, MessageUnit, Reaction, SourceTimestamp, SourceUser, SourceUserId,
    TextSegment, ThreadKey,
};
use crate::migration::ports::{ExportError, ExportReader, ExportResult};
use async_trait::async_trait;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

const UPLOADS_DIR: &str = "__uploads";

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    is_app_user: bool,
    profile: Option<RawProfile>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    name: String,
    purpose: Option<RawTopic>,
    topic: Option<RawTopic>,
    #[serde(default)]
    members: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTopic {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    user: Option<String>,
    ts: Option<String>,
    #[serde(default)]
    text: String,
    thread_ts: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default)]
    reactions: Vec<RawReaction>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReaction {
    name: String,
    #[serde(default)]
    users: Vec<String>,
}

/// Export reader over a directory on the local filesystem.
#[derive(Debug)]
pub struct FsExportReader {
    root: Dir,
}

impl FsExportReader {
    /// Opens the export root directory.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Missing`] when the directory cannot be
    /// opened.
    pub fn open(path: &str) -> ExportResult<Self> {
        let root = Dir::open_ambient_dir(path, ambient_authority())
            .map_err(|_| ExportError::Missing(path.to_owned()))?;
        Ok(Self { root })
    }

    /// Wraps an already opened directory handle.
    #[must_use]
    pub const fn from_dir(root: Dir) -> Self {
        Self { root }
    }

    fn read_file(&self, path: &str) -> ExportResult<String> {
        self.root.read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ExportError::Missing(path.to_owned())
            } else {
                ExportError::Malformed {
                    path: path.to_owned(),
                    detail: err.to_string(),
                }
            }
        })
    }

    fn parse_json<T: serde::de::DeserializeOwned>(path: &str, raw: &str) -> ExportResult<T> {
        serde_json::from_str(raw).map_err(|err| ExportError::Malformed {
            path: path.to_owned(),
            detail: err.to_string(),
        })
    }

    fn day_files(&self, channel: &str) -> ExportResult<Vec<String>> {
        let entries = match self.root.read_dir(channel) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(channel, "channel directory missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(ExportError::Malformed {
                    path: channel.to_owned(),
                    detail: err.to_string(),
                });
            }
        };

        let mut names = Vec::new();
        for dir_entry in entries {
            let entry = dir_entry.map_err(|err| ExportError::Malformed {
                path: channel.to_owned(),
                detail: err.to_string(),
            })?;
            let name = entry.file_name().map_err(|err| ExportError::Malformed {
                path: channel.to_owned(),
                detail: err.to_string(),
            })?;
            if name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn load_attachment(&self, file: &RawFile) -> Option<Attachment> {
        let id = file.id.as_deref()?;
        let name = file.name.as_deref()?;
        let path = format!("{UPLOADS_DIR}/{id}/{name}");
        match self.root.read(&path) {
            Ok(content) => Some(Attachment::new(name, content)),
            Err(err) => {
                warn!(path, error = %err, "attachment payload unavailable, skipping");
                None
            }
        }
    }

    fn build_message(&self, raw: RawMessage) -> Option<MessageUnit> {
        let ts = raw.ts?;
        let author = raw.user?;
        let mut unit = MessageUnit::new(
            SourceUserId::new(author),
            SourceTimestamp::new(ts),
        )
        .with_body(parse_segments(&raw.text));
        if let Some(thread_ts) = raw.thread_ts {
            unit = unit.with_thread_key(ThreadKey::new(thread_ts));
        }
        for file in &raw.files {
            if let Some(attachment) = self.load_attachment(file) {
                unit = unit.with_attachment(attachment);
            }
        }
        for reaction in raw.reactions {
            let reactors = reaction.users.into_iter().map(SourceUserId::new).collect();
            unit = unit.with_reaction(Reaction::new(reaction.name, reactors));
        }
        Some(unit)
    }

    fn load_channel_messages(&self, channel: &str) -> ExportResult<Vec<MessageUnit>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut duplicates: u64 = 0;
        let mut messages = Vec::new();

        for day_file in self.day_files(channel)? {
            let path = format!("{channel}/{day_file}");
            let raw = self.read_file(&path)?;
            let day_messages: Vec<RawMessage> = Self::parse_json(&path, &raw)?;
            for raw_message in day_messages {
                if raw_message.kind.as_deref() != Some("message") {
                    continue;
                }
                if let Some(ts) = raw_message.ts.as_deref() {
                    if seen.contains(ts) {
                        // Thread replies appear once per day file they span.
                        duplicates += 1;
                        continue;
                    }
                    seen.insert(ts.to_owned());
                }
                if let Some(unit) = self.build_message(raw_message) {
                    messages.push(unit);
                }
            }
        }

        if duplicates > 0 {
            debug!(channel, duplicates, "dropped duplicate source timestamps");
        }
        Ok(messages)
    }
}

#[async_trait]
impl ExportReader for FsExportReader {
    async fn load_users(&self) -> ExportResult<HashMap<SourceUserId, SourceUser>> {
        let raw = self.read_file("users.json")?;
        let raw_users: Vec<RawUser> = Self::parse_json("users.json", &raw)?;

        let mut users = HashMap::new();
        for raw_user in raw_users {
            if raw_user.deleted {
                continue;
            }
            let Some(id) = raw_user.id else { continue };
            let name = raw_user
                .name
                .unwrap_or_else(|| format!("user_{}", id.to_ascii_lowercase()));
            let mut user =
                SourceUser::new(name).with_bot_flag(raw_user.is_bot || raw_user.is_app_user);
            if let Some(email) = raw_user.profile.and_then(|p| p.email) {
                user = user.with_email(email);
            }
            users.insert(SourceUserId::new(id), user);
        }
        Ok(users)
    }

    async fn load_channels(&self) -> ExportResult<Vec<ChannelRecord>> {
        let raw = self.read_file("channels.json")?;
        let raw_channels: Vec<RawChannel> = Self::parse_json("channels.json", &raw)?;

        let mut channels = Vec::new();
        for raw_channel in raw_channels {
            let messages = self.load_channel_messages(&raw_channel.name)?;
            let roster: BTreeSet<SourceUserId> = raw_channel
                .members
                .iter()
                .cloned()
                .map(SourceUserId::new)
                .collect();
            let mut record = ChannelRecord::new(raw_channel.name, roster, messages);
            if let Some(purpose) = raw_channel.purpose.and_then(|t| t.value)
                && !purpose.is_empty()
            {
                record = record.with_purpose(purpose);
            }
            if let Some(topic) = raw_channel.topic.and_then(|t| t.value)
                && !topic.is_empty()
            {
                record = record.with_topic(topic);
            }
            channels.push(record);
        }
        Ok(channels)
    }
}

/// Splits source markup into rich-text segments.
///
/// Recognizes `<@UID>` mentions and `<url|label>` links; everything else is
/// literal text.
#[must_use]
pub fn parse_segments(text: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            plain.push(c);
            continue;
        }

        let mut token = String::new();
        let mut closed = false;
        for t in chars.by_ref() {
            if t == '>' {
                closed = true;
                break;
            }
            token.push(t);
        }
        if !closed {
            plain.push('<');
            plain.push_str(&token);
            break;
        }

        if let Some(mention) = token.strip_prefix('@') {
            let id = mention.split('|').next().unwrap_or(mention);
            flush_plain(&mut segments, &mut plain);
            segments.push(TextSegment::Mention(SourceUserId::new(id)));
        } else if token.starts_with("http://") || token.starts_with("https://") {
            let mut parts = token.splitn(2, '|');
            let url = parts.next().unwrap_or(&token).to_owned();
            let label = parts.next().map(ToOwned::to_owned);
            flush_plain(&mut segments, &mut plain);
            segments.push(TextSegment::Link { url, label });
        } else {
            plain.push('<');
            plain.push_str(&token);
            plain.push('>');
        }
    }

    flush_plain(&mut segments, &mut plain);
    segments
}

fn flush_plain(segments: &mut Vec<TextSegment>, plain: &mut String) {
    if !plain.is_empty() {
        segments.push(TextSegment::Plain(std::mem::take(plain)));
    }
}
