//! Run configuration for a migration.
//!
//! Deserialized from YAML. Every field has a serving default so a partial
//! (or empty) configuration file is valid; [`MigrationConfig::validate`]
//! rejects contradictory settings before any destination mutation occurs.

use super::SourceUserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating run configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// A setting carries a value outside its accepted range.
    #[error("configuration value out of range: {setting} = {value}")]
    OutOfRange {
        /// The offending setting name.
        setting: &'static str,
        /// The rejected value, rendered for display.
        value: String,
    },

    /// Two settings contradict each other.
    #[error("contradictory configuration: {0}")]
    Contradiction(String),
}

/// Strategy for exiting import mode at the end of a channel pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportCompletionStrategy {
    /// Complete only when the channel recorded zero errors.
    #[default]
    SkipOnError,
    /// Always complete, errors notwithstanding.
    ForceComplete,
    /// Never complete; leaves spaces for inspection (the cleanup sweep
    /// finds them).
    AlwaysSkip,
}

/// Effective configuration for one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Channels to process; authoritative when non-empty.
    pub include_channels: Vec<String>,
    /// Channels to skip when no include list is given.
    pub exclude_channels: Vec<String>,
    /// Explicit source-user-id to destination-email overrides.
    pub user_overrides: HashMap<SourceUserId, String>,
    /// Replaces the domain of source-provided emails, preserving the local
    /// part.
    pub email_domain_override: Option<String>,
    /// The destination workspace's own domain, used to classify external
    /// identities. No user is classified external when unset.
    pub workspace_domain: Option<String>,
    /// Halt the whole run when a channel fails.
    pub abort_on_error: bool,
    /// Per-channel failed/attempted percentage above which remaining
    /// messages are skipped.
    pub max_failure_percentage: u8,
    /// How import mode is exited at the end of a channel.
    pub import_completion_strategy: ImportCompletionStrategy,
    /// Delete spaces that cannot be brought to a terminal state.
    pub cleanup_on_error: bool,
    /// Retries per remote call after the initial attempt.
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds; doubles per attempt.
    pub retry_delay_ms: u64,
    /// Skip messages and reactions authored by bot users.
    pub ignore_bots: bool,
    /// Destination folder for uploaded attachments.
    pub attachments_folder: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            include_channels: Vec::new(),
            exclude_channels: Vec::new(),
            user_overrides: HashMap::new(),
            email_domain_override: None,
            workspace_domain: None,
            abort_on_error: false,
            max_failure_percentage: 10,
            import_completion_strategy: ImportCompletionStrategy::default(),
            cleanup_on_error: false,
            max_retries: 3,
            retry_delay_ms: 1000,
            ignore_bots: false,
            attachments_folder: "Imported Attachments".to_owned(),
        }
    }
}

impl MigrationConfig {
    /// Parses configuration from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is not valid YAML
    /// for this shape.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks settings for range and consistency violations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for values outside their accepted
    /// range and [`ConfigError::Contradiction`] for settings that cannot
    /// hold simultaneously.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failure_percentage > 100 {
            return Err(ConfigError::OutOfRange {
                setting: "max_failure_percentage",
                value: self.max_failure_percentage.to_string(),
            });
        }
        if self.max_retries > 0 && self.retry_delay_ms == 0 {
            return Err(ConfigError::Contradiction(
                "max_retries is set but retry_delay_ms is zero".to_owned(),
            ));
        }
        let excluded_and_included: Vec<&String> = self
            .include_channels
            .iter()
            .filter(|name| self.exclude_channels.contains(name))
            .collect();
        if let Some(name) = excluded_and_included.first() {
            return Err(ConfigError::Contradiction(format!(
                "channel {name} appears in both include_channels and exclude_channels"
            )));
        }
        Ok(())
    }

    /// Determines whether a channel is eligible for processing.
    ///
    /// A non-empty include list is authoritative; otherwise the exclude
    /// list removes named channels.
    #[must_use]
    pub fn should_process(&self, channel_name: &str) -> bool {
        if !self.include_channels.is_empty() {
            return self.include_channels.iter().any(|n| n == channel_name);
        }
        !self.exclude_channels.iter().any(|n| n == channel_name)
    }

    /// Returns include/exclude entries naming no known channel.
    ///
    /// Unmatched entries are a configuration warning, not an error.
    #[must_use]
    pub fn unmatched_filter_entries(&self, known_channels: &[&str]) -> Vec<String> {
        self.include_channels
            .iter()
            .chain(self.exclude_channels.iter())
            .filter(|name| !known_channels.contains(&name.as_str()))
            .cloned()
            .collect()
    }

    /// Returns the configured initial backoff delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
