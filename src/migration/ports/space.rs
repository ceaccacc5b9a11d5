//! Destination space API port and its error taxonomy.

use crate::migration::domain::{
    DestinationMessageId, DestinationSpace, FileRef, SourceTimestamp, SpaceId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for destination API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// How an [`ApiError`] should be treated by the retry envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying with backoff.
    Transient,
    /// Retrying cannot help; fail immediately.
    Permanent,
}

/// Errors surfaced by destination API adapters.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The destination rejected the call for exceeding a rate limit.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The destination service is temporarily unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure reaching the destination.
    #[error("transport failure: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),

    /// The request was malformed or violated a destination constraint.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller lacks permission for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The referenced destination resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The retry envelope gave up after exhausting its attempts.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    ExhaustedRetries {
        /// Attempts made, including the first.
        attempts: u32,
        /// The error returned by the final attempt.
        last: Box<ApiError>,
    },
}

impl ApiError {
    /// Wraps a transport-level error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Classifies the error for retry purposes.
    #[must_use]
    pub const fn classification(&self) -> ErrorClass {
        match self {
            Self::RateLimited(_) | Self::Unavailable(_) | Self::Transport(_) => {
                ErrorClass::Transient
            }
            Self::InvalidArgument(_)
            | Self::PermissionDenied(_)
            | Self::NotFound(_)
            | Self::ExhaustedRetries { .. } => ErrorClass::Permanent,
        }
    }
}

/// A message to create at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Flattened message text.
    pub text: String,
    /// Identity to impersonate; the service principal when `None`.
    pub sender: Option<String>,
    /// Destination id of the thread parent, for replies.
    pub thread_parent: Option<DestinationMessageId>,
    /// Original source timestamp, preserved by import mode.
    pub timestamp: SourceTimestamp,
    /// References to previously uploaded attachments.
    pub file_refs: Vec<FileRef>,
}

impl OutgoingMessage {
    /// Creates a message with text and timestamp only.
    #[must_use]
    pub const fn new(text: String, timestamp: SourceTimestamp) -> Self {
        Self {
            text,
            sender: None,
            thread_parent: None,
            timestamp,
            file_refs: Vec::new(),
        }
    }

    /// Sets the impersonated sender identity.
    #[must_use]
    pub fn with_sender(mut self, email: impl Into<String>) -> Self {
        self.sender = Some(email.into());
        self
    }

    /// Sets the thread parent reference.
    #[must_use]
    pub fn with_thread_parent(mut self, parent: DestinationMessageId) -> Self {
        self.thread_parent = Some(parent);
        self
    }

    /// Attaches uploaded file references.
    #[must_use]
    pub fn with_file_refs(mut self, refs: Vec<FileRef>) -> Self {
        self.file_refs = refs;
        self
    }
}

/// Destination space API contract.
///
/// Implementations perform the remote calls; failure classification and
/// retries are the caller's concern (see the retry envelope).
#[async_trait]
pub trait SpaceApi: Send + Sync {
    /// Creates a space in import mode and returns its destination id.
    async fn create_import_space(&self, display_name: &str) -> ApiResult<SpaceId>;

    /// Adds a member; `historical` marks import-time membership.
    async fn add_member(&self, space: &SpaceId, email: &str, historical: bool) -> ApiResult<()>;

    /// Creates a message, impersonating the sender when one is given.
    async fn post_message(
        &self,
        space: &SpaceId,
        message: &OutgoingMessage,
    ) -> ApiResult<DestinationMessageId>;

    /// Adds a reaction to a message as the given identity.
    async fn add_reaction(
        &self,
        space: &SpaceId,
        message: &DestinationMessageId,
        emoji: &str,
        as_email: &str,
    ) -> ApiResult<()>;

    /// Exits import mode on a space.
    async fn complete_import(&self, space: &SpaceId) -> ApiResult<()>;

    /// Grants external users access to a space.
    async fn set_external_users_allowed(&self, space: &SpaceId) -> ApiResult<()>;

    /// Lists every space attributed to this tool.
    async fn list_managed_spaces(&self) -> ApiResult<Vec<DestinationSpace>>;

    /// Deletes a space.
    async fn delete_space(&self, space: &SpaceId) -> ApiResult<()>;
}
