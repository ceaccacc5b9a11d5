//! Export-reader port for loading source archive data.

use crate::migration::domain::{ChannelRecord, SourceUser, SourceUserId};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Result type for export-reader operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors surfaced by export readers.
///
/// Malformed content is deliberately distinct from absent files: a missing
/// file may be tolerable, a corrupt one never is.
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// A required export file is absent.
    #[error("missing export file: {0}")]
    Missing(String),

    /// An export file exists but could not be parsed.
    #[error("malformed export file {path}: {detail}")]
    Malformed {
        /// Path of the unparseable file.
        path: String,
        /// Parser diagnostic.
        detail: String,
    },
}

/// Source archive reading contract.
#[async_trait]
pub trait ExportReader: Send + Sync {
    /// Loads the source user listing.
    async fn load_users(&self) -> ExportResult<HashMap<SourceUserId, SourceUser>>;

    /// Loads all channels with their messages in chronological order.
    async fn load_channels(&self) -> ExportResult<Vec<ChannelRecord>>;
}
