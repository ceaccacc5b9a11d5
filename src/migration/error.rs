//! Error taxonomy for the migration engine.
//!
//! Propagation policy: per-message and per-member failures are recovered
//! locally and recorded in run state; channel-fatal conditions stop that
//! channel only (unless `abort_on_error` elevates them); configuration
//! errors stop the run before any destination mutation.

use super::domain::ConfigError;
use super::ports::{ApiError, ExportError};
use thiserror::Error;

/// Result type for migration operations.
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors that can abort a channel or the whole run.
#[derive(Debug, Clone, Error)]
pub enum MigrationError {
    /// Invalid or contradictory settings; fatal before any channel runs.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The destination container for a channel could not be created.
    #[error("could not create destination space for channel {channel}: {source}")]
    ResourceCreation {
        /// The channel whose space creation failed.
        channel: String,
        /// The underlying API failure.
        source: ApiError,
    },

    /// A channel's failure percentage gate tripped.
    #[error(
        "channel {channel} exceeded the failure threshold: \
         {failed} of {attempted} messages failed"
    )]
    ThresholdExceeded {
        /// The skipped channel.
        channel: String,
        /// Failed message count at the time the gate tripped.
        failed: u64,
        /// Attempted message count at the time the gate tripped.
        attempted: u64,
    },

    /// A destination API call failed outside any recoverable scope.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The export archive could not be read.
    #[error(transparent)]
    Export(#[from] ExportError),
}
