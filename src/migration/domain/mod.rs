//! Pure domain types for the migration engine.
//!
//! No infrastructure dependencies live here; remote interactions are
//! abstracted behind the ports in [`crate::migration::ports`].

mod channel;
mod config;
mod context;
mod fingerprint;
mod identity;
mod ids;
mod report;
mod space;
mod state;

pub use channel::{Attachment, ChannelRecord, MessageUnit, Reaction, TextSegment};
pub use config::{ConfigError, ImportCompletionStrategy, MigrationConfig};
pub use context::MigrationContext;
pub use fingerprint::Fingerprint;
pub use identity::{ResolvedIdentity, SourceUser};
pub use ids::{
    DestinationMessageId, FileRef, RunId, SourceTimestamp, SourceUserId, SpaceId, ThreadKey,
};
pub use report::{ChannelReport, CleanupReport, Recommendation, RunReport, RunTotals};
pub use space::DestinationSpace;
pub use state::{
    ChannelOutcome, ChannelStats, ErrorRecord, MigrationState, SkippedReaction, UnresolvedUser,
};
