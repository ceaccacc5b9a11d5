//! Application services orchestrating the migration domain.

mod cleanup;
mod coordinator;
mod dedup;
mod identity;
mod pipeline;
mod retry;

pub use cleanup::CleanupSweeper;
pub use coordinator::MigrationCoordinator;
pub use dedup::ContentDeduplicator;
pub use identity::IdentityResolver;
pub use pipeline::ChannelPipeline;
pub use retry::RetryPolicy;
