//! Chat-export migration engine.
//!
//! Moves a chat export archive (channels, users, messages, attachments,
//! reactions) into a destination platform through its import API.
//!
//! # Architecture
//!
//! The module follows hexagonal architecture principles:
//!
//! - **Domain**: Pure domain types ([`domain::ChannelRecord`],
//!   [`domain::MessageUnit`], [`domain::MigrationConfig`],
//!   [`domain::MigrationState`], etc.)
//! - **Ports**: Abstract trait interfaces ([`ports::SpaceApi`],
//!   [`ports::FileApi`], [`ports::ExportReader`])
//! - **Adapters**: Concrete implementations
//!   ([`adapters::FsExportReader`], [`adapters::InMemorySpaceApi`],
//!   [`adapters::InMemoryFileApi`])
//! - **Services**: Run orchestration
//!   ([`services::MigrationCoordinator`], [`services::ChannelPipeline`],
//!   [`services::CleanupSweeper`])
//!
//! A run is driven by the [`services::MigrationCoordinator`]: it validates
//! configuration, loads the export through an [`ports::ExportReader`],
//! imports each eligible channel through the [`services::ChannelPipeline`],
//! and finishes with the [`services::CleanupSweeper`] so no destination
//! space is left stranded in import mode. Dry runs wire the same pipeline
//! to the in-memory adapters, making the report a faithful forecast.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
