//! Chatlift: chat-export migration engine.
//!
//! This crate moves a chat export archive (channels, users, messages,
//! attachments, reactions) into a destination chat platform through its
//! import API, then renders a report of what happened.
//!
//! # Architecture
//!
//! Chatlift follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (filesystem export
//!   reader, in-memory destination doubles)
//!
//! # Modules
//!
//! - [`migration`]: The migration engine itself
//! - [`report`]: Run report rendering

pub mod migration;
pub mod report;
