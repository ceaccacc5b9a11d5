//! Concrete adapters for the migration ports.

pub mod fs;
pub mod memory;

pub use fs::{FsExportReader, parse_segments};
pub use memory::{InMemoryFileApi, InMemorySpaceApi};
