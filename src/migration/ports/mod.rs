//! Abstract trait interfaces for external collaborators.

pub mod export;
pub mod file;
pub mod space;

pub use export::{ExportError, ExportReader, ExportResult};
pub use file::FileApi;
pub use space::{ApiError, ApiResult, ErrorClass, OutgoingMessage, SpaceApi};
