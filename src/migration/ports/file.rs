//! Destination file-upload port.

use super::space::ApiResult;
use crate::migration::domain::FileRef;
use async_trait::async_trait;

/// Destination file API contract.
#[async_trait]
pub trait FileApi: Send + Sync {
    /// Uploads attachment content and returns the destination reference.
    async fn upload(&self, name: &str, content: &[u8], folder: &str) -> ApiResult<FileRef>;
}
