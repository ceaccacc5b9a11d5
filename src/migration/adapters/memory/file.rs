//! In-memory destination file API.

use super::{MemoryCalls, ops};
use crate::migration::domain::FileRef;
use crate::migration::ports::{ApiError, ApiResult, FileApi};
use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// An upload recorded by the in-memory file API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Destination reference handed back to the caller.
    pub reference: FileRef,
    /// Uploaded file name.
    pub name: String,
    /// Destination folder.
    pub folder: String,
    /// Uploaded content size in bytes.
    pub size: usize,
}

#[derive(Debug, Default)]
struct MemoryFileState {
    uploads: Vec<StoredUpload>,
    calls: MemoryCalls,
}

/// Thread-safe in-memory destination file API.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileApi {
    state: Arc<RwLock<MemoryFileState>>,
}

impl InMemoryFileApi {
    /// Creates an empty in-memory file API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> ApiResult<RwLockWriteGuard<'_, MemoryFileState>> {
        self.state
            .write()
            .map_err(|err| ApiError::transport(std::io::Error::other(err.to_string())))
    }

    fn read(&self) -> ApiResult<RwLockReadGuard<'_, MemoryFileState>> {
        self.state
            .read()
            .map_err(|err| ApiError::transport(std::io::Error::other(err.to_string())))
    }

    /// Scripts the next `times` uploads to fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn fail_times(&self, error: &ApiError, times: usize) -> ApiResult<()> {
        let mut state = self.write()?;
        state.calls.script_failures(ops::UPLOAD, error, times);
        Ok(())
    }

    /// Returns how many upload calls have been issued.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn upload_calls(&self) -> ApiResult<u64> {
        Ok(self.read()?.calls.count(ops::UPLOAD))
    }

    /// Returns the uploads stored so far.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn uploads(&self) -> ApiResult<Vec<StoredUpload>> {
        Ok(self.read()?.uploads.clone())
    }
}

#[async_trait]
impl FileApi for InMemoryFileApi {
    async fn upload(&self, name: &str, content: &[u8], folder: &str) -> ApiResult<FileRef> {
        let mut state = self.write()?;
        state.calls.begin(ops::UPLOAD)?;
        let reference = FileRef::new(format!("files/{}", Uuid::new_v4().simple()));
        state.uploads.push(StoredUpload {
            reference: reference.clone(),
            name: name.to_owned(),
            folder: folder.to_owned(),
            size: content.len(),
        });
        Ok(reference)
    }
}
