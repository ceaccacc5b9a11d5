//! In-memory destination adapters for dry runs and tests.

mod file;
mod space;

pub use file::{InMemoryFileApi, StoredUpload};
pub use space::{InMemorySpaceApi, StoredMember, StoredMessage, StoredReaction};

use crate::migration::ports::{ApiError, ApiResult};
use std::collections::{HashMap, VecDeque};

/// Operation names used for call counting and failure scripting.
pub mod ops {
    /// Space creation.
    pub const CREATE_SPACE: &str = "spaces.create";
    /// Membership add (historical or regular).
    pub const ADD_MEMBER: &str = "members.add";
    /// Message creation.
    pub const POST_MESSAGE: &str = "messages.post";
    /// Reaction creation.
    pub const ADD_REACTION: &str = "reactions.add";
    /// Import-mode completion.
    pub const COMPLETE_IMPORT: &str = "spaces.complete_import";
    /// External-user access grant.
    pub const SET_EXTERNAL: &str = "spaces.set_external";
    /// Managed-space listing.
    pub const LIST_SPACES: &str = "spaces.list";
    /// Space deletion.
    pub const DELETE_SPACE: &str = "spaces.delete";
    /// Attachment upload.
    pub const UPLOAD: &str = "files.upload";
}

/// Call counters and scripted failures shared by the in-memory adapters.
#[derive(Debug, Default)]
pub(crate) struct MemoryCalls {
    counts: HashMap<String, u64>,
    sequence: Vec<String>,
    failures: HashMap<String, VecDeque<ApiError>>,
}

impl MemoryCalls {
    /// Counts an invocation and pops a scripted failure when one is queued.
    pub(crate) fn begin(&mut self, operation: &str) -> ApiResult<()> {
        *self.counts.entry(operation.to_owned()).or_default() += 1;
        self.sequence.push(operation.to_owned());
        if let Some(queue) = self.failures.get_mut(operation)
            && let Some(error) = queue.pop_front()
        {
            return Err(error);
        }
        Ok(())
    }

    pub(crate) fn script_failures(&mut self, operation: &str, error: &ApiError, times: usize) {
        let queue = self.failures.entry(operation.to_owned()).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    pub(crate) fn count(&self, operation: &str) -> u64 {
        self.counts.get(operation).copied().unwrap_or(0)
    }

    pub(crate) fn sequence(&self) -> Vec<String> {
        self.sequence.clone()
    }
}
