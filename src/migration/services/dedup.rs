//! Attachment content deduplication.
//!
//! Identical payloads are uploaded once per run. Identity is the content
//! fingerprint; the run state carries the fingerprint-to-reference map so
//! the policy itself stays stateless.
//!
//! The policy is split into lookup and record phases so the caller can wrap
//! the upload itself in the retry envelope: nothing is recorded for a failed
//! upload, and a later occurrence of the same content tries again.

use crate::migration::domain::{Attachment, FileRef, Fingerprint, MigrationState};
use tracing::debug;

/// Upload-once policy for attachment content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentDeduplicator;

impl ContentDeduplicator {
    /// Creates the policy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Fingerprints `attachment` and returns the already uploaded reference
    /// when this run has seen the same content before.
    #[must_use]
    pub fn known_reference(
        &self,
        attachment: &Attachment,
        state: &MigrationState,
    ) -> (Fingerprint, Option<FileRef>) {
        let fingerprint = attachment.fingerprint();
        let existing = state.uploaded_reference(&fingerprint).cloned();
        if existing.is_some() {
            debug!(
                name = attachment.name(),
                "reusing previously uploaded content"
            );
        }
        (fingerprint, existing)
    }

    /// Records the destination reference for freshly uploaded content.
    pub fn record_uploaded(
        &self,
        fingerprint: Fingerprint,
        reference: FileRef,
        state: &mut MigrationState,
    ) {
        state.record_upload(fingerprint, reference);
    }
}
