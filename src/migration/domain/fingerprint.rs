//! Attachment content fingerprints for deduplication.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of an attachment: its file name paired with the SHA-256 digest
/// of its content.
///
/// Two attachments with the same name and the same content are the same
/// artifact; the same name over different content is a distinct artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    name: String,
    digest: String,
}

impl Fingerprint {
    /// Computes the fingerprint of an attachment's content.
    #[must_use]
    pub fn of(name: impl Into<String>, content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let digest = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        Self {
            name: name.into(),
            digest,
        }
    }

    /// Returns the file name component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the hex-encoded SHA-256 digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.digest)
    }
}
