//! Source users and resolved destination identities.

use serde::{Deserialize, Serialize};

/// A user as observed in the source export's user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUser {
    name: String,
    email: Option<String>,
    is_bot: bool,
}

impl SourceUser {
    /// Creates a source user with no email and no bot flag.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            is_bot: false,
        }
    }

    /// Sets the source-provided email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Marks the user as a bot or app user.
    #[must_use]
    pub const fn with_bot_flag(mut self, is_bot: bool) -> Self {
        self.is_bot = is_bot;
        self
    }

    /// Returns the user's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the source-provided email, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns true when the user is a bot or app user.
    #[must_use]
    pub const fn is_bot(&self) -> bool {
        self.is_bot
    }
}

/// The destination identity a source user resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    email: Option<String>,
    is_external: bool,
}

impl ResolvedIdentity {
    /// Creates a resolved identity with a destination workspace email.
    #[must_use]
    pub fn resolved(email: impl Into<String>, is_external: bool) -> Self {
        Self {
            email: Some(email.into()),
            is_external,
        }
    }

    /// Creates a placeholder identity for a user with no resolvable email.
    ///
    /// Placeholder identities are recorded for reporting but excluded from
    /// destination membership and impersonation calls.
    #[must_use]
    pub const fn unresolved() -> Self {
        Self {
            email: None,
            is_external: false,
        }
    }

    /// Returns the resolved email, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns true when an email could be resolved.
    #[must_use]
    pub const fn has_email(&self) -> bool {
        self.email.is_some()
    }

    /// Returns true when the resolved email belongs to a domain other than
    /// the destination workspace's own.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.is_external
    }
}
