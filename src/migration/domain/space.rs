//! Destination space aggregate.

use super::SpaceId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// A destination container created for a channel.
///
/// The import-mode flag transitions to `false` exactly once, either at
/// normal pipeline completion or during the cleanup sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSpace {
    id: SpaceId,
    display_name: String,
    import_mode: bool,
    external_users_allowed: bool,
    created_at: DateTime<Utc>,
}

impl DestinationSpace {
    /// Creates a space in import mode.
    #[must_use]
    pub fn new(id: SpaceId, display_name: impl Into<String>, clock: &impl Clock) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            import_mode: true,
            external_users_allowed: false,
            created_at: clock.utc(),
        }
    }

    /// Returns the destination space identifier.
    #[must_use]
    pub const fn id(&self) -> &SpaceId {
        &self.id
    }

    /// Returns the display name the space was created with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns true while the space is still in import mode.
    #[must_use]
    pub const fn import_mode(&self) -> bool {
        self.import_mode
    }

    /// Returns true when external users have been granted access.
    #[must_use]
    pub const fn external_users_allowed(&self) -> bool {
        self.external_users_allowed
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Exits import mode.
    pub const fn complete_import(&mut self) {
        self.import_mode = false;
    }

    /// Grants external users access to the space.
    pub const fn allow_external_users(&mut self) {
        self.external_users_allowed = true;
    }
}
