//! Source-user identity resolution.
//!
//! Maps source user ids to destination email addresses through, in order:
//! the configured override table, the domain rewrite, and the export's own
//! profile email. Users with no route end up unresolved and are reported.

use crate::migration::domain::{
    MigrationConfig, MigrationState, ResolvedIdentity, SourceUser, SourceUserId, UnresolvedUser,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves source users to destination identities, caching results in the
/// run state so each user is resolved once.
#[derive(Debug)]
pub struct IdentityResolver {
    config: Arc<MigrationConfig>,
    users: HashMap<SourceUserId, SourceUser>,
}

impl IdentityResolver {
    /// Creates a resolver over the export's user directory.
    #[must_use]
    pub const fn new(
        config: Arc<MigrationConfig>,
        users: HashMap<SourceUserId, SourceUser>,
    ) -> Self {
        Self { config, users }
    }

    /// Returns true when the user is a bot or app account.
    #[must_use]
    pub fn is_bot(&self, id: &SourceUserId) -> bool {
        self.users.get(id).is_some_and(SourceUser::is_bot)
    }

    /// Returns the user's display name from the export, if known.
    #[must_use]
    pub fn display_name(&self, id: &SourceUserId) -> Option<&str> {
        self.users.get(id).map(SourceUser::name)
    }

    /// Resolves `id`, consulting and updating the cache in `state`.
    pub fn resolve(&self, id: &SourceUserId, state: &mut MigrationState) -> ResolvedIdentity {
        if let Some(cached) = state.resolution(id) {
            return cached.clone();
        }
        let identity = self.compute(id, state);
        state.record_resolution(id, identity.clone());
        identity
    }

    fn compute(&self, id: &SourceUserId, state: &mut MigrationState) -> ResolvedIdentity {
        if let Some(email) = self.config.user_overrides.get(id) {
            debug!(user = %id, "identity resolved via override table");
            return ResolvedIdentity::resolved(email.clone(), self.is_external(email));
        }

        let Some(user) = self.users.get(id) else {
            state.record_user_without_email(UnresolvedUser {
                id: id.clone(),
                name: id.as_str().to_owned(),
                is_bot: false,
            });
            return ResolvedIdentity::unresolved();
        };

        if let Some(profile_email) = user.email() {
            let email = self.rewrite_domain(profile_email);
            let external = self.is_external(&email);
            return ResolvedIdentity::resolved(email, external);
        }

        state.record_user_without_email(UnresolvedUser {
            id: id.clone(),
            name: user.name().to_owned(),
            is_bot: user.is_bot(),
        });
        ResolvedIdentity::unresolved()
    }

    fn rewrite_domain(&self, email: &str) -> String {
        match (&self.config.email_domain_override, email.split_once('@')) {
            (Some(domain), Some((local, _))) => format!("{local}@{domain}"),
            _ => email.to_owned(),
        }
    }

    fn is_external(&self, email: &str) -> bool {
        let Some(workspace) = &self.config.workspace_domain else {
            return false;
        };
        email
            .split_once('@')
            .is_some_and(|(_, domain)| !domain.eq_ignore_ascii_case(workspace))
    }
}
