//! In-memory destination space API.
//!
//! Serves two roles: the no-op collaborator substituted for dry runs, and
//! the scriptable test double for pipeline and cleanup tests. It satisfies
//! the same [`SpaceApi`] contract as a live adapter while creating no
//! external resources.

use super::{MemoryCalls, ops};
use crate::migration::domain::{
    DestinationMessageId, DestinationSpace, SpaceId,
};
use crate::migration::ports::{ApiError, ApiResult, OutgoingMessage, SpaceApi};
use async_trait::async_trait;
use mockable::Clock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// A message stored by the in-memory adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Destination id assigned to the message.
    pub id: DestinationMessageId,
    /// The message payload as received.
    pub message: OutgoingMessage,
}

/// A membership stored by the in-memory adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMember {
    /// Member email.
    pub email: String,
    /// Whether the membership was added historically (import mode).
    pub historical: bool,
}

/// A reaction stored by the in-memory adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReaction {
    /// Emoji name.
    pub emoji: String,
    /// The impersonated reactor.
    pub email: String,
}

#[derive(Debug, Default)]
struct MemorySpaceState {
    spaces: BTreeMap<SpaceId, DestinationSpace>,
    messages: HashMap<SpaceId, Vec<StoredMessage>>,
    members: HashMap<SpaceId, Vec<StoredMember>>,
    reactions: HashMap<DestinationMessageId, Vec<StoredReaction>>,
    calls: MemoryCalls,
}

/// Thread-safe in-memory destination space API.
#[derive(Debug, Clone)]
pub struct InMemorySpaceApi<C>
where
    C: Clock + Send + Sync,
{
    state: Arc<RwLock<MemorySpaceState>>,
    clock: Arc<C>,
}

impl<C> InMemorySpaceApi<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty in-memory space API.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemorySpaceState::default())),
            clock,
        }
    }

    fn write(&self) -> ApiResult<RwLockWriteGuard<'_, MemorySpaceState>> {
        self.state
            .write()
            .map_err(|err| ApiError::transport(std::io::Error::other(err.to_string())))
    }

    fn read(&self) -> ApiResult<RwLockReadGuard<'_, MemorySpaceState>> {
        self.state
            .read()
            .map_err(|err| ApiError::transport(std::io::Error::other(err.to_string())))
    }

    /// Scripts the next `times` calls of `operation` to fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn fail_times(&self, operation: &str, error: &ApiError, times: usize) -> ApiResult<()> {
        let mut state = self.write()?;
        state.calls.script_failures(operation, error, times);
        Ok(())
    }

    /// Returns how many times `operation` has been invoked.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn calls(&self, operation: &str) -> ApiResult<u64> {
        Ok(self.read()?.calls.count(operation))
    }

    /// Returns every invoked operation name in call order.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn operation_log(&self) -> ApiResult<Vec<String>> {
        Ok(self.read()?.calls.sequence())
    }

    /// Returns a snapshot of a stored space.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn space(&self, id: &SpaceId) -> ApiResult<Option<DestinationSpace>> {
        Ok(self.read()?.spaces.get(id).cloned())
    }

    /// Returns the messages stored for a space.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn messages_in(&self, id: &SpaceId) -> ApiResult<Vec<StoredMessage>> {
        Ok(self.read()?.messages.get(id).cloned().unwrap_or_default())
    }

    /// Returns the memberships stored for a space.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn members_of(&self, id: &SpaceId) -> ApiResult<Vec<StoredMember>> {
        Ok(self.read()?.members.get(id).cloned().unwrap_or_default())
    }

    /// Returns the reactions stored for a message.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the internal lock is poisoned.
    pub fn reactions_on(&self, id: &DestinationMessageId) -> ApiResult<Vec<StoredReaction>> {
        Ok(self.read()?.reactions.get(id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl<C> SpaceApi for InMemorySpaceApi<C>
where
    C: Clock + Send + Sync,
{
    async fn create_import_space(&self, display_name: &str) -> ApiResult<SpaceId> {
        let mut state = self.write()?;
        state.calls.begin(ops::CREATE_SPACE)?;
        let id = SpaceId::new(format!("spaces/{}", Uuid::new_v4().simple()));
        let space = DestinationSpace::new(id.clone(), display_name, &*self.clock);
        state.spaces.insert(id.clone(), space);
        Ok(id)
    }

    async fn add_member(&self, space: &SpaceId, email: &str, historical: bool) -> ApiResult<()> {
        let mut state = self.write()?;
        state.calls.begin(ops::ADD_MEMBER)?;
        if !state.spaces.contains_key(space) {
            return Err(ApiError::NotFound(space.to_string()));
        }
        state.members.entry(space.clone()).or_default().push(StoredMember {
            email: email.to_owned(),
            historical,
        });
        Ok(())
    }

    async fn post_message(
        &self,
        space: &SpaceId,
        message: &OutgoingMessage,
    ) -> ApiResult<DestinationMessageId> {
        let mut state = self.write()?;
        state.calls.begin(ops::POST_MESSAGE)?;
        if !state.spaces.contains_key(space) {
            return Err(ApiError::NotFound(space.to_string()));
        }
        let id = DestinationMessageId::new(format!(
            "{space}/messages/{}",
            Uuid::new_v4().simple()
        ));
        state.messages.entry(space.clone()).or_default().push(StoredMessage {
            id: id.clone(),
            message: message.clone(),
        });
        Ok(id)
    }

    async fn add_reaction(
        &self,
        space: &SpaceId,
        message: &DestinationMessageId,
        emoji: &str,
        as_email: &str,
    ) -> ApiResult<()> {
        let mut state = self.write()?;
        state.calls.begin(ops::ADD_REACTION)?;
        let exists = state
            .messages
            .get(space)
            .is_some_and(|stored| stored.iter().any(|m| m.id == *message));
        if !exists {
            return Err(ApiError::NotFound(message.to_string()));
        }
        state.reactions.entry(message.clone()).or_default().push(StoredReaction {
            emoji: emoji.to_owned(),
            email: as_email.to_owned(),
        });
        Ok(())
    }

    async fn complete_import(&self, space: &SpaceId) -> ApiResult<()> {
        let mut state = self.write()?;
        state.calls.begin(ops::COMPLETE_IMPORT)?;
        let stored = state
            .spaces
            .get_mut(space)
            .ok_or_else(|| ApiError::NotFound(space.to_string()))?;
        if !stored.import_mode() {
            return Err(ApiError::InvalidArgument(format!(
                "{space} is not in import mode"
            )));
        }
        stored.complete_import();
        Ok(())
    }

    async fn set_external_users_allowed(&self, space: &SpaceId) -> ApiResult<()> {
        let mut state = self.write()?;
        state.calls.begin(ops::SET_EXTERNAL)?;
        let stored = state
            .spaces
            .get_mut(space)
            .ok_or_else(|| ApiError::NotFound(space.to_string()))?;
        stored.allow_external_users();
        Ok(())
    }

    async fn list_managed_spaces(&self) -> ApiResult<Vec<DestinationSpace>> {
        let mut state = self.write()?;
        state.calls.begin(ops::LIST_SPACES)?;
        Ok(state.spaces.values().cloned().collect())
    }

    async fn delete_space(&self, space: &SpaceId) -> ApiResult<()> {
        let mut state = self.write()?;
        state.calls.begin(ops::DELETE_SPACE)?;
        if state.spaces.remove(space).is_none() {
            return Err(ApiError::NotFound(space.to_string()));
        }
        state.messages.remove(space);
        state.members.remove(space);
        Ok(())
    }
}
