use std::sync::Arc;
use std::time::Duration;

use salesbot_core::ConversationState;

use crate::cache::{cache_key, ConversationCache};
use crate::repositories::{ConversationRepository, RepositoryError};

/// State handed to the agent for one turn, plus the number of messages that
/// came from history. Only messages past that mark are persisted on commit.
pub struct ResolvedTurn {
    pub state: ConversationState,
    pub replayed: usize,
}

/// Cache-first resolution over the durable conversation log.
///
/// The cache is an accelerator only: a miss (expired entry, restart, cache
/// disabled) falls back to reconstructing the state from the log, and both
/// paths must yield the same history. Commit appends the turn's delta to the
/// log first and refreshes the cache after, so the cache never holds messages
/// the log does not.
pub struct StateStore {
    repository: Arc<dyn ConversationRepository>,
    cache: Option<Arc<dyn ConversationCache>>,
    ttl: Duration,
}

impl StateStore {
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        cache: Option<Arc<dyn ConversationCache>>,
        ttl: Duration,
    ) -> Self {
        Self { repository, cache, ttl }
    }

    /// Resolve the state for an incoming message. A blank or absent session
    /// id starts a fresh conversation with a generated id.
    pub async fn resolve(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        user_input: &str,
    ) -> Result<ResolvedTurn, RepositoryError> {
        let mut state = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(session_id) => self.lookup(user_id, session_id).await?,
            None => ConversationState::new(user_id, None),
        };

        let replayed = state.messages.len();
        state.user_input = user_input.to_string();
        Ok(ResolvedTurn { state, replayed })
    }

    async fn lookup(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<ConversationState, RepositoryError> {
        if let Some(cache) = &self.cache {
            if let Some(state) = cache.get(&cache_key(user_id, session_id)).await {
                tracing::debug!(
                    event_name = "db.state.cache_hit",
                    session_id = %session_id,
                    "conversation state served from cache"
                );
                return Ok(state);
            }
        }

        match self.repository.load(user_id, session_id).await? {
            Some(state) => Ok(state),
            None => Ok(ConversationState::new(user_id, Some(session_id.to_string()))),
        }
    }

    /// Persist the turn. The delta goes to the log inside one transaction;
    /// the cache is refreshed only after that append succeeds.
    pub async fn commit(
        &self,
        state: &ConversationState,
        replayed: usize,
    ) -> Result<(), RepositoryError> {
        let delta = state.messages.get(replayed..).unwrap_or_default();
        if !delta.is_empty() {
            self.repository
                .append(&state.user_id, &state.session_id, state.intent, delta)
                .await?;
        }

        if let Some(cache) = &self.cache {
            cache.set(&cache_key(&state.user_id, &state.session_id), state, self.ttl).await;
        }
        Ok(())
    }
}
