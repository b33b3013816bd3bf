use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use salesbot_core::ConversationState;

/// Composite cache key. Scoping by user as well as session keeps one user
/// from reading another's conversation through a guessed session id.
pub fn cache_key(user_id: &str, session_id: &str) -> String {
    format!("ai_agent:{user_id}:{session_id}")
}

/// Hot-path store for conversation state. Purely an accelerator: every entry
/// is reconstructible from the conversation log, so eviction or loss is never
/// a correctness problem and the methods are infallible by contract.
#[async_trait]
pub trait ConversationCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<ConversationState>;
    async fn set(&self, key: &str, state: &ConversationState, ttl: Duration);
    async fn flush_all(&self);
}

/// Process-local cache with per-entry expiry. There is no background
/// sweeper: expired entries are dropped when read, and every write prunes
/// whatever has lapsed, so the footprint tracks live sessions.
#[derive(Default)]
pub struct InMemoryConversationCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    deadline: Instant,
    state: ConversationState,
}

impl InMemoryConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConversationCache for InMemoryConversationCache {
    async fn get(&self, key: &str) -> Option<ConversationState> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.deadline => Some(entry.state.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, state: &ConversationState, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        // Sessions that idle out and are never resolved again would otherwise
        // pin their history in memory for the life of the process.
        entries.retain(|_, entry| now < entry.deadline);
        entries.insert(key.to_string(), CacheEntry { deadline: now + ttl, state: state.clone() });
    }

    async fn flush_all(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use salesbot_core::{ConversationState, Message};

    use super::{cache_key, ConversationCache, InMemoryConversationCache};

    fn sample_state() -> ConversationState {
        let mut state = ConversationState::new("u1", Some("s1".to_string()));
        state.append_messages(vec![Message::human("xin chào"), Message::assistant("chào bạn")]);
        state
    }

    #[test]
    fn key_is_scoped_by_user_and_session() {
        assert_eq!(cache_key("u1", "s1"), "ai_agent:u1:s1");
        assert_ne!(cache_key("u1", "s1"), cache_key("u2", "s1"));
    }

    #[tokio::test]
    async fn round_trips_before_expiry() {
        let cache = InMemoryConversationCache::new();
        let state = sample_state();

        cache.set("k", &state, Duration::from_secs(600)).await;
        let cached = cache.get("k").await.expect("hit");
        assert_eq!(cached.messages, state.messages);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = InMemoryConversationCache::new();
        cache.set("k", &sample_state(), Duration::ZERO).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn flush_all_clears_every_entry() {
        let cache = InMemoryConversationCache::new();
        cache.set("a", &sample_state(), Duration::from_secs(600)).await;
        cache.set("b", &sample_state(), Duration::from_secs(600)).await;

        cache.flush_all().await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn set_prunes_entries_whose_ttl_has_lapsed() {
        let cache = InMemoryConversationCache::new();
        let state = sample_state();

        for index in 0..100 {
            cache.set(&format!("k{index}"), &state, Duration::ZERO).await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;

        cache.set("fresh", &state, Duration::from_secs(600)).await;
        assert_eq!(cache.len(), 1, "idle sessions must not pin memory");
        assert!(cache.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn set_overwrites_the_previous_entry() {
        let cache = InMemoryConversationCache::new();
        let mut state = sample_state();
        cache.set("k", &state, Duration::from_secs(600)).await;

        state.append_messages(vec![Message::human("còn mẫu khác không?")]);
        cache.set("k", &state, Duration::from_secs(600)).await;

        let cached = cache.get("k").await.expect("hit");
        assert_eq!(cached.messages.len(), 3);
    }
}
