//! Persistence for conversation state: a durable append-only message log in
//! SQLite fronted by a TTL cache. The log is the source of truth; the cache
//! only accelerates session lookup between turns.

pub mod cache;
pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use cache::{cache_key, ConversationCache, InMemoryConversationCache};
pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{ConversationRepository, RepositoryError, SqlConversationRepository};
pub use store::{ResolvedTurn, StateStore};
