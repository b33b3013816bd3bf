use async_trait::async_trait;
use thiserror::Error;

use salesbot_core::{ConversationState, Intent, Message};

pub mod conversation;

pub use conversation::SqlConversationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable, append-only record of every conversation.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Reconstruct a session's state from its message log. `None` when the
    /// session has no rows.
    async fn load(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<ConversationState>, RepositoryError>;

    /// Append the turn's new messages. Rows already written are never
    /// updated or deleted.
    async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        intent: Intent,
        messages: &[Message],
    ) -> Result<(), RepositoryError>;
}
