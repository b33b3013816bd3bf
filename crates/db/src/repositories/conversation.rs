use sqlx::Row;

use salesbot_core::{ConversationState, Intent, Message};

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn load(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<ConversationState>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT message, intent
             FROM conversation_message
             WHERE session_id = ? AND user_id = ?
             ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut messages = Vec::with_capacity(rows.len());
        let mut intent = Intent::default();
        for row in rows {
            let raw: String = row.get("message");
            let message: Message = serde_json::from_str(&raw).map_err(|error| {
                RepositoryError::Decode(format!("malformed message row: {error}"))
            })?;
            messages.push(message);
            // Rows are in insertion order, so the last one wins.
            intent = Intent::from_label(row.get::<&str, _>("intent"));
        }

        salesbot_core::validate_sequence(&messages).map_err(|error| {
            RepositoryError::Decode(format!("corrupt conversation log for `{session_id}`: {error}"))
        })?;

        let mut state = ConversationState::new(user_id, Some(session_id.to_string()));
        state.intent = intent;
        state.messages = messages;
        Ok(Some(state))
    }

    async fn append(
        &self,
        user_id: &str,
        session_id: &str,
        intent: Intent,
        messages: &[Message],
    ) -> Result<(), RepositoryError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for message in messages {
            let payload = serde_json::to_string(message).map_err(|error| {
                RepositoryError::Decode(format!("unserializable message: {error}"))
            })?;
            sqlx::query(
                "INSERT INTO conversation_message (session_id, user_id, message, intent)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(session_id)
            .bind(user_id)
            .bind(payload)
            .bind(intent.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(
            event_name = "db.conversation.appended",
            session_id = %session_id,
            rows = messages.len(),
            "conversation messages persisted"
        );
        Ok(())
    }
}
