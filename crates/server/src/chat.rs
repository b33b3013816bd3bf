//! The conversational endpoint. One request carries one user utterance; the
//! response is the assistant's terminal reply for that turn.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use salesbot_agent::ConversationGraph;
use salesbot_core::{ApplicationError, InterfaceError};
use salesbot_db::StateStore;

#[derive(Clone)]
pub struct ChatState {
    pub store: Arc<StateStore>,
    pub graph: Arc<ConversationGraph>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// The user's new utterance for this turn.
    pub messages: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub user_id: String,
    pub session_id: String,
    /// The assistant's reply text.
    pub messages: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/ai_agent", post(chat)).with_state(state)
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let correlation_id = Uuid::new_v4().to_string();

    if request.user_id.trim().is_empty() {
        return Err(reject(
            InterfaceError::BadRequest {
                message: "user_id must not be empty".to_string(),
                correlation_id: correlation_id.clone(),
            },
            &correlation_id,
        ));
    }

    let resolved = state
        .store
        .resolve(&request.user_id, request.session_id.as_deref(), &request.messages)
        .await
        .map_err(|error| {
            reject(
                ApplicationError::Persistence(error.to_string())
                    .into_interface(correlation_id.clone()),
                &correlation_id,
            )
        })?;

    let mut turn = resolved;
    state.graph.run_turn(&mut turn.state).await.map_err(|error| {
        reject(
            ApplicationError::from(error).into_interface(correlation_id.clone()),
            &correlation_id,
        )
    })?;

    state.store.commit(&turn.state, turn.replayed).await.map_err(|error| {
        reject(
            ApplicationError::Persistence(error.to_string())
                .into_interface(correlation_id.clone()),
            &correlation_id,
        )
    })?;

    info!(
        event_name = "server.chat.turn_completed",
        session_id = %turn.state.session_id,
        user_id = %turn.state.user_id,
        intent = turn.state.intent.as_str(),
        correlation_id = %correlation_id,
        messages = turn.state.messages.len(),
        "chat turn completed"
    );

    Ok(Json(ChatResponse {
        user_id: turn.state.user_id.clone(),
        session_id: turn.state.session_id.clone(),
        messages: turn.state.last_reply_text().to_string(),
    }))
}

fn reject(
    interface: InterfaceError,
    correlation_id: &str,
) -> (StatusCode, Json<ErrorResponse>) {
    error!(
        event_name = "server.chat.turn_failed",
        correlation_id = %correlation_id,
        error = %interface,
        "chat turn failed"
    );

    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: interface.user_message().to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}
