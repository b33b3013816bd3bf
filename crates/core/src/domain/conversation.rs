use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Closed set of conversational goals the intent detector may produce.
///
/// Anything outside this set coming back from the model is coerced to
/// `Greeting` rather than surfaced as an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Greeting,
    Product,
    MakeOrder,
}

impl Intent {
    /// Parse a raw model label. Returns `None` for out-of-set labels so the
    /// caller can log the coercion before falling back to `Greeting`.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "greeting" => Some(Self::Greeting),
            "product" => Some(Self::Product),
            "make_order" => Some(Self::MakeOrder),
            _ => None,
        }
    }

    /// Fail-safe parse: out-of-set labels become `Greeting`.
    pub fn from_label(label: &str) -> Self {
        Self::parse_label(label).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Product => "product",
            Self::MakeOrder => "make_order",
        }
    }
}

/// A tool invocation requested by the assistant mid-turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One turn's contribution to the conversation history.
///
/// The `type` tag doubles as the row discriminator in durable storage, so the
/// variant names here are a persistence contract, not just serde cosmetics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "human")]
    Human { content: String },
    #[serde(rename = "ai")]
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    #[serde(rename = "tool")]
    Tool { call_id: String, content: String },
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: content.into(), tool_calls: Vec::new() }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant { content: content.into(), tool_calls }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool { call_id: call_id.into(), content: content.into() }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Human { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Tool invocations requested by this message. Empty for anything other
    /// than an assistant message that asked for tools.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Check the ordering contract of a replayed history: every tool result must
/// answer an invocation requested by the nearest preceding assistant message.
/// Batched invocations produce consecutive tool results, all answering the
/// same assistant message.
pub fn validate_sequence(messages: &[Message]) -> Result<(), DomainError> {
    for (index, message) in messages.iter().enumerate() {
        let Message::Tool { call_id, .. } = message else { continue };
        let requested = messages[..index]
            .iter()
            .rev()
            .find(|prior| !matches!(prior, Message::Tool { .. }))
            .map(Message::tool_calls)
            .is_some_and(|calls| calls.iter().any(|call| call.id == *call_id));
        if !requested {
            return Err(DomainError::OrphanToolResult);
        }
    }
    Ok(())
}

/// The unit of work for one conversation turn and the unit of persistence.
///
/// `messages` is append-only across turns and is the sole conversational
/// context replayed into the model. `user_input` is transient: it carries the
/// current turn's raw text and is overwritten on every resolve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationState {
    /// Create a fresh state, generating a session id when the caller did not
    /// supply one. `session_id` is never empty at rest.
    pub fn new(user_id: impl Into<String>, session_id: Option<String>) -> Self {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            session_id,
            user_id: user_id.into(),
            user_input: String::new(),
            intent: Intent::default(),
            messages: Vec::new(),
        }
    }

    /// Merge rule for node output: concatenate to the end, never reorder.
    pub fn append_messages(&mut self, messages: Vec<Message>) {
        self.messages.extend(messages);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the final assistant-visible message, used as the turn's reply.
    pub fn last_reply_text(&self) -> &str {
        self.last_message().map(Message::content).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_sequence, ConversationState, Intent, Message, ToolCall};
    use crate::errors::DomainError;

    #[test]
    fn intent_labels_round_trip() {
        assert_eq!(Intent::parse_label("product"), Some(Intent::Product));
        assert_eq!(Intent::parse_label(" MAKE_ORDER "), Some(Intent::MakeOrder));
        assert_eq!(Intent::parse_label("greeting"), Some(Intent::Greeting));
        assert_eq!(Intent::from_label("product").as_str(), "product");
    }

    #[test]
    fn out_of_set_labels_coerce_to_greeting() {
        assert_eq!(Intent::parse_label("chitchat"), None);
        assert_eq!(Intent::from_label("chitchat"), Intent::Greeting);
        assert_eq!(Intent::from_label(""), Intent::Greeting);
    }

    #[test]
    fn message_serialization_carries_type_discriminator() {
        let human = serde_json::to_value(Message::human("hello")).expect("serialize");
        assert_eq!(human["type"], "human");

        let assistant = serde_json::to_value(Message::assistant("hi there")).expect("serialize");
        assert_eq!(assistant["type"], "ai");
        assert!(assistant.get("tool_calls").is_none(), "empty tool calls should be omitted");

        let tool = serde_json::to_value(Message::tool("call-1", "result")).expect("serialize");
        assert_eq!(tool["type"], "tool");
    }

    #[test]
    fn assistant_message_round_trips_tool_calls() {
        let message = Message::assistant_with_calls(
            "",
            vec![ToolCall {
                id: "call-1".to_string(),
                name: "search_products".to_string(),
                arguments: serde_json::json!({"price_range": [0.0, 200000.0]}),
            }],
        );

        let encoded = serde_json::to_string(&message).expect("serialize");
        let decoded: Message = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, message);
        assert_eq!(decoded.tool_calls().len(), 1);
    }

    #[test]
    fn batched_tool_results_validate_against_the_requesting_message() {
        let request = Message::assistant_with_calls(
            "",
            vec![
                ToolCall {
                    id: "c1".to_string(),
                    name: "search_products".to_string(),
                    arguments: serde_json::json!({}),
                },
                ToolCall {
                    id: "c2".to_string(),
                    name: "list_categories".to_string(),
                    arguments: serde_json::json!({}),
                },
            ],
        );

        let history = vec![
            Message::human("tư vấn giúp mình"),
            request,
            Message::tool("c1", "[]"),
            Message::tool("c2", "[]"),
            Message::assistant("Mình chưa tìm thấy mẫu phù hợp."),
        ];
        assert_eq!(validate_sequence(&history), Ok(()));
    }

    #[test]
    fn orphan_tool_result_is_rejected() {
        let no_request = vec![Message::human("hi"), Message::tool("c9", "result")];
        assert_eq!(validate_sequence(&no_request), Err(DomainError::OrphanToolResult));

        let wrong_id = vec![
            Message::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "c1".to_string(),
                    name: "search_products".to_string(),
                    arguments: serde_json::json!({}),
                }],
            ),
            Message::tool("c2", "result"),
        ];
        assert_eq!(validate_sequence(&wrong_id), Err(DomainError::OrphanToolResult));
    }

    #[test]
    fn new_state_generates_session_id_when_absent() {
        let generated = ConversationState::new("u1", None);
        assert!(!generated.session_id.is_empty());

        let blank = ConversationState::new("u1", Some("  ".to_string()));
        assert!(!blank.session_id.trim().is_empty());

        let supplied = ConversationState::new("u1", Some("s1".to_string()));
        assert_eq!(supplied.session_id, "s1");
    }

    #[test]
    fn append_preserves_order() {
        let mut state = ConversationState::new("u1", Some("s1".to_string()));
        state.append_messages(vec![Message::human("first")]);
        state.append_messages(vec![Message::assistant("second"), Message::human("third")]);

        let contents: Vec<&str> = state.messages.iter().map(Message::content).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(state.last_reply_text(), "third");
    }
}
