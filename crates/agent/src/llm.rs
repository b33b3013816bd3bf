use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use salesbot_core::config::LlmConfig;
use salesbot_core::{Message, ToolCall};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model rejected the request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),
    #[error("model returned a malformed response: {0}")]
    Malformed(String),
}

impl ModelError {
    /// Whether another attempt could plausibly succeed. Transport failures,
    /// timeouts, throttling, and server errors are worth retrying; a request
    /// the endpoint rejected outright, or a payload it cannot parse, is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Timeout(_))
    }
}

fn status_error(status: reqwest::StatusCode, detail: String) -> ModelError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ModelError::Request(format!("status {status}: {detail}"))
    } else {
        ModelError::Rejected { status: status.as_u16(), detail }
    }
}

/// JSON-schema description of a tool as advertised to the model.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
}

/// One completion: either plain text or a batch of tool-invocation requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), tool_calls: Vec::new() }
    }

    pub fn into_message(self) -> Message {
        Message::assistant_with_calls(self.content, self.tool_calls)
    }
}

/// Black-box language model call. `history` is the full replayed conversation
/// ending with the current turn's human message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantReply, ModelError>;
}

/// OpenAI-compatible chat-completions client. Works against OpenAI, Gemini's
/// compatibility endpoint, and Ollama.
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
    timeout: Duration,
}

impl HttpChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ModelError::Request(error.to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            timeout,
        })
    }

    fn request_body(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({"role": "system", "content": system_prompt})];

        for message in history {
            messages.push(match message {
                Message::Human { content } => {
                    serde_json::json!({"role": "user", "content": content})
                }
                Message::Assistant { content, tool_calls } if tool_calls.is_empty() => {
                    serde_json::json!({"role": "assistant", "content": content})
                }
                Message::Assistant { content, tool_calls } => {
                    let calls: Vec<_> = tool_calls
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                },
                            })
                        })
                        .collect();
                    serde_json::json!({"role": "assistant", "content": content, "tool_calls": calls})
                }
                Message::Tool { call_id, content } => {
                    serde_json::json!({"role": "tool", "tool_call_id": call_id, "content": content})
                }
            });
        }

        let mut body = serde_json::json!({"model": self.model, "messages": messages});
        if !tools.is_empty() {
            let declared: Vec<_> = tools
                .iter()
                .map(|spec| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": spec.name,
                            "description": spec.description,
                            "parameters": spec.input_schema,
                        },
                    })
                })
                .collect();
            body["tools"] = serde_json::Value::Array(declared);
        }
        body
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<AssistantReply, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                ModelError::Timeout(self.timeout)
            } else {
                ModelError::Request(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(status, detail));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|error| ModelError::Malformed(error.to_string()))?;
        completion.into_reply()
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<AssistantReply, ModelError> {
        let body = self.request_body(system_prompt, history, tools);

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(reply) => return Ok(reply),
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => {
                    if attempt >= self.max_retries {
                        return Err(error);
                    }
                    attempt += 1;
                    tracing::warn!(
                        event_name = "agent.model.retry",
                        attempt,
                        error = %error,
                        "retrying model request"
                    );
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

impl CompletionResponse {
    fn into_reply(self) -> Result<AssistantReply, ModelError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Malformed("empty choices array".to_string()))?;

        let mut tool_calls = Vec::with_capacity(choice.message.tool_calls.len());
        for call in choice.message.tool_calls {
            let arguments = serde_json::from_str(&call.function.arguments).map_err(|error| {
                ModelError::Malformed(format!(
                    "tool call `{}` carried non-JSON arguments: {error}",
                    call.function.name
                ))
            })?;
            tool_calls.push(ToolCall { id: call.id, name: call.function.name, arguments });
        }

        Ok(AssistantReply { content: choice.message.content.unwrap_or_default(), tool_calls })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use salesbot_core::Message;

    use super::{status_error, AssistantReply, CompletionResponse, ModelError};

    #[test]
    fn throttling_and_server_errors_are_retryable() {
        for code in [429u16, 500, 502, 503] {
            let status = reqwest::StatusCode::from_u16(code).expect("status");
            let error = status_error(status, "backend busy".to_string());
            assert!(error.is_retryable(), "status {code} should be retryable");
        }
    }

    #[test]
    fn client_errors_are_terminal() {
        for code in [400u16, 401, 403, 404, 422] {
            let status = reqwest::StatusCode::from_u16(code).expect("status");
            let error = status_error(status, "bad request".to_string());
            assert!(matches!(error, ModelError::Rejected { status, .. } if status == code));
            assert!(!error.is_retryable(), "status {code} must not be retried");
        }
    }

    #[test]
    fn malformed_payloads_and_timeouts_classify_as_expected() {
        assert!(!ModelError::Malformed("truncated json".to_string()).is_retryable());
        assert!(ModelError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(ModelError::Request("connection reset".to_string()).is_retryable());
    }

    #[test]
    fn reply_converts_to_assistant_message() {
        let message = AssistantReply::text("xin chào").into_message();
        assert_eq!(message, Message::assistant("xin chào"));
    }

    #[test]
    fn completion_parses_tool_calls_with_string_arguments() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": {
                            "name": "search_products",
                            "arguments": "{\"price_range\": [0, 200000]}"
                        }
                    }]
                }
            }]
        });

        let completion: CompletionResponse = serde_json::from_value(raw).expect("deserialize");
        let reply = completion.into_reply().expect("convert");
        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "search_products");
        assert_eq!(reply.tool_calls[0].arguments["price_range"][1], 200000);
    }

    #[test]
    fn completion_rejects_non_json_tool_arguments() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "function": {"name": "search_products", "arguments": "not json"}
                    }]
                }
            }]
        });

        let completion: CompletionResponse = serde_json::from_value(raw).expect("deserialize");
        assert!(completion.into_reply().is_err());
    }

    #[test]
    fn completion_rejects_empty_choices() {
        let completion: CompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).expect("deserialize");
        assert!(completion.into_reply().is_err());
    }
}
