use std::sync::Arc;

use salesbot_core::{ConversationState, Intent, Message};

use crate::llm::{ChatModel, ModelError, ToolSpec};
use crate::prompts;

/// Partial state update produced by one node visit. The orchestrator merges
/// it into the turn's `ConversationState`: messages are appended, the intent
/// is replaced when present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateUpdate {
    pub intent: Option<Intent>,
    pub messages: Vec<Message>,
}

/// Classifies the user's goal into the closed intent set.
///
/// This node is deliberately infallible: a model failure or an out-of-set
/// label degrades to `Greeting` instead of aborting the turn, and the raw
/// user input is still recorded as a human message either way.
pub struct IntentDetector {
    model: Arc<dyn ChatModel>,
}

impl IntentDetector {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn handle(&self, state: &ConversationState) -> StateUpdate {
        let user_input = state.user_input.clone();
        if user_input.trim().is_empty() {
            return StateUpdate {
                intent: Some(Intent::Greeting),
                messages: vec![Message::human(user_input)],
            };
        }

        let prompt = prompts::intent_detection(state.intent.as_str());
        let mut history = state.messages.clone();
        history.push(Message::human(user_input.clone()));

        let intent = match self.model.complete(&prompt, &history, &[]).await {
            Ok(reply) => {
                let label = reply.content.trim().to_lowercase();
                match Intent::parse_label(&label) {
                    Some(intent) => intent,
                    None => {
                        tracing::warn!(
                            event_name = "agent.intent.unexpected_label",
                            label = %label,
                            "model returned an out-of-set intent, defaulting to greeting"
                        );
                        Intent::Greeting
                    }
                }
            }
            Err(error) => {
                tracing::error!(
                    event_name = "agent.intent.classification_failed",
                    error = %error,
                    "intent classification failed, defaulting to greeting"
                );
                Intent::Greeting
            }
        };

        tracing::info!(
            event_name = "agent.intent.detected",
            intent = intent.as_str(),
            "intent detected"
        );

        StateUpdate { intent: Some(intent), messages: vec![Message::human(user_input)] }
    }
}

/// Shared completion step for the task handlers: system prompt plus replayed
/// history, optionally advertising a bound tool set.
async fn complete_with(
    model: &dyn ChatModel,
    system_prompt: &str,
    state: &ConversationState,
    tools: &[ToolSpec],
) -> Result<StateUpdate, ModelError> {
    let reply = model.complete(system_prompt, &state.messages, tools).await?;
    Ok(StateUpdate { intent: None, messages: vec![reply.into_message()] })
}

/// Handles small talk and anything that fell through intent coercion.
pub struct GreetingNode {
    model: Arc<dyn ChatModel>,
}

impl GreetingNode {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn handle(&self, state: &ConversationState) -> Result<StateUpdate, ModelError> {
        complete_with(self.model.as_ref(), prompts::GREETING, state, &[]).await
    }
}

/// Product advice handler, bound to the search and category tools.
pub struct ProductNode {
    model: Arc<dyn ChatModel>,
    tools: Vec<ToolSpec>,
}

impl ProductNode {
    pub fn new(model: Arc<dyn ChatModel>, tools: Vec<ToolSpec>) -> Self {
        Self { model, tools }
    }

    pub async fn handle(&self, state: &ConversationState) -> Result<StateUpdate, ModelError> {
        complete_with(self.model.as_ref(), prompts::PRODUCT, state, &self.tools).await
    }
}

/// Order drafting handler, bound to the order submission tool.
pub struct OrderNode {
    model: Arc<dyn ChatModel>,
    tools: Vec<ToolSpec>,
}

impl OrderNode {
    pub fn new(model: Arc<dyn ChatModel>, tools: Vec<ToolSpec>) -> Self {
        Self { model, tools }
    }

    pub async fn handle(&self, state: &ConversationState) -> Result<StateUpdate, ModelError> {
        complete_with(self.model.as_ref(), prompts::MAKE_ORDER, state, &self.tools).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use salesbot_core::{ConversationState, Intent, Message};

    use super::{GreetingNode, IntentDetector};
    use crate::llm::{AssistantReply, ChatModel, ModelError, ToolSpec};

    /// Model stub returning scripted replies in order, counting calls.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<AssistantReply, ModelError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<AssistantReply, ModelError>>) -> Self {
            Self { replies: Mutex::new(replies), calls: AtomicUsize::new(0) }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[Message],
            _tools: &[ToolSpec],
        ) -> Result<AssistantReply, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().expect("lock");
            if replies.is_empty() {
                return Err(ModelError::Request("script exhausted".to_string()));
            }
            replies.remove(0)
        }
    }

    fn state_with_input(input: &str) -> ConversationState {
        let mut state = ConversationState::new("u1", Some("s1".to_string()));
        state.user_input = input.to_string();
        state
    }

    #[tokio::test]
    async fn empty_input_short_circuits_without_a_model_call() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let detector = IntentDetector::new(model.clone());

        let update = detector.handle(&state_with_input("  ")).await;

        assert_eq!(update.intent, Some(Intent::Greeting));
        assert_eq!(model.call_count(), 0);
        assert_eq!(update.messages.len(), 1);
        assert!(matches!(update.messages[0], Message::Human { .. }));
    }

    #[tokio::test]
    async fn detected_intent_comes_from_model_label() {
        let model =
            Arc::new(ScriptedModel::new(vec![Ok(AssistantReply::text(" Product \n"))]));
        let detector = IntentDetector::new(model);

        let update = detector.handle(&state_with_input("tôi muốn mua áo thun")).await;
        assert_eq!(update.intent, Some(Intent::Product));
    }

    #[tokio::test]
    async fn garbage_label_coerces_to_greeting() {
        let model =
            Arc::new(ScriptedModel::new(vec![Ok(AssistantReply::text("buy-stuff-now!!"))]));
        let detector = IntentDetector::new(model);

        let update = detector.handle(&state_with_input("hmm")).await;
        assert_eq!(update.intent, Some(Intent::Greeting));
    }

    #[tokio::test]
    async fn model_failure_degrades_to_greeting_and_keeps_the_human_message() {
        let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::Request(
            "connection refused".to_string(),
        ))]));
        let detector = IntentDetector::new(model);

        let update = detector.handle(&state_with_input("xin chào")).await;
        assert_eq!(update.intent, Some(Intent::Greeting));
        assert_eq!(update.messages, vec![Message::human("xin chào")]);
    }

    #[tokio::test]
    async fn greeting_node_appends_one_assistant_message() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(AssistantReply::text(
            "Chào bạn! Mình có thể giúp gì?",
        ))]));
        let node = GreetingNode::new(model);

        let mut state = state_with_input("xin chào");
        state.messages.push(Message::human("xin chào"));

        let update = node.handle(&state).await.expect("handle");
        assert_eq!(update.intent, None);
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].content(), "Chào bạn! Mình có thể giúp gì?");
    }

    #[tokio::test]
    async fn greeting_node_propagates_model_failure() {
        let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::Request(
            "boom".to_string(),
        ))]));
        let node = GreetingNode::new(model);

        let state = state_with_input("xin chào");
        assert!(node.handle(&state).await.is_err());
    }
}
