use std::sync::Arc;

use thiserror::Error;

use salesbot_core::{ApplicationError, ConversationState, Intent, Message};

use crate::catalog::{
    CategoryListing, ListCategoriesTool, OrderIntake, SearchProductsTool, SimilaritySearch,
    SubmitOrderTool,
};
use crate::llm::{ChatModel, ModelError};
use crate::nodes::{GreetingNode, IntentDetector, OrderNode, ProductNode, StateUpdate};
use crate::tools::{ToolError, ToolRegistry};

/// Fixed node set of the conversation state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeName {
    IntentDetection,
    Greeting,
    Product,
    ProductTools,
    MakeOrder,
    MakeOrderTools,
}

impl NodeName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntentDetection => "intent_detection",
            Self::Greeting => "greeting",
            Self::Product => "product",
            Self::ProductTools => "product_tools",
            Self::MakeOrder => "make_order",
            Self::MakeOrderTools => "make_order_tools",
        }
    }
}

/// Pure routing step evaluated once per turn, right after intent detection.
pub fn route_intent(intent: Intent) -> NodeName {
    match intent {
        Intent::Product => NodeName::Product,
        Intent::MakeOrder => NodeName::MakeOrder,
        Intent::Greeting => NodeName::Greeting,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    End,
}

/// Pure continuation predicate over the message tail: loop back into the
/// tool node iff the most recent message is an assistant message carrying
/// tool-invocation requests.
pub fn should_continue(messages: &[Message]) -> Continuation {
    match messages.last() {
        Some(message) if !message.tool_calls().is_empty() => Continuation::Continue,
        _ => Continuation::End,
    }
}

/// The source graph has no iteration cap; a model that always requests a tool
/// call would loop forever. Exceeding this bound is turn-fatal.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("model failure in node `{node}`: {source}")]
    Model { node: &'static str, source: ModelError },
    #[error("tool `{name}` failed: {source}")]
    Tool { name: String, source: ToolError },
    #[error("tool loop exceeded {0} rounds without terminating")]
    ToolLoopLimit(u32),
}

impl From<TurnError> for ApplicationError {
    fn from(value: TurnError) -> Self {
        match value {
            TurnError::Model { .. } => Self::Model(value.to_string()),
            TurnError::Tool { .. } | TurnError::ToolLoopLimit(_) => Self::Tool(value.to_string()),
        }
    }
}

#[derive(Clone, Copy)]
enum HandlerKind {
    Product,
    MakeOrder,
}

impl HandlerKind {
    fn node(self) -> NodeName {
        match self {
            Self::Product => NodeName::Product,
            Self::MakeOrder => NodeName::MakeOrder,
        }
    }

    fn tool_node(self) -> NodeName {
        match self {
            Self::Product => NodeName::ProductTools,
            Self::MakeOrder => NodeName::MakeOrderTools,
        }
    }
}

fn visit(node: NodeName) {
    tracing::debug!(event_name = "agent.graph.node_visited", node = node.as_str(), "node visited");
}

/// The conversation state machine: fixed topology, shared read-only across
/// concurrent turns. Each turn owns its `ConversationState` exclusively.
pub struct ConversationGraph {
    intent_detector: IntentDetector,
    greeting: GreetingNode,
    product: ProductNode,
    make_order: OrderNode,
    product_tools: ToolRegistry,
    order_tools: ToolRegistry,
    max_tool_rounds: u32,
}

impl ConversationGraph {
    /// Assemble the graph. Every tool receives an explicit reference to the
    /// collaborator it needs here; nothing reads ambient global state.
    pub fn new(
        model: Arc<dyn ChatModel>,
        search: Arc<dyn SimilaritySearch>,
        categories: Arc<dyn CategoryListing>,
        orders: Arc<dyn OrderIntake>,
    ) -> Self {
        let mut product_tools = ToolRegistry::default();
        product_tools.register(SearchProductsTool::new(search));
        product_tools.register(ListCategoriesTool::new(categories));

        let mut order_tools = ToolRegistry::default();
        order_tools.register(SubmitOrderTool::new(orders));

        Self {
            intent_detector: IntentDetector::new(model.clone()),
            greeting: GreetingNode::new(model.clone()),
            product: ProductNode::new(model.clone(), product_tools.specs()),
            make_order: OrderNode::new(model, order_tools.specs()),
            product_tools,
            order_tools,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: u32) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Drive one turn from entry to terminal. `state.user_input` carries the
    /// new utterance; on success the final assistant reply is the message
    /// tail. Deterministic given identical model and tool responses.
    pub async fn run_turn(&self, state: &mut ConversationState) -> Result<(), TurnError> {
        visit(NodeName::IntentDetection);
        let update = self.intent_detector.handle(state).await;
        apply(state, update);

        match route_intent(state.intent) {
            NodeName::Product => self.run_handler_loop(state, HandlerKind::Product).await,
            NodeName::MakeOrder => self.run_handler_loop(state, HandlerKind::MakeOrder).await,
            _ => {
                visit(NodeName::Greeting);
                let update = self.greeting.handle(state).await.map_err(|source| {
                    TurnError::Model { node: NodeName::Greeting.as_str(), source }
                })?;
                apply(state, update);
                Ok(())
            }
        }
    }

    async fn run_handler_loop(
        &self,
        state: &mut ConversationState,
        handler: HandlerKind,
    ) -> Result<(), TurnError> {
        let registry = match handler {
            HandlerKind::Product => &self.product_tools,
            HandlerKind::MakeOrder => &self.order_tools,
        };

        let mut rounds = 0u32;
        loop {
            visit(handler.node());
            let update = match handler {
                HandlerKind::Product => self.product.handle(state).await,
                HandlerKind::MakeOrder => self.make_order.handle(state).await,
            }
            .map_err(|source| TurnError::Model { node: handler.node().as_str(), source })?;
            apply(state, update);

            match should_continue(&state.messages) {
                Continuation::End => return Ok(()),
                Continuation::Continue => {
                    if rounds >= self.max_tool_rounds {
                        return Err(TurnError::ToolLoopLimit(self.max_tool_rounds));
                    }
                    rounds += 1;
                    visit(handler.tool_node());
                    self.run_tool_node(state, registry).await?;
                }
            }
        }
    }

    /// Execute every invocation requested by the most recent assistant
    /// message and append the results, preserving request order. Invalid
    /// input is surfaced back to the model as the tool-result content;
    /// backend failures abort the turn.
    async fn run_tool_node(
        &self,
        state: &mut ConversationState,
        registry: &ToolRegistry,
    ) -> Result<(), TurnError> {
        let calls = state.last_message().map(|m| m.tool_calls().to_vec()).unwrap_or_default();

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            match registry.dispatch(&call.name, call.arguments.clone()).await {
                Ok(value) => {
                    let content = match value {
                        serde_json::Value::String(text) => text,
                        other => other.to_string(),
                    };
                    results.push(Message::tool(call.id, content));
                }
                Err(error) if error.is_recoverable() => {
                    tracing::warn!(
                        event_name = "agent.tool.rejected_input",
                        tool = %call.name,
                        error = %error,
                        "feeding tool input error back to the model"
                    );
                    results.push(Message::tool(call.id, format!("tool error: {error}")));
                }
                Err(source) => {
                    return Err(TurnError::Tool { name: call.name, source });
                }
            }
        }

        state.append_messages(results);
        Ok(())
    }
}

fn apply(state: &mut ConversationState, update: StateUpdate) {
    if let Some(intent) = update.intent {
        state.intent = intent;
    }
    state.append_messages(update.messages);
}
