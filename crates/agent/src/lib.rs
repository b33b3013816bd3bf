//! Conversation engine for the shop assistant.
//!
//! This crate drives one turn of conversation:
//! 1. **Intent detection** (`nodes`) - classify the user's goal into a closed set
//! 2. **Routing** (`graph`) - map the detected intent to a task handler
//! 3. **Handlers** (`nodes`) - greeting, product advice, order drafting
//! 4. **Tool loop** (`graph`, `tools`) - execute model-requested tool calls
//!    until the model answers in plain text
//!
//! # Key Types
//!
//! - `ConversationGraph` - the fixed node graph and turn driver
//! - `ChatModel` - pluggable trait over the language model call
//! - `Tool` / `ToolRegistry` - named operations the model may invoke mid-turn
//! - `SimilaritySearch` / `CategoryListing` / `OrderIntake` - collaborator
//!   interfaces for the product backend, injected at graph assembly time
//!
//! The model never touches storage directly. Everything it can do to the
//! outside world goes through a registered tool with a validated input schema.

pub mod catalog;
pub mod graph;
pub mod llm;
pub mod nodes;
pub mod prompts;
pub mod tools;

pub use catalog::{CatalogError, CategoryListing, OrderIntake, OrderRequest, SearchQuery, SimilaritySearch};
pub use graph::{route_intent, should_continue, Continuation, ConversationGraph, NodeName, TurnError};
pub use llm::{AssistantReply, ChatModel, ModelError, ToolSpec};
pub use tools::{Tool, ToolError, ToolRegistry};
