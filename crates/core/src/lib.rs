pub mod config;
pub mod domain;
pub mod errors;

pub use domain::conversation::{validate_sequence, ConversationState, Intent, Message, ToolCall};
pub use domain::product::{
    engine_schema, EngineType, FieldSpec, Product, EMBEDDING_DIM, SEARCH_FIELD_SPECS,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
