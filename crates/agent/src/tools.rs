use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolSpec;

#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments failed schema validation. Recoverable: the text is fed
    /// back to the model as the tool-result content.
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    /// The backend behind the tool failed. Turn-fatal unless caught.
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error("unknown tool `{0}`")]
    Unknown(String),
}

impl ToolError {
    /// Whether the error can be surfaced to the model as a tool result
    /// instead of aborting the turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Unknown(_))
    }
}

/// A named operation the model may request mid-turn. Stateless given its
/// inputs and the collaborator it was constructed with.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;

    async fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations advertised to the model alongside the system prompt.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name(),
                description: tool.description(),
                input_schema: tool.input_schema(),
            })
            .collect();
        specs.sort_by_key(|spec| spec.name);
        specs
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        tool.invoke(args).await
    }
}
