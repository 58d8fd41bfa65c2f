//! Agent Configuration
//!
//! Configuration options for the Agent.

use std::sync::Arc;

use crate::llm::ToolDefinition;
use crate::tools::ToolRegistry;

use super::instructions::DEFAULT_INSTRUCTIONS;

/// Configuration for an Agent
///
/// ```ignore
/// let config = AgentConfig::new(DEFAULT_INSTRUCTIONS)
///     .with_tools(tools)
///     .with_max_tool_iterations(50);
/// ```
pub struct AgentConfig {
    /// System prompt for the model
    pub instructions: String,

    /// Tool registry (optional - agent can work without tools)
    pub tools: Option<Arc<ToolRegistry>>,

    /// Maximum number of model calls per turn
    pub max_tool_iterations: usize,
}

impl AgentConfig {
    /// Create a new agent configuration with instructions
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            tools: None,
            max_tool_iterations: 50,
        }
    }

    /// Set the tool registry
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set maximum tool iterations per turn
    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }

    /// Get tool definitions from the registry (if configured)
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .as_ref()
            .map(|t| t.get_definitions())
            .unwrap_or_default()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}
