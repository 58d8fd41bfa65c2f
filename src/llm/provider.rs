//! LLM Provider trait
//!
//! Abstracts the model backend so the agent loop does not depend on a
//! specific wire format.

use anyhow::Result;

use super::types::{Message, MessageResponse, ToolDefinition};

/// Trait for model backends used by the agent loop.
///
/// All providers work with the same internal message types. Providers that
/// use a different wire format (e.g., Bedrock Converse) translate internally.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request with tools and system prompt, returning the full response.
    async fn send_with_tools_and_system(
        &self,
        messages: Vec<Message>,
        system: Option<&str>,
        tools: Vec<ToolDefinition>,
    ) -> Result<MessageResponse>;

    /// Get the current model name.
    fn model(&self) -> String;

    /// Get the provider name (e.g., "bedrock").
    fn provider_name(&self) -> &str;
}
