//! Tool Provider trait
//!
//! Abstraction for tool sources discovered at startup (MCP servers)

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::tool::Tool;

/// Trait for dynamic tool providers
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Get all tools from this provider
    async fn get_tools(&self) -> Result<Vec<Arc<dyn Tool>>>;

    /// Provider name for logging and conflict messages
    fn name(&self) -> &str;
}
