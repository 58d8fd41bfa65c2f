//! MCP Tool Provider
//!
//! Implements ToolProvider for the running MCP servers

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::tools::{Tool, ToolProvider};

use super::config::is_valid_tool_name;
use super::manager::MCPServerManager;
use super::tool_adapter::MCPToolAdapter;

/// Tool provider that fetches tools from MCP servers
pub struct MCPToolProvider {
    /// Manager for MCP servers
    manager: Arc<MCPServerManager>,
}

impl MCPToolProvider {
    /// Create a new MCP tool provider
    pub fn new(manager: Arc<MCPServerManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ToolProvider for MCPToolProvider {
    async fn get_tools(&self) -> Result<Vec<Arc<dyn Tool>>> {
        tracing::info!("[MCPToolProvider] Fetching tools from all MCP servers");

        let mcp_tools = self.manager.get_all_tools().await?;

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

        for mcp_tool_info in mcp_tools {
            let adapter = MCPToolAdapter::new(mcp_tool_info.server.clone(), mcp_tool_info.tool_def);

            // Bedrock rejects the whole request over one bad name
            if !is_valid_tool_name(adapter.name()) {
                tracing::warn!(
                    "[MCPToolProvider] Skipping tool '{}' from '{}': name not accepted by the model",
                    adapter.name(),
                    mcp_tool_info.server.id()
                );
                continue;
            }

            tools.push(Arc::new(adapter));
        }

        tracing::info!(
            "[MCPToolProvider] Created {} tool adapters from MCP servers",
            tools.len()
        );

        Ok(tools)
    }

    fn name(&self) -> &str {
        "MCP"
    }
}
