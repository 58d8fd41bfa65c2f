//! MCP Server Manager
//!
//! Owns every running MCP server for the lifetime of the process: starts them
//! as a group, hands out their tools, and tears them down as a group.

use anyhow::{anyhow, Result};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::config::MCPServerConfig;
use super::server::MCPServer;

/// Information about an MCP tool from a specific server
#[derive(Debug, Clone)]
pub struct MCPToolInfo {
    /// The server this tool belongs to
    pub server: Arc<MCPServer>,

    /// The tool definition from rmcp
    pub tool_def: rmcp::model::Tool,
}

/// Manages the group of running MCP servers
pub struct MCPServerManager {
    /// Running servers, in configuration order
    servers: RwLock<Vec<Arc<MCPServer>>>,
}

impl MCPServerManager {
    /// Create a new empty manager
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(Vec::new()),
        }
    }

    /// Start every enabled server concurrently
    ///
    /// All or nothing: if any server fails to start, the ones that did start
    /// are shut down again and the first failure is returned.
    pub async fn start_all(&self, configs: &[MCPServerConfig]) -> Result<()> {
        let mut ids = HashSet::new();
        for config in configs {
            if !ids.insert(config.id.as_str()) {
                return Err(anyhow!("MCP server '{}' configured twice", config.id));
            }
        }

        let existing = self.server_ids().await;
        let enabled: Vec<MCPServerConfig> = configs
            .iter()
            .filter(|config| {
                if !config.enabled {
                    tracing::info!("[MCPServerManager] Skipping disabled server '{}'", config.id);
                }
                config.enabled
            })
            .cloned()
            .collect();

        if let Some(dup) = enabled.iter().find(|c| existing.contains(&c.id)) {
            return Err(anyhow!("MCP server '{}' already exists", dup.id));
        }

        tracing::info!("[MCPServerManager] Starting {} MCP servers", enabled.len());

        let results = join_all(enabled.into_iter().map(MCPServer::start)).await;

        let mut started = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(server) => started.push(Arc::new(server)),
                Err(e) => {
                    tracing::error!("[MCPServerManager] {:#}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            tracing::warn!(
                "[MCPServerManager] Startup failed, stopping {} started servers",
                started.len()
            );
            for server in &started {
                server.shutdown().await;
            }
            return Err(e.context("Failed to start MCP servers"));
        }

        let mut servers = self.servers.write().await;
        for server in started {
            tracing::info!("[MCPServerManager] Added MCP server '{}'", server.id());
            servers.push(server);
        }

        Ok(())
    }

    /// Get all server IDs in configuration order
    pub async fn server_ids(&self) -> Vec<String> {
        self.servers
            .read()
            .await
            .iter()
            .map(|s| s.id().to_string())
            .collect()
    }

    /// Get all tools from all running servers
    ///
    /// A server whose listing fails is logged and skipped.
    pub async fn get_all_tools(&self) -> Result<Vec<MCPToolInfo>> {
        let mut all_tools = Vec::new();

        let servers = self.servers.read().await;

        for server in servers.iter() {
            match server.list_tools().await {
                Ok(tools) => {
                    for tool_def in tools {
                        all_tools.push(MCPToolInfo {
                            server: server.clone(),
                            tool_def,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "[MCPServerManager] Failed to get tools from server '{}': {}",
                        server.id(),
                        e
                    );
                }
            }
        }

        Ok(all_tools)
    }

    /// Shut down every server and forget them. Safe to call more than once.
    pub async fn shutdown_all(&self) {
        let servers: Vec<Arc<MCPServer>> = self.servers.write().await.drain(..).collect();
        if servers.is_empty() {
            return;
        }

        tracing::info!("[MCPServerManager] Shutting down {} MCP servers", servers.len());
        join_all(servers.iter().map(|s| s.shutdown())).await;
        tracing::info!("[MCPServerManager] All MCP servers stopped");
    }

    /// Get the number of running servers
    pub async fn server_count(&self) -> usize {
        self.servers.read().await.len()
    }

    /// Check if manager has any servers
    pub async fn is_empty(&self) -> bool {
        self.servers.read().await.is_empty()
    }
}

impl Default for MCPServerManager {
    fn default() -> Self {
        Self::new()
    }
}
