//! MCP Server wrapper
//!
//! Launches one MCP server as a child process and wraps the rmcp client
//! service connected to its stdio.

use anyhow::{anyhow, Context, Result};
use rmcp::model::{CallToolRequestParams, CallToolResult, Tool};
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::config::MCPServerConfig;
use crate::core::AgentError;

/// A running MCP server child process and its client session
pub struct MCPServer {
    /// Launch configuration
    config: MCPServerConfig,

    /// The underlying rmcp service (None once shut down)
    service: RwLock<Option<RunningService<RoleClient, ()>>>,

    /// Task forwarding the child's stderr into the log
    stderr_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for MCPServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MCPServer")
            .field("id", &self.config.id)
            .field("command", &self.config.command_line())
            .finish()
    }
}

impl MCPServer {
    /// Spawn the server process and complete the MCP initialize handshake
    ///
    /// The child is killed when the transport is dropped, so a failed or
    /// timed-out handshake leaves nothing running.
    pub async fn start(config: MCPServerConfig) -> Result<Self> {
        let id = config.id.clone();
        tracing::info!("[MCPServer] Starting '{}': {}", id, config.command_line());

        let mut command = Command::new(&config.command);
        command.args(&config.args).envs(&config.env).kill_on_drop(true);

        let (transport, stderr) = TokioChildProcess::builder(command)
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server '{}' ({})", id, config.command))?;

        let stderr_task = stderr.map(|stderr| tokio::spawn(forward_stderr(id.clone(), stderr)));

        let service = match tokio::time::timeout(config.startup_timeout(), ().serve(transport)).await {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => {
                abort_task(stderr_task);
                return Err(AgentError::mcp(&id, format!("initialize failed: {}", e)).into());
            }
            Err(_) => {
                abort_task(stderr_task);
                return Err(AgentError::mcp(
                    &id,
                    format!("initialize timed out after {}s", config.startup_timeout_secs),
                )
                .into());
            }
        };

        match service.peer_info() {
            Some(info) => tracing::info!(
                "[MCPServer] '{}' ready: {} {}",
                id,
                info.server_info.name,
                info.server_info.version
            ),
            None => tracing::info!("[MCPServer] '{}' ready", id),
        }

        Ok(Self {
            config,
            service: RwLock::new(Some(service)),
            stderr_task: Mutex::new(stderr_task),
        })
    }

    /// Get the server ID
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Get the launch configuration
    pub fn config(&self) -> &MCPServerConfig {
        &self.config
    }

    /// List all tools available on this server
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let service_guard = self.service.read().await;
        let service = service_guard
            .as_ref()
            .ok_or_else(|| anyhow!("MCP server '{}' is not connected", self.config.id))?;

        tracing::debug!("[MCPServer] Listing tools from '{}'", self.config.id);

        let tools = service
            .list_all_tools()
            .await
            .map_err(|e| AgentError::mcp(&self.config.id, format!("list_tools failed: {}", e)))?;

        tracing::info!(
            "[MCPServer] Got {} tools from '{}'",
            tools.len(),
            self.config.id
        );

        Ok(tools)
    }

    /// Call a tool on this server by its original (unprefixed) name
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let service_guard = self.service.read().await;
        let service = service_guard
            .as_ref()
            .ok_or_else(|| anyhow!("MCP server '{}' is not connected", self.config.id))?;

        tracing::info!(
            "[MCPServer] Calling tool '{}' on server '{}'",
            name,
            self.config.id
        );
        tracing::debug!("[MCPServer] Arguments: {:?}", arguments);

        let result = service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_string().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| AgentError::mcp(&self.config.id, format!("call_tool '{}' failed: {}", name, e)))?;

        tracing::debug!("[MCPServer] Tool call completed for '{}'", name);

        Ok(result)
    }

    /// Stop the client session and the child process. Safe to call twice.
    pub async fn shutdown(&self) {
        let service = self.service.write().await.take();

        if let Some(service) = service {
            tracing::info!("[MCPServer] Shutting down '{}'", self.config.id);
            match service.cancel().await {
                Ok(reason) => {
                    tracing::debug!("[MCPServer] '{}' stopped: {:?}", self.config.id, reason)
                }
                Err(e) => {
                    tracing::warn!("[MCPServer] '{}' did not stop cleanly: {}", self.config.id, e)
                }
            }
        }

        abort_task(self.stderr_task.lock().await.take());
    }
}

fn abort_task(task: Option<JoinHandle<()>>) {
    if let Some(task) = task {
        task.abort();
    }
}

/// Forward each stderr line of a server into the log
async fn forward_stderr(id: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!("[MCPServer:{}] {}", id, line);
    }
}
