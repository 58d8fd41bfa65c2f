//! MCP Server Configuration
//!
//! Describes how to launch one stdio MCP server

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use crate::core::AgentError;

/// Configuration for a single MCP server launched as a child process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPServerConfig {
    /// Unique identifier for this server (used in logs and lookups)
    pub id: String,

    /// Program to launch
    pub command: String,

    /// Arguments passed to the program, in order
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Prefix prepended to every tool name from this server (`prefix_tool`)
    #[serde(default)]
    pub tool_prefix: Option<String>,

    /// Whether this server is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How long the initialize handshake may take, in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_startup_timeout_secs() -> u64 {
    60
}

fn tool_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid tool name pattern"))
}

impl MCPServerConfig {
    /// Create a new MCP server configuration
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            tool_prefix: None,
            enabled: true,
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }

    /// Set the argument list
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the tool name prefix
    pub fn with_tool_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tool_prefix = Some(prefix.into());
        self
    }

    /// Set whether this server is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the startup timeout
    pub fn with_startup_timeout(mut self, secs: u64) -> Self {
        self.startup_timeout_secs = secs;
        self
    }

    /// Get startup timeout as Duration
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Name under which a tool from this server is exposed to the model
    pub fn exposed_tool_name(&self, tool_name: &str) -> String {
        match &self.tool_prefix {
            Some(prefix) => format!("{}_{}", prefix, tool_name),
            None => tool_name.to_string(),
        }
    }

    /// Full command line, for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check the fields the launcher depends on
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AgentError::InvalidConfig("MCP server id is empty".into()).into());
        }
        if self.command.trim().is_empty() {
            return Err(AgentError::InvalidConfig(format!(
                "MCP server '{}' has an empty command",
                self.id
            ))
            .into());
        }
        if let Some(ref prefix) = self.tool_prefix {
            if !tool_name_pattern().is_match(prefix) {
                return Err(AgentError::InvalidConfig(format!(
                    "MCP server '{}' has an invalid tool prefix '{}'",
                    self.id, prefix
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// Whether a tool name is acceptable to the model backend
pub fn is_valid_tool_name(name: &str) -> bool {
    name.len() <= 64 && tool_name_pattern().is_match(name)
}
