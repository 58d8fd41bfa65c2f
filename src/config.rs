//! Agent configuration
//!
//! Everything the process needs is declared here with built-in defaults:
//! the Bedrock model settings, the instruction text, the MCP servers to launch
//! and the test command. A JSON file named by `DEV_AGENT_CONFIG` can override
//! any of it; `DEV_AGENT_REGION` and `DEV_AGENT_MODEL` override the model
//! target. `AWS_REGION` is not consulted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::DEFAULT_INSTRUCTIONS;
use crate::core::AgentError;
use crate::mcp::MCPServerConfig;
use crate::tools::DEFAULT_TEST_COMMAND;

/// Environment variable naming an optional JSON config file
pub const CONFIG_PATH_VAR: &str = "DEV_AGENT_CONFIG";

/// Environment variable overriding the Bedrock region
pub const REGION_VAR: &str = "DEV_AGENT_REGION";

/// Environment variable overriding the model id
pub const MODEL_VAR: &str = "DEV_AGENT_MODEL";

const DEFAULT_MODEL_ID: &str = "eu.anthropic.claude-sonnet-4-20250514-v1:0";
const DEFAULT_REGION: &str = "eu-central-1";

// ============================================================================
// Model settings
// ============================================================================

/// Bedrock client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model (or inference profile) identifier
    pub model_id: String,

    /// AWS region hosting the runtime endpoint
    pub region: String,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds (time between received bytes)
    pub read_timeout_secs: u64,

    /// Retries after the first attempt on transient failures
    pub max_retries: u32,

    /// Maximum output tokens per response
    pub max_tokens: u32,

    /// Override for the runtime endpoint (VPC endpoints, local proxies)
    pub endpoint_url: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            region: DEFAULT_REGION.to_string(),
            connect_timeout_secs: 60,
            read_timeout_secs: 300,
            max_retries: 3,
            max_tokens: 8192,
            endpoint_url: None,
        }
    }
}

impl ModelSettings {
    /// Set the model id
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set connect and read timeouts, in seconds
    pub fn with_timeouts(mut self, connect_secs: u64, read_secs: u64) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.read_timeout_secs = read_secs;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set max output tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point the client at a different endpoint
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

// ============================================================================
// Default MCP servers
// ============================================================================

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The tool servers launched by default
pub fn default_mcp_servers() -> Vec<MCPServerConfig> {
    vec![
        MCPServerConfig::new("run_python", "deno").with_args(strings(&[
            "run",
            "-N",
            "-R=node_modules",
            "-W=node_modules",
            "--node-modules-dir=auto",
            "jsr:@pydantic/mcp-run-python",
            "stdio",
        ])),
        MCPServerConfig::new("internet_search", "uvx")
            .with_args(strings(&["duckduckgo-mcp-server"])),
        MCPServerConfig::new("code_reasoning", "npx")
            .with_args(strings(&["-y", "@mettamatt/code-reasoning"]))
            .with_tool_prefix("code_reasoning"),
        MCPServerConfig::new("context7", "npx")
            .with_args(strings(&["-y", "@upstash/context7-mcp"]))
            .with_tool_prefix("context"),
        MCPServerConfig::new("awslabs", "uvx")
            .with_args(strings(&["awslabs.core-mcp-server@latest"]))
            .with_env("FASTMCP_LOG_LEVEL", "ERROR")
            .with_tool_prefix("awslabs"),
        MCPServerConfig::new("aws_docs", "uvx")
            .with_args(strings(&["awslabs.aws-documentation-mcp-server@latest"]))
            .with_env("FASTMCP_LOG_LEVEL", "ERROR")
            .with_env("AWS_DOCUMENTATION_PARTITION", "aws")
            .with_tool_prefix("aws_docs"),
        MCPServerConfig::new("desktop_commander", "npx")
            .with_args(strings(&["-y", "@wonderwhy-er/desktop-commander"]))
            .with_tool_prefix("desktop_commander"),
    ]
}

// ============================================================================
// Agent settings
// ============================================================================

/// Top-level configuration for the agent process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Bedrock client settings
    pub model: ModelSettings,

    /// Instruction text sent as the system prompt
    pub instructions: String,

    /// MCP servers to launch
    pub mcp_servers: Vec<MCPServerConfig>,

    /// Program and arguments run by the `run_unit_tests` tool
    pub test_command: Vec<String>,

    /// Directory the test command runs in; the process directory when unset
    pub test_working_dir: Option<PathBuf>,

    /// Maximum LLM round trips per user turn
    pub max_tool_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            mcp_servers: default_mcp_servers(),
            test_command: strings(DEFAULT_TEST_COMMAND),
            test_working_dir: None,
            max_tool_iterations: 50,
        }
    }
}

impl AgentSettings {
    /// Load settings: defaults, then the optional config file, then env overrides
    pub fn load() -> Result<Self> {
        let mut settings = match env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => {
                tracing::info!("[Config] Loading settings from {}", path);
                Self::from_file(&path)?
            }
            _ => {
                tracing::info!("[Config] Using built-in settings");
                Self::default()
            }
        };

        settings.apply_overrides(|key| env::var(key).ok());
        settings.validate()?;

        Ok(settings)
    }

    /// Read settings from a JSON file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(settings)
    }

    /// Apply `DEV_AGENT_REGION` and `DEV_AGENT_MODEL` overrides through a lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(region) = lookup(REGION_VAR).filter(|v| !v.trim().is_empty()) {
            tracing::info!("[Config] Region overridden by {}: {}", REGION_VAR, region);
            self.model.region = region;
        }
        if let Some(model) = lookup(MODEL_VAR).filter(|v| !v.trim().is_empty()) {
            tracing::info!("[Config] Model overridden by {}: {}", MODEL_VAR, model);
            self.model.model_id = model;
        }
    }

    /// Reject settings that cannot produce a working agent
    pub fn validate(&self) -> Result<()> {
        if self.model.model_id.trim().is_empty() {
            return Err(AgentError::InvalidConfig("model.model_id is empty".into()).into());
        }
        if self.model.region.trim().is_empty() {
            return Err(AgentError::InvalidConfig("model.region is empty".into()).into());
        }
        if self.test_command.is_empty() {
            return Err(AgentError::InvalidConfig("test_command is empty".into()).into());
        }
        if self.max_tool_iterations == 0 {
            return Err(AgentError::InvalidConfig("max_tool_iterations must be at least 1".into()).into());
        }

        let mut seen = HashSet::new();
        for server in &self.mcp_servers {
            server.validate()?;
            if !seen.insert(server.id.as_str()) {
                return Err(AgentError::InvalidConfig(format!(
                    "duplicate MCP server id '{}'",
                    server.id
                ))
                .into());
            }
        }

        Ok(())
    }
}
