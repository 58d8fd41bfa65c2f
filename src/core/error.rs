//! Agent error types

use thiserror::Error;

use crate::llm::retry;

/// Errors that can occur while running the agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credentials for the model backend could not be found
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The model backend answered with a non-success status
    #[error("Model backend error ({status}): {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The request never produced a response (connect failure, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An MCP server failed to start or answer
    #[error("MCP server '{server}': {message}")]
    Mcp {
        /// Server id
        server: String,
        /// What went wrong
        message: String,
    },

    /// Tool lookup failed
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Two tool sources expose the same name
    #[error("Tool name conflict: '{name}' already exists (from provider '{provider}')")]
    ToolConflict {
        /// Conflicting tool name
        name: String,
        /// Provider that tried to register it
        provider: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Create an MCP error for the given server
    pub fn mcp(server: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::Mcp {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Backend { status, .. } => retry::is_retryable_status(*status),
            AgentError::Transport(e) => retry::is_retryable_error(e),
            _ => false,
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
