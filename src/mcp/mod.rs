//! MCP (Model Context Protocol) Support
//!
//! Launches stdio MCP servers as child processes and exposes their tools
//! to the agent as if they were native tools.
//!
//! # Architecture
//!
//! - `MCPServer`: Owns one child process and the rmcp client session on its stdio
//! - `MCPServerManager`: Starts and stops the servers as a group
//! - `MCPToolAdapter`: Adapts MCP tools to implement the Tool trait
//! - `MCPToolProvider`: Implements ToolProvider to expose MCP tools to the registry
//!
//! # Tool Naming
//!
//! A server with a `tool_prefix` exposes its tools as `prefix_tool`:
//! - Prefix: `aws_docs`
//! - Original tool name: `search_documentation`
//! - Exposed name: `aws_docs_search_documentation`
//!
//! Servers without a prefix expose their tools under the original name.

mod config;
#[cfg(test)]
pub(crate) mod fixture;
mod manager;
mod provider;
mod server;
mod tool_adapter;

pub use config::{is_valid_tool_name, MCPServerConfig};
pub use manager::{MCPServerManager, MCPToolInfo};
pub use provider::MCPToolProvider;
pub use server::MCPServer;
pub use tool_adapter::MCPToolAdapter;
