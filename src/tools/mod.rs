//! Tool system for the agent
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolResult` - Result type for tool execution
//! - `ToolRegistry` - Registry for managing available tools
//! - `ToolProvider` trait - Interface for tool sources discovered at startup (MCP)
//! - `RunUnitTestsTool` - The one locally defined tool

mod provider;
mod registry;
mod tool;

pub use provider::ToolProvider;
pub use registry::ToolRegistry;
pub use run_tests::{RunUnitTestsTool, DEFAULT_TEST_COMMAND};
pub use tool::{Tool, ToolImage, ToolInfo, ToolResult};
