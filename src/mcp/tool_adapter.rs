//! MCP Tool Adapter
//!
//! Adapts MCP tools to implement the local Tool trait

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::sync::Arc;

use crate::llm::{ToolDefinition, ToolInputSchema};
use crate::tools::{Tool, ToolInfo, ToolResult};

use super::server::MCPServer;

/// Adapter that wraps an MCP tool to implement the Tool trait
pub struct MCPToolAdapter {
    /// Reference to the MCP server
    server: Arc<MCPServer>,

    /// Original tool name (used when calling the MCP server)
    tool_name: String,

    /// Name the model sees (prefixed when the server has a tool prefix)
    exposed_name: String,

    /// Tool definition converted to local format
    tool_definition: ToolDefinition,
}

impl MCPToolAdapter {
    /// Create a new MCP tool adapter
    pub fn new(server: Arc<MCPServer>, rmcp_tool: rmcp::model::Tool) -> Self {
        let exposed_name = server.config().exposed_tool_name(&rmcp_tool.name);
        let tool_definition = Self::convert_tool_definition(&exposed_name, &rmcp_tool);

        Self {
            server,
            tool_name: rmcp_tool.name.to_string(),
            exposed_name,
            tool_definition,
        }
    }

    /// Convert rmcp Tool definition to local ToolDefinition
    fn convert_tool_definition(name: &str, rmcp_tool: &rmcp::model::Tool) -> ToolDefinition {
        let mut schema_obj = rmcp_tool.input_schema.as_ref().clone();

        let schema_type = schema_obj
            .remove("type")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "object".to_string());
        let properties = schema_obj.remove("properties");
        let required = schema_obj.remove("required").and_then(|v| {
            v.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
        });

        ToolDefinition {
            name: name.to_string(),
            description: rmcp_tool.description.as_ref().map(|d| d.to_string()),
            input_schema: ToolInputSchema {
                schema_type,
                properties,
                required,
                // $defs, additionalProperties and friends pass through untouched
                extra: schema_obj,
            },
        }
    }

    /// Convert rmcp CallToolResult to local ToolResult
    fn convert_mcp_result(rmcp_result: rmcp::model::CallToolResult) -> Result<ToolResult> {
        use rmcp::model::RawContent;

        let is_error = rmcp_result.is_error.unwrap_or(false);

        let mut text_parts = Vec::new();
        let mut image = None;

        for content in rmcp_result.content {
            match &content.raw {
                RawContent::Text(text_content) => {
                    text_parts.push(text_content.text.clone());
                }
                RawContent::Image(image_content) if image.is_none() => {
                    let decoded = base64::engine::general_purpose::STANDARD
                        .decode(&image_content.data)
                        .map_err(|e| anyhow!("Failed to decode base64 image: {}", e))?;
                    image = Some((decoded, image_content.mime_type.clone()));
                }
                RawContent::Resource(resource_content) => {
                    text_parts.push(serde_json::to_string_pretty(&resource_content.resource)?);
                }
                _ => {
                    text_parts.push(serde_json::to_string_pretty(&content)?);
                }
            }
        }

        let output = text_parts.join("\n\n");

        let mut result = match image {
            Some((data, mime_type)) => ToolResult::image(data, mime_type).with_output(output),
            None => ToolResult::success(output),
        };
        result.is_error = is_error;
        Ok(result)
    }
}

#[async_trait]
impl Tool for MCPToolAdapter {
    fn name(&self) -> &str {
        &self.exposed_name
    }

    fn description(&self) -> &str {
        self.tool_definition
            .description
            .as_deref()
            .unwrap_or("MCP tool (no description)")
    }

    fn definition(&self) -> ToolDefinition {
        self.tool_definition.clone()
    }

    fn get_info(&self, input: &Value) -> ToolInfo {
        ToolInfo {
            name: self.exposed_name.clone(),
            action_description: format!(
                "Call MCP tool '{}' on server '{}'",
                self.tool_name,
                self.server.id()
            ),
            details: Some(format!("Input: {}", input)),
        }
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        tracing::info!(
            "[MCPToolAdapter] Executing '{}' on server '{}'",
            self.tool_name,
            self.server.id()
        );
        tracing::debug!("[MCPToolAdapter] Input: {}", input);

        let arguments = input.as_object().cloned();

        // The server knows the tool by its unprefixed name
        let rmcp_result = self.server.call_tool(&self.tool_name, arguments).await?;

        let result = Self::convert_mcp_result(rmcp_result)?;

        tracing::debug!(
            "[MCPToolAdapter] Tool '{}' completed. Is error: {}",
            self.tool_name,
            result.is_error
        );

        Ok(result)
    }
}
