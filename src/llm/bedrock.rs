//! AWS Bedrock client
//!
//! Talks to the Bedrock runtime Converse API over HTTP, translating between
//! the agent's internal message types and the Converse wire format.
//!
//! ```ignore
//! let llm = BedrockProvider::from_env(ModelSettings::default())?;
//! let response = llm
//!     .send_with_tools_and_system(messages, Some(INSTRUCTIONS), tools)
//!     .await?;
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::auth::{sign_request, BedrockCredentials, SignableRequest, SigningParams};
use super::provider::LlmProvider;
use super::retry::RetryPolicy;
use super::types::{
    ContentBlock, ImageSource, Message, MessageContent, MessageResponse, StopReason,
    ToolDefinition, Usage,
};
use crate::config::ModelSettings;
use crate::core::{AgentError, AgentResult};

/// Signing name of the Bedrock runtime service
const SIGNING_SERVICE: &str = "bedrock";

/// Placeholder for tool results that produced no text (Converse rejects blank text)
const EMPTY_TOOL_OUTPUT: &str = "(no output)";

/// Stands in for a message with no sendable content; Converse requires
/// strict user/assistant alternation so nothing may be dropped
const EMPTY_MESSAGE: &str = "(empty response)";

// ============================================================================
// Converse request/response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemContent>,
    inference_config: InferenceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
}

#[derive(Debug, Serialize)]
struct ConverseMessage {
    role: String,
    content: Vec<ConverseContent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ConverseContent {
    Text(String),
    ToolUse(ConverseToolUse),
    ToolResult(ConverseToolResult),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseToolUse {
    tool_use_id: String,
    name: String,
    input: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseToolResult {
    tool_use_id: String,
    content: Vec<ToolResultContent>,
    status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ToolResultContent {
    Text(String),
    Image(ConverseImage),
}

#[derive(Debug, Serialize)]
struct ConverseImage {
    format: String,
    source: ImageBytes,
}

#[derive(Debug, Serialize)]
struct ImageBytes {
    bytes: String,
}

#[derive(Debug, Serialize)]
struct SystemContent {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ToolConfig {
    tools: Vec<ConverseTool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseTool {
    tool_spec: ToolSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSpec {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    input_schema: JsonSchema,
}

#[derive(Debug, Serialize)]
struct JsonSchema {
    json: Value,
}

// Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<ConverseOutputMessage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutputMessage {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ============================================================================
// BedrockProvider
// ============================================================================

/// Bedrock Converse LLM provider
///
/// The HTTP client is built once from `ModelSettings`: connect and read
/// timeouts go on the client, the retry budget drives `send_converse_request`.
pub struct BedrockProvider {
    client: Client,
    settings: ModelSettings,
    credentials: BedrockCredentials,
    endpoint: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for BedrockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockProvider")
            .field("settings", &self.settings)
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .finish()
    }
}

impl BedrockProvider {
    /// Create a provider with explicit credentials
    pub fn new(settings: ModelSettings, credentials: BedrockCredentials) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .read_timeout(settings.read_timeout())
            .build()
            .context("Failed to build HTTP client for Bedrock")?;

        let endpoint = settings
            .endpoint_url
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", settings.region))
            .trim_end_matches('/')
            .to_string();

        tracing::info!("[Bedrock] Using model: {}", settings.model_id);
        tracing::info!("[Bedrock] Region: {}", settings.region);
        tracing::info!(
            "[Bedrock] Timeouts: connect {}s, read {}s, up to {} attempts",
            settings.connect_timeout_secs,
            settings.read_timeout_secs,
            RetryPolicy::new(settings.max_retries).max_attempts()
        );

        Ok(Self {
            client,
            retry: RetryPolicy::new(settings.max_retries),
            settings,
            credentials,
            endpoint,
        })
    }

    /// Create a provider with credentials from the environment
    pub fn from_env(settings: ModelSettings) -> Result<Self> {
        tracing::info!("[Bedrock] Creating provider from environment");
        let credentials = BedrockCredentials::from_env()?;
        Self::new(settings, credentials)
    }

    /// Override the retry policy built from settings
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Settings the client was built from
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Retry policy in effect
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Base endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Path of the Converse operation, model id percent-encoded
    fn converse_path(&self) -> String {
        format!(
            "/model/{}/converse",
            urlencoding::encode(&self.settings.model_id)
        )
    }

    // ========================================================================
    // Format conversion: Internal -> Converse
    // ========================================================================

    fn convert_messages(messages: &[Message]) -> Vec<ConverseMessage> {
        messages
            .iter()
            .map(|msg| {
                let mut content = Self::convert_content(&msg.content);
                if content.is_empty() {
                    content.push(ConverseContent::Text(EMPTY_MESSAGE.to_string()));
                }
                ConverseMessage {
                    role: msg.role.clone(),
                    content,
                }
            })
            .collect()
    }

    fn convert_content(content: &MessageContent) -> Vec<ConverseContent> {
        match content {
            MessageContent::Text(text) if text.trim().is_empty() => Vec::new(),
            MessageContent::Text(text) => vec![ConverseContent::Text(text.clone())],
            MessageContent::Blocks(blocks) => blocks.iter().filter_map(Self::convert_block).collect(),
        }
    }

    fn convert_block(block: &ContentBlock) -> Option<ConverseContent> {
        match block {
            ContentBlock::Text { text } if text.trim().is_empty() => None,
            ContentBlock::Text { text } => Some(ConverseContent::Text(text.clone())),
            ContentBlock::ToolUse { id, name, input } => Some(ConverseContent::ToolUse(ConverseToolUse {
                tool_use_id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            })),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
                image,
            } => {
                let mut parts = Vec::new();
                if !content.trim().is_empty() {
                    parts.push(ToolResultContent::Text(content.clone()));
                }
                if let Some(image) = image {
                    match Self::convert_image(image) {
                        Some(converted) => parts.push(ToolResultContent::Image(converted)),
                        None => parts.push(ToolResultContent::Text(format!(
                            "[image of unsupported type {} omitted]",
                            image.media_type
                        ))),
                    }
                }
                if parts.is_empty() {
                    parts.push(ToolResultContent::Text(EMPTY_TOOL_OUTPUT.to_string()));
                }
                Some(ConverseContent::ToolResult(ConverseToolResult {
                    tool_use_id: tool_use_id.clone(),
                    content: parts,
                    status: if *is_error { "error" } else { "success" },
                }))
            }
        }
    }

    /// Converse only accepts a few raster formats
    fn convert_image(image: &ImageSource) -> Option<ConverseImage> {
        let format = match image.media_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpeg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => return None,
        };
        Some(ConverseImage {
            format: format.to_string(),
            source: ImageBytes {
                bytes: image.data.clone(),
            },
        })
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Result<Option<ToolConfig>> {
        if tools.is_empty() {
            return Ok(None);
        }

        let tools = tools
            .iter()
            .map(|tool| {
                Ok(ConverseTool {
                    tool_spec: ToolSpec {
                        name: tool.name.clone(),
                        description: tool.description.clone().filter(|d| !d.is_empty()),
                        input_schema: JsonSchema {
                            json: serde_json::to_value(&tool.input_schema)?,
                        },
                    },
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        Ok(Some(ToolConfig { tools }))
    }

    fn build_request(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolDefinition],
    ) -> Result<ConverseRequest> {
        Ok(ConverseRequest {
            messages: Self::convert_messages(messages),
            system: system
                .filter(|s| !s.trim().is_empty())
                .map(|s| vec![SystemContent { text: s.to_string() }])
                .unwrap_or_default(),
            inference_config: InferenceConfig {
                max_tokens: self.settings.max_tokens,
            },
            tool_config: Self::convert_tools(tools)?,
        })
    }

    // ========================================================================
    // Format conversion: Converse -> Internal
    // ========================================================================

    fn convert_response(response: ConverseResponse) -> MessageResponse {
        let mut content = Vec::new();

        for part in response.output.message.map(|m| m.content).unwrap_or_default() {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                content.push(ContentBlock::text(text));
            } else if let Some(tool_use) = part.get("toolUse") {
                let id = tool_use.get("toolUseId").and_then(|v| v.as_str()).unwrap_or_default();
                let name = tool_use.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                let input = tool_use.get("input").cloned().unwrap_or(Value::Object(Default::default()));
                content.push(ContentBlock::tool_use(id, name, input));
            } else {
                tracing::debug!("[Bedrock] Skipping unsupported content part: {}", part);
            }
        }

        let stop_reason = response.stop_reason.as_deref().and_then(StopReason::parse);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        MessageResponse {
            content,
            stop_reason,
            usage,
        }
    }

    // ========================================================================
    // API methods
    // ========================================================================

    /// Send one attempt, without retries
    async fn send_once(&self, path: &str, body: &str) -> AgentResult<ConverseResponse> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        match &self.credentials {
            BedrockCredentials::ApiKey(key) => {
                request_builder = request_builder.bearer_auth(key);
            }
            BedrockCredentials::Aws(credentials) => {
                let host = reqwest::Url::parse(&url)
                    .ok()
                    .and_then(|u| {
                        u.host_str().map(|h| match u.port() {
                            Some(port) => format!("{}:{}", h, port),
                            None => h.to_string(),
                        })
                    })
                    .unwrap_or_default();
                let signed = sign_request(
                    &SignableRequest {
                        method: "POST",
                        host: &host,
                        path,
                        content_type: "application/json",
                        body: body.as_bytes(),
                    },
                    &SigningParams {
                        credentials,
                        region: &self.settings.region,
                        service: SIGNING_SERVICE,
                        time: Utc::now(),
                    },
                );
                for (name, value) in signed {
                    request_builder = request_builder.header(name, value);
                }
            }
        }

        let response = request_builder.body(body.to_string()).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        tracing::debug!("[Bedrock] Response status: {}", status);
        tracing::debug!("[Bedrock] Response body: {}", response_text);

        if !status.is_success() {
            return Err(AgentError::Backend {
                status: status.as_u16(),
                body: response_text,
            });
        }

        Ok(serde_json::from_str(&response_text)?)
    }

    /// Send a Converse request, retrying transient failures
    async fn send_converse_request(&self, request: &ConverseRequest) -> Result<ConverseResponse> {
        let path = self.converse_path();
        let body = serde_json::to_string(request).context("Failed to serialize Converse request")?;
        tracing::debug!("[Bedrock] Request JSON: {}", body);

        let mut retry = 0;
        loop {
            match self.send_once(&path, &body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    retry += 1;
                    tracing::warn!(
                        "[Bedrock] Transient failure ({}), retry {}/{} in {:?}",
                        e,
                        retry,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("[Bedrock] Request failed: {}", e);
                    return Err(anyhow::Error::new(e).context("Bedrock Converse request failed"));
                }
            }
        }
    }
}

// ============================================================================
// LlmProvider implementation
// ============================================================================

#[async_trait::async_trait]
impl LlmProvider for BedrockProvider {
    async fn send_with_tools_and_system(
        &self,
        messages: Vec<Message>,
        system: Option<&str>,
        tools: Vec<ToolDefinition>,
    ) -> Result<MessageResponse> {
        tracing::info!("[Bedrock] Sending message with tools");
        tracing::debug!("[Bedrock] Messages count: {}", messages.len());
        tracing::debug!("[Bedrock] Tools count: {}", tools.len());

        let request = self.build_request(&messages, system, &tools)?;
        let response = self.send_converse_request(&request).await?;
        let response = Self::convert_response(response);

        tracing::info!(
            "[Bedrock] Response: stop_reason={:?}, tokens in/out {}/{}",
            response.stop_reason,
            response.usage.input_tokens,
            response.usage.output_tokens
        );

        Ok(response)
    }

    fn model(&self) -> String {
        self.settings.model_id.clone()
    }

    fn provider_name(&self) -> &str {
        "bedrock"
    }
}
