pub mod auth;
pub mod bedrock;
pub mod provider;
pub mod retry;
pub mod types;

pub use auth::{AwsCredentials, BedrockCredentials};
pub use bedrock::BedrockProvider;
pub use provider::LlmProvider;
pub use retry::RetryPolicy;
pub use types::{
    ContentBlock, ImageSource, Message, MessageContent, MessageResponse, StopReason,
    ToolDefinition, ToolInputSchema, Usage,
};
