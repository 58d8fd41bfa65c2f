//! Agent Loop
//!
//! Handles one user turn at a time:
//! - Input → model → tools → model ... until the model ends its turn
//! - Output is emitted to an `OutputSink` as it happens
//! - A turn that fails on the model call leaves the history as it was

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::core::{OutputChunk, OutputSink};
use crate::llm::{ContentBlock, LlmProvider, Message, StopReason};
use crate::tools::ToolResult;

use super::config::AgentConfig;

/// Conversational agent holding the in-memory history
pub struct Agent {
    config: AgentConfig,
    llm: Arc<dyn LlmProvider>,
    history: Vec<Message>,
    conversation_id: String,
    last_response: Option<String>,
}

impl Agent {
    /// Create a new agent
    pub fn new(config: AgentConfig, llm: Arc<dyn LlmProvider>) -> Self {
        let conversation_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            "[Agent] New conversation {} ({} / {})",
            conversation_id,
            llm.provider_name(),
            llm.model()
        );

        Self {
            config,
            llm,
            history: Vec::new(),
            conversation_id,
            last_response: None,
        }
    }

    /// Conversation history so far
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Identifier of this conversation, for logs
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Text of the most recent completed turn
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Names of the tools the model can call, sorted
    pub fn tool_names(&self) -> Vec<String> {
        self.config
            .tools
            .as_ref()
            .map(|t| t.tool_names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Process a single user turn (may involve multiple model calls for tool use)
    ///
    /// Returns the text of the model's final response. On error the history
    /// is rolled back to where it was before the turn.
    pub async fn process_turn(&mut self, user_input: &str, sink: &dyn OutputSink) -> Result<String> {
        let checkpoint = self.history.len();

        match self.run_turn(user_input, sink).await {
            Ok(text) => {
                self.last_response = Some(text.clone());
                Ok(text)
            }
            Err(e) => {
                tracing::error!("[Agent] Turn failed, rolling back history: {:#}", e);
                self.rollback(checkpoint);
                Err(e)
            }
        }
    }

    /// Drop every message after the first `len`
    ///
    /// Used to discard a turn that failed or was interrupted; the next turn
    /// then starts from a history that ends on a completed exchange.
    pub fn rollback(&mut self, len: usize) {
        if len < self.history.len() {
            tracing::info!(
                "[Agent] Discarding {} messages",
                self.history.len() - len
            );
            self.history.truncate(len);
        }
    }

    async fn run_turn(&mut self, user_input: &str, sink: &dyn OutputSink) -> Result<String> {
        self.history.push(Message::user(user_input));

        let tool_definitions = self.config.tool_definitions();
        let mut iterations = 0;
        let mut final_text = String::new();

        loop {
            if iterations >= self.config.max_tool_iterations {
                tracing::warn!(
                    "[Agent] Max tool iterations ({}) reached",
                    self.config.max_tool_iterations
                );
                sink.emit(OutputChunk::Status("Max tool iterations reached".to_string()));
                // Keep user/assistant alternation intact for the next turn
                self.history.push(Message::assistant(format!(
                    "Stopped after {} tool iterations.",
                    self.config.max_tool_iterations
                )));
                break;
            }
            iterations += 1;

            tracing::info!(
                "[Agent] Calling model with {} messages (iteration {})",
                self.history.len(),
                iterations
            );

            let response = self
                .llm
                .send_with_tools_and_system(
                    self.history.clone(),
                    Some(&self.config.instructions),
                    tool_definitions.clone(),
                )
                .await?;

            tracing::info!(
                "[Agent] Model response: stop_reason={:?}, tokens in/out={}/{}",
                response.stop_reason,
                response.usage.input_tokens,
                response.usage.output_tokens
            );

            for block in &response.content {
                if let ContentBlock::Text { text } = block {
                    sink.emit(OutputChunk::TextComplete(text.clone()));
                }
            }
            final_text = response.text();

            let mut tool_results = Vec::new();
            for (id, name, input) in response.tool_uses() {
                tracing::info!("[Agent] Tool use: {} ({})", name, id);
                sink.emit(OutputChunk::ToolStart {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                });

                let result = self.execute_tool(name, input).await;

                sink.emit(OutputChunk::ToolEnd {
                    id: id.to_string(),
                    name: name.to_string(),
                    result: result.clone(),
                });
                tool_results.push(tool_result_block(id, result));
            }

            if final_text.trim().is_empty() && !response.has_tool_use() {
                self.history.push(Message::assistant("(empty response)"));
            } else {
                self.history
                    .push(Message::assistant_with_blocks(response.content.clone()));
            }

            if !tool_results.is_empty() {
                self.history.push(Message::user_with_blocks(tool_results));
                continue;
            }

            match response.stop_reason {
                Some(StopReason::MaxTokens) => {
                    sink.emit(OutputChunk::Status(
                        "Response truncated (max tokens)".to_string(),
                    ));
                }
                Some(StopReason::GuardrailIntervened) | Some(StopReason::ContentFiltered) => {
                    sink.emit(OutputChunk::Status(
                        "Response blocked by content filtering".to_string(),
                    ));
                }
                _ => {}
            }
            break;
        }

        Ok(final_text)
    }

    /// Run one tool; every failure becomes an error result for the model
    async fn execute_tool(&self, name: &str, input: &Value) -> ToolResult {
        let Some(ref tools) = self.config.tools else {
            return ToolResult::error(format!("No tools configured, cannot execute: {}", name));
        };

        if let Some(info) = tools.get_tool_info(name, input) {
            tracing::info!("[Agent] {}", info.action_description);
        }

        match tools.execute(name, input).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("[Agent] Tool '{}' failed: {:#}", name, e);
                ToolResult::error(format!("Tool execution failed: {:#}", e))
            }
        }
    }
}

fn tool_result_block(id: &str, result: ToolResult) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: id.to_string(),
        content: result.output,
        is_error: result.is_error,
        image: result.image.as_ref().map(|image| image.to_image_source()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MessageContent, MessageResponse, ToolDefinition, ToolInputSchema, Usage};
    use crate::tools::{Tool, ToolInfo, ToolRegistry};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what it was sent
    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<MessageResponse>>>,
        requests: Mutex<Vec<(Vec<Message>, Vec<String>)>>,
        repeat_tool_use: bool,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<MessageResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
                repeat_tool_use: false,
            }
        }

        fn always_tool_use() -> Self {
            Self {
                repeat_tool_use: true,
                ..Self::new(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn send_with_tools_and_system(
            &self,
            messages: Vec<Message>,
            _system: Option<&str>,
            tools: Vec<ToolDefinition>,
        ) -> Result<MessageResponse> {
            let tool_names = tools.into_iter().map(|t| t.name).collect();
            self.requests.lock().unwrap().push((messages, tool_names));

            if self.repeat_tool_use {
                return Ok(tool_use_response("loop", "echo", json!({})));
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no scripted response left")))
        }

        fn model(&self) -> String {
            "scripted".to_string()
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: Some("Echo the input".to_string()),
                input_schema: ToolInputSchema::default(),
            }
        }

        fn get_info(&self, _input: &Value) -> ToolInfo {
            ToolInfo {
                name: "echo".to_string(),
                action_description: "Echo".to_string(),
                details: None,
            }
        }

        async fn execute(&self, input: &Value) -> Result<ToolResult> {
            Ok(ToolResult::success(format!("echo: {}", input)))
        }
    }

    #[derive(Default)]
    struct CollectSink {
        chunks: Mutex<Vec<OutputChunk>>,
    }

    impl OutputSink for CollectSink {
        fn emit(&self, chunk: OutputChunk) {
            self.chunks.lock().unwrap().push(chunk);
        }
    }

    fn text_response(text: &str) -> MessageResponse {
        MessageResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage::default(),
        }
    }

    fn tool_use_response(id: &str, name: &str, input: Value) -> MessageResponse {
        MessageResponse {
            content: vec![ContentBlock::tool_use(id, name, input)],
            stop_reason: Some(StopReason::ToolUse),
            usage: Usage::default(),
        }
    }

    fn agent_with_tools(llm: Arc<ScriptedLlm>, max_iterations: usize) -> Agent {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let config = AgentConfig::new("test instructions")
            .with_tools(Arc::new(registry))
            .with_max_tool_iterations(max_iterations);
        Agent::new(config, llm)
    }

    fn tool_result_of(message: &Message) -> (String, bool) {
        match message.blocks() {
            Some([ContentBlock::ToolResult { content, is_error, .. }]) => (content.clone(), *is_error),
            other => panic!("expected a single tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plain_text_turn() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(text_response("Hello!"))]));
        let mut agent = agent_with_tools(llm.clone(), 50);
        let sink = CollectSink::default();

        let text = agent.process_turn("hi", &sink).await.unwrap();

        assert_eq!(text, "Hello!");
        assert_eq!(agent.last_response(), Some("Hello!"));
        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.history()[0].content, MessageContent::Text("hi".into()));
        assert_eq!(llm.requests.lock().unwrap()[0].1, vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(tool_use_response("t1", "echo", json!({"x": 1}))),
            Ok(text_response("done")),
        ]));
        let mut agent = agent_with_tools(llm.clone(), 50);
        let sink = CollectSink::default();

        let text = agent.process_turn("use the tool", &sink).await.unwrap();

        assert_eq!(text, "done");
        assert_eq!(llm.calls(), 2);
        assert_eq!(agent.history().len(), 4);
        assert_eq!(agent.history()[2].role, "user");
        assert_eq!(
            tool_result_of(&agent.history()[2]),
            (r#"echo: {"x":1}"#.to_string(), false)
        );

        let chunks = sink.chunks.lock().unwrap();
        assert!(matches!(&chunks[0], OutputChunk::ToolStart { name, .. } if name == "echo"));
        assert!(matches!(&chunks[1], OutputChunk::ToolEnd { result, .. } if !result.is_error));
        assert!(matches!(&chunks[2], OutputChunk::TextComplete(t) if t == "done"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(tool_use_response("t1", "nope", json!({}))),
            Ok(text_response("sorry")),
        ]));
        let mut agent = agent_with_tools(llm, 50);

        agent.process_turn("go", &CollectSink::default()).await.unwrap();

        let (content, is_error) = tool_result_of(&agent.history()[2]);
        assert!(is_error);
        assert!(content.contains("Tool not found: nope"));
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let llm = Arc::new(ScriptedLlm::always_tool_use());
        let mut agent = agent_with_tools(llm.clone(), 2);
        let sink = CollectSink::default();

        agent.process_turn("loop forever", &sink).await.unwrap();

        assert_eq!(llm.calls(), 2);
        let last = agent.history().last().unwrap();
        assert_eq!(last.role, "assistant");
        assert!(sink
            .chunks
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, OutputChunk::Status(s) if s.contains("Max tool iterations"))));
    }

    #[tokio::test]
    async fn test_model_error_rolls_back_history() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(text_response("first")),
            Ok(tool_use_response("t1", "echo", json!({}))),
            Err(anyhow!("throttled")),
            Ok(text_response("recovered")),
        ]));
        let mut agent = agent_with_tools(llm, 50);
        let sink = CollectSink::default();

        agent.process_turn("one", &sink).await.unwrap();
        assert_eq!(agent.history().len(), 2);

        let err = agent.process_turn("two", &sink).await.unwrap_err();
        assert_eq!(err.to_string(), "throttled");
        assert_eq!(agent.history().len(), 2);
        assert_eq!(agent.last_response(), Some("first"));

        agent.process_turn("three", &sink).await.unwrap();
        assert_eq!(agent.history().len(), 4);
        assert_eq!(agent.history()[2].content, MessageContent::Text("three".into()));
    }

    #[tokio::test]
    async fn test_blank_response_stored_as_placeholder() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(text_response("\n")),
            Ok(text_response("back")),
        ]));
        let mut agent = agent_with_tools(llm, 50);
        let sink = CollectSink::default();

        agent.process_turn("hi", &sink).await.unwrap();
        assert_eq!(
            agent.history()[1].content,
            MessageContent::Text("(empty response)".into())
        );

        agent.process_turn("again", &sink).await.unwrap();
        let roles: Vec<&str> = agent.history().iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
    }

    #[tokio::test]
    async fn test_rollback_discards_later_messages() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(text_response("a")), Ok(text_response("b"))]));
        let mut agent = agent_with_tools(llm, 50);
        let sink = CollectSink::default();

        agent.process_turn("one", &sink).await.unwrap();
        agent.process_turn("two", &sink).await.unwrap();

        agent.rollback(2);
        assert_eq!(agent.history().len(), 2);
        agent.rollback(5);
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test]
    async fn test_no_tools_configured() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(tool_use_response("t1", "echo", json!({}))),
            Ok(text_response("ok")),
        ]));
        let mut agent = Agent::new(AgentConfig::new("x"), llm);

        agent.process_turn("go", &CollectSink::default()).await.unwrap();

        let (content, is_error) = tool_result_of(&agent.history()[2]);
        assert!(is_error);
        assert!(content.contains("No tools configured"));
        assert!(agent.tool_names().is_empty());
    }
}
