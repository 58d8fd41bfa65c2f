//! Application lifecycle
//!
//! Start every tool server, run the chat loop, stop every tool server.
//! Teardown runs on every exit path: `/exit`, end of input, a chat loop
//! error, a startup failure, and Ctrl-C at the prompt or during startup.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::agent::{Agent, AgentConfig};
use crate::cli::{ChatLoop, Console, Interrupt, LineInput, ThreadedInput};
use crate::config::AgentSettings;
use crate::llm::{BedrockProvider, LlmProvider};
use crate::mcp::{MCPServerManager, MCPToolProvider};
use crate::tools::{RunUnitTestsTool, ToolRegistry};

/// The agent process
pub struct App {
    settings: AgentSettings,
}

impl App {
    /// Create the app from loaded settings
    pub fn new(settings: AgentSettings) -> Self {
        Self { settings }
    }

    /// Run against Bedrock and the terminal
    pub async fn run(&self) -> Result<()> {
        let llm = BedrockProvider::from_env(self.settings.model.clone())
            .context("Failed to create Bedrock client")?;
        self.run_with(Arc::new(llm), ThreadedInput::stdin(), Interrupt::ctrl_c())
            .await
    }

    /// Run with any model backend, input source and interrupt source
    pub async fn run_with<I>(&self, llm: Arc<dyn LlmProvider>, input: I, interrupt: Interrupt) -> Result<()>
    where
        I: LineInput,
    {
        tracing::info!("=== Dev Agent Starting ===");

        let manager = Arc::new(MCPServerManager::new());

        let result = self.start_and_chat(&manager, llm, input, interrupt).await;

        manager.shutdown_all().await;

        tracing::info!("=== Dev Agent Shutting Down ===");

        result
    }

    async fn start_and_chat<I>(
        &self,
        manager: &Arc<MCPServerManager>,
        llm: Arc<dyn LlmProvider>,
        input: I,
        mut interrupt: Interrupt,
    ) -> Result<()>
    where
        I: LineInput,
    {
        let console = Console::new();

        let enabled = self.settings.mcp_servers.iter().filter(|s| s.enabled).count();
        if enabled > 0 {
            console.print_system(&format!("Starting {} tool servers...", enabled));
        }

        let started = tokio::select! {
            result = manager.start_all(&self.settings.mcp_servers) => Some(result),
            _ = interrupt.wait() => None,
        };
        match started {
            Some(result) => result?,
            None => {
                tracing::info!("[App] Interrupted during startup");
                println!();
                return Ok(());
            }
        }

        let registry = self.build_registry(manager).await?;
        tracing::info!("[App] Registered {} tools", registry.len());

        let model = llm.model();
        let server_count = manager.server_count().await;
        let tool_count = registry.len();

        let config = AgentConfig::new(self.settings.instructions.clone())
            .with_tools(Arc::new(registry))
            .with_max_tool_iterations(self.settings.max_tool_iterations);
        let mut agent = Agent::new(config, llm);

        tracing::info!(
            "[App] Agent initialized with conversation ID: {}",
            agent.conversation_id()
        );

        console.print_banner(&model, server_count, tool_count);

        let mut chat = ChatLoop::new(input, console, interrupt);
        chat.run(&mut agent).await
    }

    /// The local test tool plus every tool the servers expose
    async fn build_registry(&self, manager: &Arc<MCPServerManager>) -> Result<ToolRegistry> {
        let mut test_tool = RunUnitTestsTool::with_command(self.settings.test_command.clone())?;
        if let Some(ref dir) = self.settings.test_working_dir {
            test_tool = test_tool.with_working_dir(dir.clone());
        }

        let mut registry = ToolRegistry::new();
        registry.register(test_tool);
        registry
            .add_provider(Arc::new(MCPToolProvider::new(manager.clone())))
            .await?;
        Ok(registry)
    }
}
