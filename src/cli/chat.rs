//! Interactive chat loop
//!
//! Reads user input line by line, dispatches slash commands, and hands
//! everything else to the agent. Ctrl-C at the prompt ends the loop; Ctrl-C
//! during a turn cancels just that turn.

use anyhow::Result;

use crate::agent::Agent;

use super::console::Console;
use super::input::{Interrupt, LineInput};

/// Line that ends a message in multiline mode
const MULTILINE_TERMINATOR: &str = ".";

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// End the session
    Exit,
    /// Reprint the last response as raw text
    Markdown,
    /// Toggle multiline input
    Multiline,
    /// List the available tools
    Tools,
    /// Show the command list
    Help,
    /// Blank line
    Empty,
    /// Slash command that is not recognized
    Unknown(String),
    /// Text for the agent
    Message(String),
}

impl ChatCommand {
    /// Parse a single input line
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => ChatCommand::Empty,
            "/exit" | "/quit" | "exit" | "quit" => ChatCommand::Exit,
            "/markdown" => ChatCommand::Markdown,
            "/multiline" => ChatCommand::Multiline,
            "/tools" => ChatCommand::Tools,
            "/help" => ChatCommand::Help,
            cmd if cmd.starts_with('/') && !cmd.contains(char::is_whitespace) => {
                ChatCommand::Unknown(cmd.to_string())
            }
            text => ChatCommand::Message(text.to_string()),
        }
    }
}

/// What a read from the user produced
enum InputEvent {
    Line(String),
    End,
    Interrupted,
}

/// The prompt/read/dispatch loop
pub struct ChatLoop<I> {
    input: I,
    console: Console,
    interrupt: Interrupt,
    multiline: bool,
}

impl<I: LineInput> ChatLoop<I> {
    /// Create a loop reading from `input`
    pub fn new(input: I, console: Console, interrupt: Interrupt) -> Self {
        Self {
            input,
            console,
            interrupt,
            multiline: false,
        }
    }

    /// Whether multiline input is on
    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    /// Run until the user exits or input ends
    ///
    /// Agent errors are shown and the loop continues; only input errors end it.
    pub async fn run(&mut self, agent: &mut Agent) -> Result<()> {
        loop {
            self.console.print_prompt(false);

            let line = match self.read_line().await? {
                InputEvent::Line(line) => line,
                InputEvent::End => {
                    tracing::info!("[ChatLoop] End of input");
                    println!();
                    break;
                }
                InputEvent::Interrupted => {
                    tracing::info!("[ChatLoop] Interrupted at the prompt");
                    println!();
                    break;
                }
            };

            match ChatCommand::parse(&line) {
                ChatCommand::Exit => {
                    tracing::info!("[ChatLoop] Exit requested");
                    break;
                }
                ChatCommand::Empty => continue,
                ChatCommand::Help => self.console.print_help(),
                ChatCommand::Tools => self.console.print_tools(&agent.tool_names()),
                ChatCommand::Markdown => match agent.last_response() {
                    Some(text) => self.console.print_raw(text),
                    None => self.console.print_system("No response yet"),
                },
                ChatCommand::Multiline => {
                    self.multiline = !self.multiline;
                    let state = if self.multiline {
                        "on (finish with a line containing only '.')"
                    } else {
                        "off"
                    };
                    self.console.print_system(&format!("Multiline input {}", state));
                }
                ChatCommand::Unknown(cmd) => {
                    self.console
                        .print_system(&format!("Unknown command: {} (try /help)", cmd));
                }
                ChatCommand::Message(first_line) => {
                    let message = if self.multiline {
                        match self.read_multiline(first_line).await? {
                            Some(message) => message,
                            None => {
                                tracing::info!("[ChatLoop] Interrupted during multiline input");
                                println!();
                                break;
                            }
                        }
                    } else {
                        first_line
                    };
                    self.send(agent, &message).await;
                }
            }
        }

        Ok(())
    }

    /// Run one turn; an interrupt cancels it and restores the history
    async fn send(&mut self, agent: &mut Agent, message: &str) {
        if message.trim().is_empty() {
            return;
        }

        tracing::info!("[ChatLoop] User message ({} chars)", message.len());
        self.console.print_thinking();

        let checkpoint = agent.history().len();
        let outcome = tokio::select! {
            result = agent.process_turn(message, &self.console) => Some(result),
            _ = self.interrupt.wait() => None,
        };

        match outcome {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                self.console.clear_thinking();
                self.console.print_error(&format!("{:#}", e));
            }
            None => {
                tracing::info!("[ChatLoop] Turn interrupted");
                agent.rollback(checkpoint);
                self.interrupt.clear();
                self.console.clear_thinking();
                self.console.print_system("Interrupted");
            }
        }
        self.console.print_separator();
    }

    async fn read_line(&mut self) -> Result<InputEvent> {
        tokio::select! {
            line = self.input.next_line() => Ok(match line? {
                Some(line) => InputEvent::Line(line),
                None => InputEvent::End,
            }),
            _ = self.interrupt.wait() => Ok(InputEvent::Interrupted),
        }
    }

    /// Keep reading until the terminator line or end of input; None if interrupted
    async fn read_multiline(&mut self, first_line: String) -> Result<Option<String>> {
        if first_line.trim() == MULTILINE_TERMINATOR {
            return Ok(Some(String::new()));
        }

        let mut lines = vec![first_line];
        loop {
            self.console.print_prompt(true);
            match self.read_line().await? {
                InputEvent::Line(line) if line.trim() == MULTILINE_TERMINATOR => break,
                InputEvent::Line(line) => lines.push(line),
                InputEvent::End => break,
                InputEvent::Interrupted => return Ok(None),
            }
        }
        Ok(Some(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::cli::input::ReaderInput;
    use crate::llm::{ContentBlock, LlmProvider, Message, MessageResponse, StopReason, ToolDefinition, Usage};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::BufReader;
    use tokio::sync::mpsc;

    /// Replies with the text of the last user message
    #[derive(Default)]
    struct EchoLlm {
        received: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn send_with_tools_and_system(
            &self,
            messages: Vec<Message>,
            _system: Option<&str>,
            _tools: Vec<ToolDefinition>,
        ) -> Result<MessageResponse> {
            let last = messages
                .last()
                .and_then(|m| m.text())
                .unwrap_or_default()
                .to_string();
            self.received.lock().unwrap().push(last.clone());
            Ok(MessageResponse {
                content: vec![ContentBlock::text(format!("you said: {}", last))],
                stop_reason: Some(StopReason::EndTurn),
                usage: Usage::default(),
            })
        }

        fn model(&self) -> String {
            "echo".to_string()
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    async fn run_script(script: &str) -> (Arc<EchoLlm>, Agent, bool) {
        let llm = Arc::new(EchoLlm::default());
        let mut agent = Agent::new(AgentConfig::new("test"), llm.clone());
        let mut chat = ChatLoop::new(
            ReaderInput::new(script.as_bytes()),
            Console::new(),
            Interrupt::never(),
        );
        chat.run(&mut agent).await.unwrap();
        let multiline = chat.is_multiline();
        (llm, agent, multiline)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ChatCommand::parse("/exit"), ChatCommand::Exit);
        assert_eq!(ChatCommand::parse("  quit "), ChatCommand::Exit);
        assert_eq!(ChatCommand::parse("exit"), ChatCommand::Exit);
        assert_eq!(ChatCommand::parse("/markdown"), ChatCommand::Markdown);
        assert_eq!(ChatCommand::parse("/multiline"), ChatCommand::Multiline);
        assert_eq!(ChatCommand::parse("/tools"), ChatCommand::Tools);
        assert_eq!(ChatCommand::parse("/help"), ChatCommand::Help);
        assert_eq!(ChatCommand::parse("   "), ChatCommand::Empty);
        assert_eq!(ChatCommand::parse("/nope"), ChatCommand::Unknown("/nope".into()));
        assert_eq!(
            ChatCommand::parse("/src/main.rs looks wrong"),
            ChatCommand::Message("/src/main.rs looks wrong".into())
        );
        assert_eq!(ChatCommand::parse("fix it"), ChatCommand::Message("fix it".into()));
    }

    #[tokio::test]
    async fn test_messages_until_exit() {
        let (llm, agent, _) = run_script("hello\n\nrun the tests\nexit\nignored\n").await;

        assert_eq!(
            *llm.received.lock().unwrap(),
            vec!["hello".to_string(), "run the tests".to_string()]
        );
        assert_eq!(agent.last_response(), Some("you said: run the tests"));
    }

    #[tokio::test]
    async fn test_end_of_input_ends_loop() {
        let (llm, _, _) = run_script("only line").await;
        assert_eq!(*llm.received.lock().unwrap(), vec!["only line".to_string()]);
    }

    #[tokio::test]
    async fn test_multiline_input() {
        let (llm, _, multiline) =
            run_script("/multiline\nfirst\nsecond\n.\n/multiline\nsingle\n/exit\n").await;

        assert_eq!(
            *llm.received.lock().unwrap(),
            vec!["first\nsecond".to_string(), "single".to_string()]
        );
        assert!(!multiline);
    }

    #[tokio::test]
    async fn test_commands_do_not_reach_agent() {
        let (llm, agent, _) = run_script("/help\n/tools\n/markdown\n/what\n/exit\n").await;
        assert!(llm.received.lock().unwrap().is_empty());
        assert!(agent.history().is_empty());
    }

    /// Answers like `EchoLlm` but hangs on "slow", firing the interrupt first
    struct StallingLlm {
        interrupt: mpsc::UnboundedSender<()>,
        histories: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl LlmProvider for StallingLlm {
        async fn send_with_tools_and_system(
            &self,
            messages: Vec<Message>,
            _system: Option<&str>,
            _tools: Vec<ToolDefinition>,
        ) -> Result<MessageResponse> {
            self.histories.lock().unwrap().push(messages.len());
            if messages.last().and_then(|m| m.text()) == Some("slow") {
                self.interrupt.send(()).unwrap();
                std::future::pending::<()>().await;
            }
            Ok(MessageResponse {
                content: vec![ContentBlock::text("fast")],
                stop_reason: Some(StopReason::EndTurn),
                usage: Usage::default(),
            })
        }

        fn model(&self) -> String {
            "stalling".to_string()
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_interrupt_cancels_only_the_running_turn() {
        let (tx, interrupt) = Interrupt::channel();
        let llm = Arc::new(StallingLlm {
            interrupt: tx,
            histories: Mutex::new(Vec::new()),
        });
        let mut agent = Agent::new(AgentConfig::new("test"), llm.clone());
        let mut chat = ChatLoop::new(
            ReaderInput::new("first\nslow\nafter\n/exit\n".as_bytes()),
            Console::new(),
            interrupt,
        );

        chat.run(&mut agent).await.unwrap();

        // "after" is sent on top of the first exchange only
        assert_eq!(*llm.histories.lock().unwrap(), vec![1, 3, 3]);
        assert_eq!(agent.history().len(), 4);
        assert_eq!(agent.history()[2].text(), Some("after"));
    }

    #[tokio::test]
    async fn test_interrupt_at_prompt_ends_loop() {
        let (reader, _writer) = tokio::io::duplex(64);
        let (tx, interrupt) = Interrupt::channel();
        let llm = Arc::new(EchoLlm::default());
        let mut agent = Agent::new(AgentConfig::new("test"), llm.clone());
        let mut chat = ChatLoop::new(ReaderInput::new(BufReader::new(reader)), Console::new(), interrupt);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), chat.run(&mut agent))
            .await
            .expect("chat loop kept waiting for input")
            .unwrap();

        assert!(llm.received.lock().unwrap().is_empty());
    }
}
