//! Console output
//!
//! Colored terminal rendering for prompts, responses and tool activity.

use colored::*;
use std::io::{self, Write};

use crate::core::{OutputChunk, OutputSink};

/// Maximum characters of tool output shown in the terminal
const TOOL_OUTPUT_PREVIEW: usize = 500;

/// Console handles all terminal output with colored formatting
pub struct Console {
    user_color: Color,
    assistant_color: Color,
    tool_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
            assistant_color: Color::Green,
            tool_color: Color::Magenta,
        }
    }

    /// Print the input prompt (without newline)
    pub fn print_prompt(&self, continuation: bool) {
        let marker = if continuation { "." } else { ">" };
        print!("{} ", marker.color(self.user_color).bold());
        let _ = io::stdout().flush();
    }

    /// Print a complete assistant message with colored formatting
    pub fn print_assistant(&self, message: &str) {
        println!(
            "{} {}",
            "Assistant:".color(self.assistant_color).bold(),
            message.color(self.assistant_color)
        );
    }

    /// Print raw text without styling (for `/markdown`)
    pub fn print_raw(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a system message (errors, info, etc.)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Print a welcome banner
    pub fn print_banner(&self, model: &str, server_count: usize, tool_count: usize) {
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", "  Dev Agent".bright_blue().bold());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!(
            "Model: {}  Tool servers: {}  Tools: {}",
            model.bright_white(),
            server_count,
            tool_count
        );
        println!("Type your message and press Enter. Type /help for commands, /exit to quit.");
        println!();
    }

    /// Print the list of chat commands
    pub fn print_help(&self) {
        println!("{}", "Commands:".yellow().bold());
        println!("  /exit       End the session (also: exit, quit, Ctrl-D, Ctrl-C at the prompt)");
        println!("  /markdown   Show the last response as raw markdown");
        println!("  /multiline  Toggle multiline input (finish a message with a line containing only '.')");
        println!("  /tools      List the available tools");
        println!("  /help       Show this help");
        println!("Ctrl-C while the agent is working cancels that request.");
    }

    /// Print the available tool names
    pub fn print_tools(&self, names: &[String]) {
        if names.is_empty() {
            self.print_system("No tools available");
            return;
        }
        println!("{} ({})", "Tools:".color(self.tool_color).bold(), names.len());
        for name in names {
            println!("  {}", name.color(self.tool_color));
        }
    }

    /// Print a separator line
    pub fn print_separator(&self) {
        println!("{}", "-".repeat(60).bright_black());
    }

    /// Print a tool action message
    pub fn print_tool_action(&self, tool_name: &str, action: &str) {
        println!(
            "{} {} {}",
            "Tool:".color(self.tool_color).bold(),
            format!("[{}]", tool_name).color(self.tool_color),
            action
        );
    }

    /// Print a tool result
    pub fn print_tool_result(&self, result: &str, is_error: bool) {
        if is_error {
            println!("{} {}", "Tool Error:".red().bold(), truncate_chars(result, TOOL_OUTPUT_PREVIEW));
        } else {
            println!("{}", truncate_chars(result, TOOL_OUTPUT_PREVIEW).bright_black());
        }
    }

    /// Print a thinking indicator
    pub fn print_thinking(&self) {
        print!("{}", "Thinking...".bright_black());
        let _ = io::stdout().flush();
    }

    /// Clear the thinking indicator
    pub fn clear_thinking(&self) {
        print!("\r{}\r", " ".repeat(20));
        let _ = io::stdout().flush();
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for Console {
    fn emit(&self, chunk: OutputChunk) {
        match chunk {
            OutputChunk::TextComplete(text) => {
                self.clear_thinking();
                self.print_assistant(&text);
            }
            OutputChunk::ToolStart { name, input, .. } => {
                self.clear_thinking();
                self.print_tool_action(&name, &truncate_chars(&input.to_string(), 120));
            }
            OutputChunk::ToolEnd { result, .. } => {
                let shown = match (&result.image, result.output.is_empty()) {
                    (Some(image), true) => format!("[image: {}]", image.mime_type),
                    _ => result.output.clone(),
                };
                self.print_tool_result(&shown, result.is_error);
                self.print_thinking();
            }
            OutputChunk::Status(status) => {
                self.clear_thinking();
                self.print_system(&status);
            }
        }
    }
}

/// Cut `text` to at most `max` characters, marking the cut
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => format!("{}...\n(output truncated)", &text[..byte_index]),
        None => text.to_string(),
    }
}
