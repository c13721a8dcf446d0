use colored::*;
use std::io::{self, Write};

use crate::agent::{LoopEvent, RunOutcome, TerminationReason};
use crate::conversation::{ContentBlock, Message, Role};

/// Longest tool output shown inline
const MAX_TOOL_OUTPUT_CHARS: usize = 2000;

/// Console handles all terminal I/O with colored formatting
#[derive(Debug, Clone)]
pub struct Console {
    user_color: Color,
    assistant_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
            assistant_color: Color::Green,
        }
    }

    /// Create a new Console with custom colors
    pub fn with_colors(user_color: Color, assistant_color: Color) -> Self {
        Self {
            user_color,
            assistant_color,
        }
    }

    /// Print a user message with colored formatting
    pub fn print_user(&self, message: &str) {
        println!("{} {}", "User:".color(self.user_color).bold(), message);
    }

    /// Print a complete assistant message with colored formatting
    pub fn print_assistant(&self, message: &str) {
        println!(
            "{} {}",
            "Assistant:".color(self.assistant_color).bold(),
            message.color(self.assistant_color)
        );
    }

    /// Print a tool invocation
    pub fn print_tool_call(&self, name: &str, input: &serde_json::Value) {
        println!(
            "{} {} {}",
            "Tool:".magenta().bold(),
            name.magenta(),
            input.to_string().bright_black()
        );
    }

    /// Print the output of a tool
    pub fn print_tool_result(&self, output: &str, is_error: bool) {
        let shown = truncate_for_display(output, MAX_TOOL_OUTPUT_CHARS);
        if is_error {
            println!("{} {}", "  ✗".red().bold(), shown.red());
        } else {
            println!("{} {}", "  ✓".green().bold(), shown.bright_black());
        }
    }

    /// Print a newline
    pub fn println(&self) {
        println!();
    }

    /// Print a system message (errors, info, etc.)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Render a message from the conversation
    pub fn print_message(&self, message: &Message) {
        match message.role {
            Role::User => self.print_user(&message.text()),
            Role::Assistant => {
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text } => self.print_assistant(text),
                        ContentBlock::ToolUse { name, input, .. } => {
                            self.print_tool_call(name, input)
                        }
                        ContentBlock::Image { source } => self.print_system(&format!(
                            "[{} image, {} bytes base64]",
                            source.media_type,
                            source.data.len()
                        )),
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
            }
            Role::ToolResult => {
                for block in &message.content {
                    if let ContentBlock::ToolResult {
                        content, is_error, ..
                    } = block
                    {
                        self.print_tool_result(&describe_blocks(content), *is_error);
                    }
                }
            }
        }
    }

    /// Render a live loop event
    pub fn print_event(&self, event: &LoopEvent) {
        match event {
            LoopEvent::AssistantMessage(message) => self.print_message(message),
            LoopEvent::ToolCallEnd {
                name,
                success,
                duration,
                output,
                ..
            } => {
                let status = if *success { "ok".green() } else { "failed".red() };
                println!(
                    "{} {} {} ({:.1}s)",
                    "  ·".bright_black(),
                    name.bright_black(),
                    status,
                    duration.as_secs_f64()
                );
                if !output.is_empty() {
                    self.print_tool_result(output, !success);
                }
            }
            LoopEvent::ModelRequest { .. }
            | LoopEvent::ToolCallStart { .. }
            | LoopEvent::TurnComplete { .. } => {}
        }
    }

    /// Render the termination reason and counters of a run
    pub fn print_outcome(&self, outcome: &RunOutcome) {
        match &outcome.reason {
            TerminationReason::Done if outcome.had_tool_failures() => self.print_system(&format!(
                "Finished; {} tool call(s) failed along the way",
                outcome.stats.tool_failures()
            )),
            TerminationReason::Done => {}
            TerminationReason::MaxTurns => self.print_system(&format!(
                "Stopped after {} tool turn(s): turn limit reached",
                outcome.stats.turns
            )),
            TerminationReason::Cancelled => self.print_system("Run cancelled"),
            TerminationReason::Error(err) => self.print_error(&err.to_string()),
        }

        let stats = &outcome.stats;
        println!(
            "{}",
            format!(
                "[{} request(s), {} tool call(s), {} in / {} out tokens]",
                stats.model_requests,
                stats.tool_calls(),
                stats.input_tokens,
                stats.output_tokens
            )
            .bright_black()
        );
    }

    /// Read a line of input from the user
    ///
    /// Returns `None` at end of input.
    pub fn read_input(&self) -> io::Result<Option<String>> {
        print!("{} ", ">".color(self.user_color).bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }

    /// Print a welcome banner
    pub fn print_banner(&self, model: &str, tools: &[&str]) {
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", "  Desk Agent - Powered by Claude".bright_blue().bold());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!("Model: {}", model);
        println!("Tools: {}", tools.join(", "));
        println!();
        println!("Type your message and press Enter. Type 'exit' or 'quit' to end the session.");
        println!("Type '/save' to write the conversation history to the session directory.");
        println!();
    }

    /// Print a separator line
    pub fn print_separator(&self) {
        println!("{}", "-".repeat(60).bright_black());
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line description of tool result content
fn describe_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Image { source } => format!("[{} image]", source.media_type),
            ContentBlock::ToolUse { name, .. } => format!("[tool_use {}]", name),
            ContentBlock::ToolResult { .. } => "[nested tool_result]".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_for_display(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... ({} more bytes)", &text[..cut], text.len() - cut),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_display() {
        assert_eq!(truncate_for_display("short", 10), "short");
        assert_eq!(truncate_for_display("abcdef", 3), "abc... (3 more bytes)");
        assert_eq!(truncate_for_display("ééé", 1), "é... (4 more bytes)");
    }

    #[test]
    fn test_describe_blocks() {
        let blocks = vec![
            ContentBlock::text("captured"),
            ContentBlock::image(&[1, 2, 3], "image/png"),
        ];
        assert_eq!(describe_blocks(&blocks), "captured\n[image/png image]");
    }
}
