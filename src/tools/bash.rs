//! Bash tool for executing shell commands
//!
//! Each command runs in a fresh shell starting from the working directory.
//! Commands that outlive their timeout are killed.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::tool::{Tool, ToolResult};
use crate::llm::ToolInputSchema;

/// Default command timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Default maximum output length in characters
const DEFAULT_MAX_OUTPUT: usize = 50000;

/// Bash tool for executing shell commands
pub struct BashTool {
    /// Working directory for command execution
    working_dir: String,
    /// Maximum output length in characters
    max_output_length: usize,
    /// Per-command timeout
    timeout: Duration,
}

/// Input for the bash tool
#[derive(Debug, Deserialize)]
struct BashInput {
    /// The command to execute
    command: String,
    /// Optional working directory override
    working_dir: Option<String>,
}

impl BashTool {
    /// Create a new Bash tool with a specific working directory
    pub fn with_working_dir(working_dir: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            max_output_length: DEFAULT_MAX_OUTPUT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the maximum output length
    pub fn with_max_output_length(mut self, max_length: usize) -> Self {
        self.max_output_length = max_length;
        self
    }

    /// Set the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute a bash command and return the combined output and exit code
    async fn run_command(&self, command: &str, working_dir: &str) -> Result<(String, i32)> {
        tracing::info!("Executing bash command: {}", command);
        tracing::debug!("Working directory: {}", working_dir);

        let child = Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| anyhow::anyhow!("Command timed out after {:?}", self.timeout))??;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("STDERR:\n");
            result.push_str(&stderr);
        }

        truncate_output(&mut result, self.max_output_length);

        tracing::debug!("Command exit code: {}", exit_code);
        tracing::debug!("Output length: {} chars", result.len());

        Ok((result, exit_code))
    }
}

/// Truncate on a char boundary and mark the cut
pub(crate) fn truncate_output(output: &mut String, max_length: usize) {
    if output.len() <= max_length {
        return;
    }
    let mut cut = max_length;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    output.truncate(cut);
    output.push_str("\n... (output truncated)");
}

impl Default for BashTool {
    fn default() -> Self {
        Self::with_working_dir(".")
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command in the shell. Each command runs in a fresh shell without session persistence."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            json!({
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Optional working directory for the command. Defaults to the agent working directory."
                }
            }),
            &["command"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let bash_input: BashInput = serde_json::from_value(input.clone())
            .map_err(|e| anyhow::anyhow!("Invalid bash input: {}", e))?;

        let working_dir = bash_input
            .working_dir
            .as_deref()
            .unwrap_or(&self.working_dir);

        match self.run_command(&bash_input.command, working_dir).await {
            Ok((output, 0)) => {
                if output.is_empty() {
                    Ok(ToolResult::success("Command completed successfully (no output)"))
                } else {
                    Ok(ToolResult::success(output))
                }
            }
            Ok((output, exit_code)) => Ok(ToolResult::error(format!(
                "Command failed with exit code {}\n{}",
                exit_code, output
            ))),
            Err(e) => Ok(ToolResult::error(format!("Failed to execute command: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_command() {
        let tool = BashTool::with_working_dir(".");
        let input = json!({ "command": "echo 'hello world'" });
        let result = tool.execute(&input).await.unwrap();
        assert!(!result.is_error);
        assert!(result.text().contains("hello world"));
    }

    #[tokio::test]
    async fn test_failing_command() {
        let tool = BashTool::with_working_dir(".");
        let input = json!({ "command": "exit 1" });
        let result = tool.execute(&input).await.unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("exit code 1"));
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let tool = BashTool::default();
        let result = tool
            .execute(&json!({ "command": "echo oops >&2" }))
            .await
            .unwrap();
        assert!(result.text().contains("STDERR:\noops"));
    }

    #[tokio::test]
    async fn test_timeout_is_failed_result() {
        let tool = BashTool::default().with_timeout(Duration::from_millis(100));
        let result = tool.execute(&json!({ "command": "sleep 5" })).await.unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_command_is_error() {
        let tool = BashTool::default();
        assert!(tool.execute(&json!({})).await.is_err());
    }

    #[test]
    fn test_truncate_output() {
        let mut output = "abcdef".to_string();
        truncate_output(&mut output, 3);
        assert_eq!(output, "abc\n... (output truncated)");
    }
}
