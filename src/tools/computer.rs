//! Computer tool: screenshots and host inspection
//!
//! Screenshots are taken by an external capture program. The command line is
//! configurable; `{path}` is replaced with the PNG file the program must write.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::tool::{Tool, ToolResult};
use crate::llm::ToolInputSchema;

/// Placeholder replaced with the output file in the capture command
const PATH_PLACEHOLDER: &str = "{path}";
/// Capture program timeout
const CAPTURE_TIMEOUT_SECS: u64 = 30;
/// Maximum processes listed by `procinfo`
const MAX_PROCESSES: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum ComputerCommand {
    Screenshot,
    Sysinfo,
    Fsinfo {
        #[serde(default)]
        path: Option<String>,
    },
    Procinfo,
}

/// Screenshot and system information tool
pub struct ComputerTool {
    /// Capture program and arguments
    capture_command: Vec<String>,
    /// Directory used when `fsinfo` gets no path
    working_dir: PathBuf,
}

impl ComputerTool {
    /// Create a tool using `scrot` for screenshots
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            capture_command: vec!["scrot".into(), "-o".into(), PATH_PLACEHOLDER.into()],
            working_dir: working_dir.into(),
        }
    }

    /// Use a different capture program; `{path}` marks the output file
    pub fn with_capture_command(mut self, command: Vec<String>) -> Self {
        self.capture_command = command;
        self
    }

    async fn take_screenshot(&self) -> Result<ToolResult> {
        let (program, args) = self
            .capture_command
            .split_first()
            .context("Screenshot capture command is empty")?;

        let target = std::env::temp_dir().join(format!("screenshot_{}.png", uuid::Uuid::new_v4()));
        let target_str = target.to_string_lossy();
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.replace(PATH_PLACEHOLDER, &target_str))
            .collect();

        tracing::info!("Taking screenshot with {} {:?}", program, args);

        let output = tokio::time::timeout(
            Duration::from_secs(CAPTURE_TIMEOUT_SECS),
            Command::new(program)
                .args(&args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .context("Screenshot capture timed out")?
        .with_context(|| format!("Failed to run capture program: {}", program))?;

        if !output.status.success() {
            anyhow::bail!(
                "Capture program exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let data = fs::read(&target)
            .with_context(|| format!("Capture program did not write {}", target.display()))?;
        if let Err(e) = fs::remove_file(&target) {
            tracing::warn!("Failed to remove temporary screenshot {}: {}", target.display(), e);
        }

        tracing::info!("Screenshot captured ({} bytes)", data.len());
        Ok(ToolResult::image(data, "image/png")
            .with_text(format!("Screenshot taken at {}", Local::now().format("%Y-%m-%d %H:%M:%S"))))
    }

    fn system_info(&self) -> Result<ToolResult> {
        let info = json!({
            "platform": std::env::consts::OS,
            "family": std::env::consts::FAMILY,
            "machine": std::env::consts::ARCH,
            "hostname": std::env::var("HOSTNAME").unwrap_or_default(),
            "cpus": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            "timestamp": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        Ok(ToolResult::success(serde_json::to_string_pretty(&info)?))
    }

    fn filesystem_info(&self, path: Option<&str>) -> Result<ToolResult> {
        let dir = match path {
            Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
            Some(p) => self.working_dir.join(p),
            None => self.working_dir.clone(),
        };
        tracing::info!("Getting filesystem information for path: {}", dir.display());

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to list directory: {}", dir.display()))?
        {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let modified = metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string());
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "is_dir": metadata.is_dir(),
                "size": metadata.is_file().then(|| metadata.len()),
                "modified": modified,
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        let info = json!({ "path": dir.to_string_lossy(), "entries": entries });
        Ok(ToolResult::success(serde_json::to_string_pretty(&info)?))
    }

    async fn process_info(&self) -> Result<ToolResult> {
        let output = Command::new("ps")
            .args(["-eo", "pid,comm,%cpu,%mem"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run ps")?;

        if !output.status.success() {
            anyhow::bail!("ps exited with {}", output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut listing: Vec<&str> = stdout.lines().take(MAX_PROCESSES + 1).collect();
        let total = stdout.lines().count().saturating_sub(1);
        if total > MAX_PROCESSES {
            listing.push("...");
        }
        Ok(ToolResult::success(format!(
            "{} processes\n{}",
            total,
            listing.join("\n")
        )))
    }
}

impl Default for ComputerTool {
    fn default() -> Self {
        Self::new(".")
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        "computer"
    }

    fn description(&self) -> &str {
        "Interact with the computer: take a screenshot of the desktop, or get system, filesystem and process information."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            json!({
                "command": {
                    "type": "string",
                    "enum": ["screenshot", "sysinfo", "fsinfo", "procinfo"],
                    "description": "The computer command to run"
                },
                "path": {
                    "type": "string",
                    "description": "Directory for the fsinfo command (optional)"
                }
            }),
            &["command"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        // A bare call with no arguments means "screenshot"
        let input = match input {
            Value::Object(map) if map.is_empty() => json!({ "command": "screenshot" }),
            Value::Null => json!({ "command": "screenshot" }),
            other => other.clone(),
        };

        let command: ComputerCommand = match serde_json::from_value(input) {
            Ok(command) => command,
            Err(e) => return Ok(ToolResult::error(format!("Invalid computer input: {}", e))),
        };

        let result = match command {
            ComputerCommand::Screenshot => self.take_screenshot().await,
            ComputerCommand::Sysinfo => self.system_info(),
            ComputerCommand::Fsinfo { path } => self.filesystem_info(path.as_deref()),
            ComputerCommand::Procinfo => self.process_info().await,
        };

        Ok(result.unwrap_or_else(|e| ToolResult::error(format!("{:#}", e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_screenshot_with_custom_capture_command() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("fixture.png");
        fs::write(&source, [0x89, b'P', b'N', b'G']).unwrap();

        let tool = ComputerTool::new(dir.path()).with_capture_command(vec![
            "cp".into(),
            source.to_string_lossy().to_string(),
            "{path}".into(),
        ]);

        let result = tool.execute(&json!({})).await.unwrap();
        assert!(!result.is_error, "{}", result.text());
        let (data, media_type) = result.first_image().unwrap();
        assert_eq!(data, &[0x89, b'P', b'N', b'G']);
        assert_eq!(media_type, "image/png");
    }

    #[tokio::test]
    async fn test_screenshot_failure_is_failed_result() {
        let tool = ComputerTool::default()
            .with_capture_command(vec!["definitely-not-a-capture-program".into(), "{path}".into()]);
        let result = tool.execute(&json!({ "command": "screenshot" })).await.unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("Failed to run capture program"));
    }

    #[tokio::test]
    async fn test_fsinfo_lists_entries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "12345").unwrap();
        fs::create_dir(dir.path().join("a_dir")).unwrap();

        let tool = ComputerTool::new(dir.path());
        let result = tool.execute(&json!({ "command": "fsinfo" })).await.unwrap();
        assert!(!result.is_error);

        let info: Value = serde_json::from_str(&result.text()).unwrap();
        let entries = info["entries"].as_array().unwrap();
        assert_eq!(entries[0]["name"], "a_dir");
        assert_eq!(entries[0]["is_dir"], true);
        assert_eq!(entries[1]["name"], "b.txt");
        assert_eq!(entries[1]["size"], 5);
    }

    #[tokio::test]
    async fn test_sysinfo() {
        let result = ComputerTool::default()
            .execute(&json!({ "command": "sysinfo" }))
            .await
            .unwrap();
        let info: Value = serde_json::from_str(&result.text()).unwrap();
        assert_eq!(info["platform"], std::env::consts::OS);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let result = ComputerTool::default()
            .execute(&json!({ "command": "reboot" }))
            .await
            .unwrap();
        assert!(result.is_error);
    }
}
