//! File editing tool
//!
//! Operations:
//! - View files (with optional line range)
//! - Create or overwrite files
//! - Replace text in files (str_replace)
//! - Insert text at a line
//! - Append to and delete files

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::tool::{Tool, ToolResult};
use crate::llm::ToolInputSchema;

/// Default maximum file size to read (1MB)
const DEFAULT_MAX_FILE_SIZE: u64 = 1_000_000;

/// File edit tool for viewing and modifying files
pub struct FileEditTool {
    /// Base directory for relative paths
    base_dir: PathBuf,
    /// Maximum file size to read (in bytes)
    max_file_size: u64,
}

/// Input commands for the file edit tool
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum FileCommand {
    View {
        path: String,
        #[serde(default)]
        start_line: Option<usize>,
        #[serde(default)]
        end_line: Option<usize>,
    },
    Create {
        path: String,
        content: String,
    },
    StrReplace {
        path: String,
        old_str: String,
        new_str: String,
    },
    Insert {
        path: String,
        line: usize,
        content: String,
    },
    Append {
        path: String,
        content: String,
    },
    Delete {
        path: String,
    },
}

impl FileEditTool {
    /// Create a new FileEditTool with a specific base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Set the maximum file size
    pub fn with_max_file_size(mut self, max_size: u64) -> Self {
        self.max_file_size = max_size;
        self
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn view_file(&self, path: &str, start_line: Option<usize>, end_line: Option<usize>) -> Result<String> {
        let resolved = self.resolve_path(path);
        tracing::info!("Viewing file: {}", resolved.display());

        let metadata = fs::metadata(&resolved)
            .with_context(|| format!("Failed to access file: {}", resolved.display()))?;

        if metadata.len() > self.max_file_size {
            anyhow::bail!(
                "File too large ({} bytes). Maximum allowed: {} bytes",
                metadata.len(),
                self.max_file_size
            );
        }

        let content = fs::read_to_string(&resolved)
            .with_context(|| format!("Failed to read file: {}", resolved.display()))?;

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let start = start_line.unwrap_or(1).saturating_sub(1);
        let end = end_line.unwrap_or(total_lines).min(total_lines);

        if start >= total_lines {
            return Ok(format!(
                "File has {} lines. Requested start line {} is out of range.",
                total_lines,
                start + 1
            ));
        }

        let mut result = format!("File: {} ({} lines total)\n", path, total_lines);
        result.push_str(&format!("Showing lines {}-{}:\n\n", start + 1, end));

        for (i, line) in lines[start..end.max(start)].iter().enumerate() {
            result.push_str(&format!("{:>4} | {}\n", start + i + 1, line));
        }

        Ok(result)
    }

    fn create_file(&self, path: &str, content: &str) -> Result<String> {
        let resolved = self.resolve_path(path);
        tracing::info!("Creating file: {}", resolved.display());

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::write(&resolved, content)
            .with_context(|| format!("Failed to write file: {}", resolved.display()))?;

        Ok(format!("File written successfully: {} ({} bytes)", path, content.len()))
    }

    fn str_replace(&self, path: &str, old_str: &str, new_str: &str) -> Result<String> {
        let resolved = self.resolve_path(path);
        tracing::info!("Replacing text in file: {}", resolved.display());

        if old_str.is_empty() {
            anyhow::bail!("old_str must not be empty");
        }

        let content = fs::read_to_string(&resolved)
            .with_context(|| format!("Failed to read file: {}", resolved.display()))?;

        match content.matches(old_str).count() {
            0 => anyhow::bail!(
                "String not found in file. Make sure to include exact text including whitespace."
            ),
            1 => {}
            n => anyhow::bail!(
                "Found {} occurrences of the string. Please provide a more specific string to ensure only one match.",
                n
            ),
        }

        let new_content = content.replacen(old_str, new_str, 1);
        fs::write(&resolved, &new_content)
            .with_context(|| format!("Failed to write file: {}", resolved.display()))?;

        Ok(format!("Successfully replaced text in {}.", path))
    }

    fn insert_at_line(&self, path: &str, line: usize, content: &str) -> Result<String> {
        let resolved = self.resolve_path(path);
        tracing::info!("Inserting text at line {} in file: {}", line, resolved.display());

        let file_content = fs::read_to_string(&resolved)
            .with_context(|| format!("Failed to read file: {}", resolved.display()))?;

        let mut lines: Vec<&str> = file_content.lines().collect();
        let insert_index = line.saturating_sub(1).min(lines.len());
        lines.insert(insert_index, content);

        let mut new_content = lines.join("\n");
        if file_content.ends_with('\n') {
            new_content.push('\n');
        }

        fs::write(&resolved, &new_content)
            .with_context(|| format!("Failed to write file: {}", resolved.display()))?;

        Ok(format!("Successfully inserted text at line {} in {}", line, path))
    }

    fn append_file(&self, path: &str, content: &str) -> Result<String> {
        use std::io::Write;

        let resolved = self.resolve_path(path);
        tracing::info!("Appending to file: {}", resolved.display());

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved)
            .with_context(|| format!("Failed to open file: {}", resolved.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to append to file: {}", resolved.display()))?;

        Ok(format!("Appended {} bytes to {}", content.len(), path))
    }

    fn delete_file(&self, path: &str) -> Result<String> {
        let resolved = self.resolve_path(path);
        tracing::info!("Deleting file: {}", resolved.display());

        if resolved.is_dir() {
            anyhow::bail!("Refusing to delete directory: {}", path);
        }

        fs::remove_file(&resolved)
            .with_context(|| format!("Failed to delete file: {}", resolved.display()))?;

        Ok(format!("Deleted {}", path))
    }
}

impl Default for FileEditTool {
    fn default() -> Self {
        Self::with_base_dir(".")
    }
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "file_edit"
    }

    fn description(&self) -> &str {
        "View, create, and edit files. Supports viewing files with line numbers, creating files, replacing text (str_replace), inserting at a line, appending, and deleting."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            json!({
                "command": {
                    "type": "string",
                    "description": "The operation to perform",
                    "enum": ["view", "create", "str_replace", "insert", "append", "delete"]
                },
                "path": {
                    "type": "string",
                    "description": "File path (relative to the working directory or absolute)"
                },
                "content": {
                    "type": "string",
                    "description": "Content for 'create', 'insert' or 'append'"
                },
                "old_str": {
                    "type": "string",
                    "description": "String to find for 'str_replace'"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement for 'str_replace'"
                },
                "start_line": {
                    "type": "integer",
                    "description": "Starting line number for 'view' (1-indexed)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Ending line number for 'view' (inclusive)"
                },
                "line": {
                    "type": "integer",
                    "description": "Line number for 'insert' (1-indexed)"
                }
            }),
            &["command", "path"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let command: FileCommand = match serde_json::from_value(input.clone()) {
            Ok(command) => command,
            Err(e) => return Ok(ToolResult::error(format!("Invalid file_edit input: {}", e))),
        };

        let result = match command {
            FileCommand::View { path, start_line, end_line } => {
                self.view_file(&path, start_line, end_line)
            }
            FileCommand::Create { path, content } => self.create_file(&path, &content),
            FileCommand::StrReplace { path, old_str, new_str } => {
                self.str_replace(&path, &old_str, &new_str)
            }
            FileCommand::Insert { path, line, content } => {
                self.insert_at_line(&path, line, &content)
            }
            FileCommand::Append { path, content } => self.append_file(&path, &content),
            FileCommand::Delete { path } => self.delete_file(&path),
        };

        match result {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(format!("{:#}", e))),
        }
    }
}
