//! Search tool: find files by name and grep file contents

use anyhow::{Context, Result};
use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::tool::{Tool, ToolResult};
use crate::llm::ToolInputSchema;

/// Default cap on returned matches
const DEFAULT_MAX_RESULTS: usize = 100;
/// Bytes inspected when sniffing for binary files
const BINARY_SNIFF_LEN: usize = 1024;
/// Lines longer than this are cut in grep output
const MAX_LINE_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SearchAction {
    FindFiles,
    Grep,
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    action: SearchAction,
    path: String,
    pattern: String,
    #[serde(default = "default_true")]
    recursive: bool,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    include_extensions: Vec<String>,
    #[serde(default)]
    exclude_extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl SearchInput {
    fn extension_allowed(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        let normalize = |e: &String| e.trim_start_matches('.').to_lowercase();

        if !self.include_extensions.is_empty()
            && !self.include_extensions.iter().map(normalize).any(|e| e == ext)
        {
            return false;
        }
        !self.exclude_extensions.iter().map(normalize).any(|e| e == ext)
    }
}

/// File and content search tool
pub struct SearchTool {
    base_dir: PathBuf,
}

impl SearchTool {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn files<'a>(&self, root: &Path, input: &'a SearchInput) -> impl Iterator<Item = DirEntry> + 'a {
        let depth = if input.recursive { usize::MAX } else { 1 };
        WalkDir::new(root)
            .max_depth(depth)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(move |entry| input.extension_allowed(entry.path()))
    }

    fn find_files(&self, root: &Path, input: &SearchInput) -> Result<String> {
        let pattern = Pattern::new(&input.pattern)
            .with_context(|| format!("Invalid file name pattern: {}", input.pattern))?;
        let options = MatchOptions {
            case_sensitive: input.case_sensitive,
            ..MatchOptions::default()
        };
        let max_results = input.max_results.unwrap_or(DEFAULT_MAX_RESULTS);

        let mut found = Vec::new();
        let mut truncated = false;
        for entry in self.files(root, input) {
            let name = entry.file_name().to_string_lossy();
            if pattern.matches_with(&name, options) {
                if found.len() == max_results {
                    truncated = true;
                    break;
                }
                found.push(display_path(root, entry.path()));
            }
        }

        if found.is_empty() {
            return Ok(format!("No files found matching pattern: {}", input.pattern));
        }

        let mut result = format!("Found {} files matching '{}':\n", found.len(), input.pattern);
        for path in &found {
            result.push_str(&format!("  {}\n", path));
        }
        if truncated {
            result.push_str(&format!("... (limited to {} results)\n", max_results));
        }
        Ok(result)
    }

    fn grep(&self, root: &Path, input: &SearchInput) -> Result<String> {
        let regex = RegexBuilder::new(&input.pattern)
            .case_insensitive(!input.case_sensitive)
            .build()
            .with_context(|| format!("Invalid regex: {}", input.pattern))?;
        let max_results = input.max_results.unwrap_or(DEFAULT_MAX_RESULTS);

        let mut matches = Vec::new();
        let mut truncated = false;
        'files: for entry in self.files(root, input) {
            if is_binary_file(entry.path()) {
                continue;
            }
            let file = match File::open(entry.path()) {
                Ok(file) => file,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            for (number, line) in BufReader::new(file).lines().enumerate() {
                let Ok(line) = line else { break };
                if regex.is_match(&line) {
                    if matches.len() == max_results {
                        truncated = true;
                        break 'files;
                    }
                    let mut shown: String = line.chars().take(MAX_LINE_LENGTH).collect();
                    if shown.len() < line.len() {
                        shown.push_str("...");
                    }
                    matches.push(format!(
                        "{}:{}: {}",
                        display_path(root, entry.path()),
                        number + 1,
                        shown
                    ));
                }
            }
        }

        if matches.is_empty() {
            return Ok(format!("No matches found for pattern: {}", input.pattern));
        }

        let mut result = matches.join("\n");
        if truncated {
            result.push_str(&format!("\n\n... (showing first {} matches)", max_results));
        }
        Ok(result)
    }
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

/// Files with a NUL byte in their first KB are treated as binary
fn is_binary_file(path: &Path) -> bool {
    let mut buffer = [0u8; BINARY_SNIFF_LEN];
    match File::open(path).and_then(|mut f| f.read(&mut buffer)) {
        Ok(n) => buffer[..n].contains(&0),
        Err(_) => true,
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::with_base_dir(".")
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search for files by name (find_files, glob pattern) or for file content (grep, regex pattern)."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            json!({
                "action": {
                    "type": "string",
                    "enum": ["find_files", "grep"],
                    "description": "Action to perform"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in"
                },
                "pattern": {
                    "type": "string",
                    "description": "Glob for file names (find_files) or regex for content (grep)"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Whether to search recursively (default: true)"
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Whether the search is case-sensitive (default: false)"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of results to return (default: 100)"
                },
                "include_extensions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Only search files with these extensions"
                },
                "exclude_extensions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Skip files with these extensions"
                }
            }),
            &["action", "path", "pattern"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let search: SearchInput = match serde_json::from_value(input.clone()) {
            Ok(search) => search,
            Err(e) => return Ok(ToolResult::error(format!("Invalid search input: {}", e))),
        };
        if search.max_results == Some(0) {
            return Ok(ToolResult::error(
                "Invalid search input: max_results must be at least 1",
            ));
        }

        let root = self.resolve_path(&search.path);
        if !root.is_dir() {
            return Ok(ToolResult::error(format!(
                "Search path is not a directory: {}",
                root.display()
            )));
        }
        tracing::info!("Search {:?} '{}' in {}", search.action, search.pattern, root.display());

        // Directory walks block; keep them off the async workers
        let tool = SearchTool::with_base_dir(self.base_dir.clone());
        let result = tokio::task::spawn_blocking(move || match search.action {
            SearchAction::FindFiles => tool.find_files(&root, &search),
            SearchAction::Grep => tool.grep(&root, &search),
        })
        .await?;

        Ok(match result {
            Ok(output) => ToolResult::success(output),
            Err(e) => ToolResult::error(format!("{:#}", e)),
        })
    }
}
