//! Session recorder
//!
//! Layout under the session root:
//!
//! ```text
//! <root>/<session-id>/
//!     history.jsonl
//!     screenshots/<source>_screenshot_<timestamp>.png
//!     tool_outputs/<tool>_output_<timestamp>_<call-id>.json
//! ```

use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conversation::ConversationState;
use crate::core::AgentResult;
use crate::tools::{ToolResult, ToolResultData};

const SCREENSHOTS_DIR: &str = "screenshots";
const TOOL_OUTPUTS_DIR: &str = "tool_outputs";
const HISTORY_FILE: &str = "history.jsonl";

#[derive(Debug, Serialize)]
struct ToolOutputRecord<'a> {
    tool: &'a str,
    call_id: &'a str,
    timestamp: String,
    duration_ms: u64,
    input: &'a Value,
    is_error: bool,
    text: String,
    screenshots: Vec<PathBuf>,
}

/// Writes session artifacts under a per-session directory
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    session_id: String,
    dir: PathBuf,
}

impl SessionRecorder {
    /// Create a new session directory under `root`
    pub fn create(root: impl AsRef<Path>) -> AgentResult<Self> {
        let session_id = uuid::Uuid::new_v4().to_string();
        Self::open(root, session_id)
    }

    /// Open (or create) the directory of a known session
    pub fn open(root: impl AsRef<Path>, session_id: impl Into<String>) -> AgentResult<Self> {
        let session_id = session_id.into();
        let dir = root.as_ref().join(&session_id);
        fs::create_dir_all(dir.join(SCREENSHOTS_DIR))?;
        fs::create_dir_all(dir.join(TOOL_OUTPUTS_DIR))?;

        tracing::info!("Session directory: {}", dir.display());
        Ok(Self { session_id, dir })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Save PNG bytes produced by `source`
    pub fn save_screenshot(&self, source: &str, data: &[u8]) -> AgentResult<PathBuf> {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        self.write_screenshot(source, &tag, data)
    }

    /// `tag` keeps names unique when several images share a timestamp
    fn write_screenshot(&self, source: &str, tag: &str, data: &[u8]) -> AgentResult<PathBuf> {
        let filename = format!(
            "{}_screenshot_{}_{}.png",
            sanitize(source),
            timestamp(),
            sanitize(tag)
        );
        let path = self.dir.join(SCREENSHOTS_DIR).join(filename);
        fs::write(&path, data)?;
        tracing::info!("Saved screenshot: {}", path.display());
        Ok(path)
    }

    /// Save a JSON record of one tool call; images go to the screenshots dir
    pub fn record_tool_output(
        &self,
        tool: &str,
        call_id: &str,
        input: &Value,
        result: &ToolResult,
        duration: Duration,
    ) -> AgentResult<PathBuf> {
        let mut screenshots = Vec::new();
        let images = result.content.iter().filter_map(|part| match part {
            ToolResultData::Image { data, .. } => Some(data),
            _ => None,
        });
        for (index, data) in images.enumerate() {
            let tag = format!("{}_{}", call_id, index);
            screenshots.push(self.write_screenshot(tool, &tag, data)?);
        }

        let record = ToolOutputRecord {
            tool,
            call_id,
            timestamp: Local::now().to_rfc3339(),
            duration_ms: duration.as_millis() as u64,
            input,
            is_error: result.is_error,
            text: result.text(),
            screenshots,
        };

        let filename = format!(
            "{}_output_{}_{}.json",
            sanitize(tool),
            timestamp(),
            sanitize(call_id)
        );
        let path = self.dir.join(TOOL_OUTPUTS_DIR).join(filename);
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        tracing::debug!("Saved tool output: {}", path.display());
        Ok(path)
    }

    /// Overwrite the history file with the full conversation
    pub fn save_history(&self, state: &ConversationState) -> AgentResult<()> {
        state.save_jsonl(&self.history_path())?;
        tracing::debug!("Saved {} messages to history", state.len());
        Ok(())
    }

    /// Load the saved conversation, empty if none was saved
    pub fn load_history(&self) -> AgentResult<ConversationState> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(ConversationState::new());
        }
        ConversationState::load_jsonl(&path)
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_create_layout() {
        let root = tempdir().unwrap();
        let recorder = SessionRecorder::create(root.path()).unwrap();
        assert!(recorder.dir().join("screenshots").is_dir());
        assert!(recorder.dir().join("tool_outputs").is_dir());
        assert_eq!(recorder.dir(), root.path().join(recorder.session_id()));
    }

    #[test]
    fn test_record_tool_output_with_image() {
        let root = tempdir().unwrap();
        let recorder = SessionRecorder::create(root.path()).unwrap();
        let result = ToolResult::image(vec![1, 2, 3], "image/png").with_text("captured");

        let path = recorder
            .record_tool_output(
                "computer",
                "toolu/1",
                &json!({"command": "screenshot"}),
                &result,
                Duration::from_millis(12),
            )
            .unwrap();

        let record: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record["tool"], "computer");
        assert_eq!(record["call_id"], "toolu/1");
        assert_eq!(record["duration_ms"], 12);
        assert_eq!(record["text"], "captured");
        let shot = PathBuf::from(record["screenshots"][0].as_str().unwrap());
        assert_eq!(fs::read(shot).unwrap(), vec![1, 2, 3]);
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("toolu_1.json"));
    }

    #[test]
    fn test_images_in_one_turn_are_kept_apart() {
        let root = tempdir().unwrap();
        let recorder = SessionRecorder::create(root.path()).unwrap();
        let input = json!({"command": "screenshot"});

        let mut pair = ToolResult::image(vec![1], "image/png").with_text("first");
        pair.content.push(ToolResultData::Image {
            data: vec![2],
            media_type: "image/png".to_string(),
        });
        let single = ToolResult::image(vec![3], "image/png");

        let first = recorder
            .record_tool_output("computer", "t1", &input, &pair, Duration::ZERO)
            .unwrap();
        let second = recorder
            .record_tool_output("computer", "t2", &input, &single, Duration::ZERO)
            .unwrap();

        let shots = |record: &PathBuf| -> Vec<Vec<u8>> {
            let record: Value = serde_json::from_str(&fs::read_to_string(record).unwrap()).unwrap();
            record["screenshots"]
                .as_array()
                .unwrap()
                .iter()
                .map(|path| fs::read(path.as_str().unwrap()).unwrap())
                .collect()
        };
        assert_eq!(shots(&first), vec![vec![1], vec![2]]);
        assert_eq!(shots(&second), vec![vec![3]]);
        assert_eq!(fs::read_dir(recorder.dir().join("screenshots")).unwrap().count(), 3);

        recorder.save_screenshot("browser", &[4]).unwrap();
        recorder.save_screenshot("browser", &[5]).unwrap();
        assert_eq!(fs::read_dir(recorder.dir().join("screenshots")).unwrap().count(), 5);
    }

    #[test]
    fn test_history_round_trip() {
        let root = tempdir().unwrap();
        let recorder = SessionRecorder::open(root.path(), "fixed").unwrap();
        assert!(recorder.load_history().unwrap().is_empty());

        let mut state = ConversationState::new();
        state.append(Message::user("hello"));
        state.append(Message::assistant("hi"));
        recorder.save_history(&state).unwrap();

        assert_eq!(recorder.load_history().unwrap(), state);
    }
}
