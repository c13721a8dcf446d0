//! Conversation state
//!
//! An owned, append-only sequence of messages. It is the single source of
//! truth sent to the model on every round and rendered by the UI.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::message::{Message, Role};
use crate::core::AgentResult;

/// Ordered, append-only list of messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn append(&mut self, message: Message) {
        tracing::debug!(
            "Appending {:?} message with {} blocks",
            message.role,
            message.content.len()
        );
        self.messages.push(message);
    }

    /// Read-only copy of all messages
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Borrow the messages without copying
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages with the given role
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Serialize to a JSON array
    pub fn to_json(&self) -> AgentResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Re-hydrate from a JSON array
    pub fn from_json(json: &str) -> AgentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write one message per line
    pub fn save_jsonl(&self, path: &Path) -> AgentResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        for message in &self.messages {
            let json = serde_json::to_string(message)?;
            writeln!(writer, "{}", json)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load messages written by `save_jsonl`
    pub fn load_jsonl(path: &Path) -> AgentResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut state = Self::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            state.messages.push(serde_json::from_str(&line)?);
        }

        Ok(state)
    }
}

impl From<Vec<Message>> for ConversationState {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ContentBlock;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_state() -> ConversationState {
        let mut state = ConversationState::new();
        state.append(Message::user("take a screenshot"));
        state.append(Message::assistant_with_blocks(vec![
            ContentBlock::text("Sure."),
            ContentBlock::tool_use("toolu_1", "computer", json!({"command": "screenshot"})),
        ]));
        state.append(Message::tool_results(vec![ContentBlock::ToolResult {
            tool_use_id: "toolu_1".into(),
            content: vec![ContentBlock::image(&[1, 2, 3], "image/png")],
            is_error: false,
        }]));
        state.append(Message::assistant("Here it is."));
        state
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut state = sample_state();
        let snapshot = state.snapshot();
        state.append(Message::user("more"));
        assert_eq!(snapshot.len(), 4);
        assert_eq!(state.len(), 5);
    }

    #[test]
    fn test_json_round_trip() {
        let state = sample_state();
        let json = state.to_json().unwrap();
        let restored = ConversationState::from_json(&json).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.snapshot(), state.snapshot());
    }

    #[test]
    fn test_jsonl_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let state = sample_state();

        state.save_jsonl(&path).unwrap();
        let restored = ConversationState::load_jsonl(&path).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_count_role() {
        let state = sample_state();
        assert_eq!(state.count_role(Role::Assistant), 2);
        assert_eq!(state.count_role(Role::ToolResult), 1);
        assert_eq!(state.count_role(Role::User), 1);
    }
}
