//! Message and content types in the Anthropic Messages API shape
//!
//! `Message` is both the unit of conversation state and the wire format.
//! Tool result messages carry their own role so the state can tell them apart
//! from user input; the provider sends them as `user` messages.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

impl Role {
    /// Role name used on the Anthropic wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::User | Role::ToolResult => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Base64 image payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

/// A single block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Vec<ContentBlock>,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Create a text block
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Create an image block from raw bytes
    pub fn image(data: &[u8], media_type: impl Into<String>) -> Self {
        ContentBlock::Image {
            source: ImageSource {
                source_type: "base64".to_string(),
                media_type: media_type.into(),
                data: STANDARD.encode(data),
            },
        }
    }

    /// Create a tool use block
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Whether this is a tool use block
    pub fn is_tool_use(&self) -> bool {
        matches!(self, ContentBlock::ToolUse { .. })
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// Borrowed view of a tool use block
#[derive(Debug, Clone, Copy)]
pub struct ToolUse<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub input: &'a Value,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with content blocks
    pub fn assistant_with_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: blocks,
        }
    }

    /// Create a tool result message
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::ToolResult,
            content: blocks,
        }
    }

    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool use blocks in the order they appear
    pub fn tool_uses(&self) -> Vec<ToolUse<'_>> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUse { id, name, input }),
                _ => None,
            })
            .collect()
    }

    /// Whether the message requests any tool
    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_use)
    }
}

/// Input schema of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolInputSchema {
    /// Object schema with the given properties and required fields
    pub fn object(properties: Value, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: Some(required.iter().map(|s| s.to_string()).collect()),
        }
    }
}

/// Tool descriptor advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Other,
}

/// Token usage reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// A request to the model
#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// Capability flag sent as the `anthropic-beta` header
    pub beta: Option<String>,
}

/// The assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub usage: Usage,
}

impl MessageResponse {
    /// Build a response from content blocks
    pub fn from_blocks(content: Vec<ContentBlock>) -> Self {
        let stop_reason = if content.iter().any(ContentBlock::is_tool_use) {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        Self {
            id: String::new(),
            content,
            stop_reason: Some(stop_reason),
            usage: Usage::default(),
        }
    }

    /// Convert into an assistant message
    pub fn into_message(self) -> Message {
        Message::assistant_with_blocks(self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_use_wire_shape() {
        let block = ContentBlock::tool_use("toolu_1", "bash", json!({"command": "ls"}));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({"type": "tool_use", "id": "toolu_1", "name": "bash", "input": {"command": "ls"}})
        );
    }

    #[test]
    fn test_image_block_encodes_base64() {
        let block = ContentBlock::image(&[0x89, 0x50, 0x4e, 0x47], "image/png");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["source"]["type"], "base64");
        assert_eq!(value["source"]["media_type"], "image/png");
        assert_eq!(value["source"]["data"], "iVBORw==");
    }

    #[test]
    fn test_tool_result_defaults() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "tool_result", "tool_use_id": "a"})).unwrap();
        assert_eq!(
            block,
            ContentBlock::ToolResult {
                tool_use_id: "a".into(),
                content: vec![],
                is_error: false
            }
        );
    }

    #[test]
    fn test_response_parsing() {
        let response: MessageResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Taking a screenshot"},
                {"type": "tool_use", "id": "toolu_1", "name": "computer", "input": {"command": "screenshot"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        }))
        .unwrap();

        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.usage.input_tokens, 12);
        let message = response.into_message();
        assert_eq!(message.text(), "Taking a screenshot");
        let uses = message.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "computer");
    }

    #[test]
    fn test_unknown_stop_reason() {
        let reason: StopReason = serde_json::from_value(json!("pause_turn")).unwrap();
        assert_eq!(reason, StopReason::Other);
    }

    #[test]
    fn test_tool_result_role_sent_as_user() {
        assert_eq!(Role::ToolResult.wire_name(), "user");
        assert_eq!(Role::Assistant.wire_name(), "assistant");
    }
}
