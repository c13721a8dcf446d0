//! Tool trait definition
//!
//! All tools implement this trait to provide a consistent interface.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{ContentBlock, ToolDefinition, ToolInputSchema};

/// One piece of tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolResultData {
    /// Text content
    Text(String),
    /// Image content (raw bytes and media type)
    Image { data: Vec<u8>, media_type: String },
}

impl ToolResultData {
    fn to_content_block(&self) -> ContentBlock {
        match self {
            ToolResultData::Text(text) => ContentBlock::text(text.clone()),
            ToolResultData::Image { data, media_type } => {
                ContentBlock::image(data, media_type.clone())
            }
        }
    }
}

/// Result of executing a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Output in the order it should be shown to the model
    pub content: Vec<ToolResultData>,
    /// Whether the tool execution resulted in an error
    pub is_error: bool,
    /// Human-readable failure message
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result with text content
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultData::Text(output.into())],
            is_error: false,
            error: None,
        }
    }

    /// Create an error tool result
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            content: vec![ToolResultData::Text(message.clone())],
            is_error: true,
            error: Some(message),
        }
    }

    /// Create a successful image result
    pub fn image(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultData::Image {
                data,
                media_type: media_type.into(),
            }],
            is_error: false,
            error: None,
        }
    }

    /// Append a text part
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ToolResultData::Text(text.into()));
        self
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ToolResultData::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First image part, if any
    pub fn first_image(&self) -> Option<(&[u8], &str)> {
        self.content.iter().find_map(|part| match part {
            ToolResultData::Image { data, media_type } => Some((data.as_slice(), media_type.as_str())),
            _ => None,
        })
    }

    /// Wrap into a `tool_result` block answering `tool_use_id`
    pub fn into_block(self, tool_use_id: impl Into<String>) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: self.content.iter().map(ToolResultData::to_content_block).collect(),
            is_error: self.is_error,
        }
    }
}

/// Trait for tools that the agent can use
///
/// `execute` reports expected failures (missing file, non-zero exit, bad
/// arguments) as `Ok(ToolResult::error(..))`. An `Err` is still converted to
/// a failed result by the registry, so the run never aborts on a tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of this tool
    fn name(&self) -> &str;

    /// Get a description of this tool
    fn description(&self) -> &str;

    /// Schema of the JSON input
    fn input_schema(&self) -> ToolInputSchema;

    /// Get the tool descriptor advertised to the model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Execute the tool with the given input
    async fn execute(&self, input: &Value) -> Result<ToolResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("output");
        assert_eq!(result.content, vec![ToolResultData::Text("output".into())]);
        assert!(!result.is_error);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error("error message");
        assert_eq!(result.text(), "error message");
        assert_eq!(result.error.as_deref(), Some("error message"));
        assert!(result.is_error);
    }

    #[test]
    fn test_tool_result_image_with_caption() {
        let result = ToolResult::image(vec![1, 2, 3, 4], "image/png").with_text("captured");
        let (data, media_type) = result.first_image().unwrap();
        assert_eq!(data, &[1, 2, 3, 4]);
        assert_eq!(media_type, "image/png");
        assert_eq!(result.text(), "captured");
    }

    #[test]
    fn test_into_block_keeps_order_and_flag() {
        let block = ToolResult::image(vec![0], "image/png")
            .with_text("caption")
            .into_block("toolu_9");
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_9");
                assert!(!is_error);
                assert!(matches!(content[0], ContentBlock::Image { .. }));
                assert_eq!(content[1], ContentBlock::text("caption"));
            }
            _ => panic!("Expected tool result block"),
        }
    }
}
