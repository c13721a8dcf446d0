pub mod anthropic;
pub mod provider;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::LlmProvider;
pub use scripted::ScriptedProvider;
pub use types::{
    ContentBlock, ImageSource, Message, MessageRequest, MessageResponse, Role, StopReason,
    ToolDefinition, ToolInputSchema, ToolUse, Usage,
};
