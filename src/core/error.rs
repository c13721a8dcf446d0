//! Error taxonomy for the agent loop
//!
//! Tool-level errors (`UnknownTool`, `ToolExecutionFailure`) are recovered
//! locally and reported back to the model as failed tool results.
//! Loop-level errors (`ModelRequestFailure`, `ProtocolViolation`) end the run.

use thiserror::Error;

/// Result alias used by the library APIs
pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool failed in a way it did not report itself
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecutionFailure { tool: String, message: String },

    /// Network, auth or API error talking to the model
    #[error("Model request failed: {0}")]
    ModelRequestFailure(String),

    /// The model response breaks the tool-use protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Two tools registered under the same name
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether this error is reported to the model as data instead of
    /// terminating the run
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownTool(_) | AgentError::ToolExecutionFailure { .. }
        )
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::ModelRequestFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_level_classification() {
        assert!(AgentError::UnknownTool("x".into()).is_tool_level());
        assert!(AgentError::ToolExecutionFailure {
            tool: "bash".into(),
            message: "boom".into()
        }
        .is_tool_level());
        assert!(!AgentError::ModelRequestFailure("503".into()).is_tool_level());
        assert!(!AgentError::ProtocolViolation("empty id".into()).is_tool_level());
    }

    #[test]
    fn test_display_keeps_cause() {
        let err = AgentError::ModelRequestFailure("401 Unauthorized".into());
        assert_eq!(err.to_string(), "Model request failed: 401 Unauthorized");
    }
}
