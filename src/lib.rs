//! desk-agent: a tool-using agent loop for a desktop environment
//!
//! The model converses with the user and may ask for local tools (shell,
//! files, screenshots, browser, search, containers). [`agent::AgentLoop`]
//! executes every requested tool, answers with the results and repeats
//! until the model is done.

pub mod agent;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod core;
pub mod llm;
pub mod logging;
pub mod session;
pub mod tools;

pub use agent::{AgentLoop, LoopOptions, RunOutcome, TerminationReason};
pub use config::AgentConfig;
pub use conversation::ConversationState;
pub use crate::core::{AgentError, AgentResult};
pub use tools::{Tool, ToolRegistry, ToolResult};
