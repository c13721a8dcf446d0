//! Message types for conversation state
//!
//! Conversation state stores the same `Message` type that goes over the wire.

pub use crate::llm::types::{ContentBlock, Message, Role};
