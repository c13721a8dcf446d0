//! Append-only conversation state

mod message;
mod state;

pub use message::{ContentBlock, Message, Role};
pub use state::ConversationState;
