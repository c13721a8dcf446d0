//! Model provider abstraction

use async_trait::async_trait;

use super::types::{MessageRequest, MessageResponse};
use crate::core::AgentResult;

/// A remote model that answers message requests
///
/// Implementations make exactly one attempt per call. Retry and rate-limit
/// handling belong to whoever constructs the provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request and return the assistant reply
    async fn send(&self, request: &MessageRequest) -> AgentResult<MessageResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
