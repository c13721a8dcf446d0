//! Scripted provider for tests and offline demos

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::provider::LlmProvider;
use super::types::{MessageRequest, MessageResponse};
use crate::core::{AgentError, AgentResult};

/// A provider that replays queued responses in order
///
/// Every request is recorded so callers can inspect what the loop sent.
/// Once the queue is empty every call fails with `ModelRequestFailure`.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<AgentResult<MessageResponse>>>,
    requests: Mutex<Vec<MessageRequest>>,
}

impl ScriptedProvider {
    /// Create a provider with a sequence of responses
    pub fn new(responses: Vec<MessageResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another response
    pub fn push_response(&self, response: MessageResponse) {
        self.lock_responses().push_back(Ok(response));
    }

    /// Queue a failure
    pub fn push_error(&self, error: AgentError) {
        self.lock_responses().push_back(Err(error));
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<MessageRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<AgentResult<MessageResponse>>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn send(&self, request: &MessageRequest) -> AgentResult<MessageResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        self.lock_responses().pop_front().unwrap_or_else(|| {
            Err(AgentError::ModelRequestFailure(
                "no scripted response left".to_string(),
            ))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
