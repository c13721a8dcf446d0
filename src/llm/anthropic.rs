//! Anthropic Messages API client
//!
//! ```ignore
//! let llm = AnthropicProvider::new(api_key)?.with_base_url("https://api.anthropic.com");
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::provider::LlmProvider;
use super::types::{ContentBlock, MessageRequest, MessageResponse, ToolDefinition};
use crate::core::{AgentError, AgentResult};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Request timeout (10 minutes)
const REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a [ContentBlock],
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a MessageRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.wire_name(),
                    content: &m.content,
                })
                .collect(),
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
        }
    }
}

/// Client for the Anthropic Messages API
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a provider with the given API key
    pub fn new(api_key: impl Into<String>) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn send(&self, request: &MessageRequest) -> AgentResult<MessageResponse> {
        let body = WireRequest::from_request(request);
        tracing::debug!(
            "Sending {} messages and {} tools to {}",
            body.messages.len(),
            request.tools.len(),
            request.model
        );

        let mut builder = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        if let Some(beta) = &request.beta {
            builder = builder.header("anthropic-beta", beta);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Anthropic API returned {}: {}", status, error_text);
            return Err(AgentError::ModelRequestFailure(format!(
                "{} - {}",
                status, error_text
            )));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            AgentError::ModelRequestFailure(format!("Invalid response body: {}", e))
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;
    use serde_json::json;

    fn request(messages: Vec<Message>) -> MessageRequest {
        MessageRequest {
            model: "claude-3-5-sonnet-20241022".into(),
            max_tokens: 1024,
            system: None,
            messages,
            tools: vec![],
            beta: Some("computer-use-2024-10-22".into()),
        }
    }

    #[test]
    fn test_tool_result_messages_use_user_role() {
        let req = request(vec![
            Message::user("hi"),
            Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "t1".into(),
                content: vec![ContentBlock::text("ok")],
                is_error: false,
            }]),
        ]);
        let value = serde_json::to_value(WireRequest::from_request(&req)).unwrap();
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("tools").is_none());
        assert!(value.get("system").is_none());
    }

    #[tokio::test]
    async fn test_http_error_is_model_request_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("anthropic-beta", "computer-use-2024-10-22")
            .with_status(401)
            .with_body(r#"{"error":{"type":"authentication_error"}}"#)
            .create_async()
            .await;

        let provider = AnthropicProvider::new("bad-key")
            .unwrap()
            .with_base_url(server.url());
        let err = provider.send(&request(vec![Message::user("hi")])).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AgentError::ModelRequestFailure(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("authentication_error"));
    }

    #[tokio::test]
    async fn test_successful_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "key")
            .with_status(200)
            .with_body(
                json!({
                    "id": "msg_1",
                    "content": [{"type": "text", "text": "hello"}],
                    "stop_reason": "end_turn",
                    "usage": {"input_tokens": 3, "output_tokens": 1}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = AnthropicProvider::new("key").unwrap().with_base_url(server.url());
        let response = provider.send(&request(vec![Message::user("hi")])).await.unwrap();
        assert_eq!(response.into_message().text(), "hello");
    }
}
