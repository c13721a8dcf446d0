//! Browser tool speaking the W3C WebDriver protocol
//!
//! Talks to a running driver (chromedriver, geckodriver, selenium) over HTTP.
//! A headless session is created on first use and reused afterwards.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;

use super::tool::{Tool, ToolResult};
use crate::llm::ToolInputSchema;

/// Default chromedriver endpoint
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
/// Key of element references in WebDriver responses
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const PAGE_LOAD_TIMEOUT_MS: u64 = 30_000;
const IMPLICIT_WAIT_MS: u64 = 10_000;
const HTTP_TIMEOUT_SECS: u64 = 60;
/// Maximum extracted text length in characters
const MAX_EXTRACT_LENGTH: usize = 20_000;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum BrowserCommand {
    Navigate { url: String },
    Screenshot,
    Click { selector: String },
    Type { selector: String, text: String },
    Extract {
        #[serde(default)]
        selector: Option<String>,
    },
}

/// Browser automation tool
pub struct BrowserTool {
    client: reqwest::Client,
    endpoint: String,
    session_id: Mutex<Option<String>>,
}

impl BrowserTool {
    /// Create a tool talking to the driver at `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            session_id: Mutex::new(None),
        })
    }

    /// Send a WebDriver command and unwrap its `value`
    async fn call(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.endpoint, path);
        tracing::debug!("WebDriver {} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("WebDriver unreachable at {}", self.endpoint))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .context("Invalid WebDriver response")?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() {
            let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
            let message = value.get("message").and_then(Value::as_str).unwrap_or("");
            anyhow::bail!("WebDriver error ({}): {} {}", status, error, message);
        }

        Ok(value)
    }

    /// Return the current session, creating one if needed
    async fn session(&self) -> Result<String> {
        let mut guard = self.session_id.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }

        tracing::info!("Starting WebDriver session at {}", self.endpoint);
        let value = self
            .call(
                reqwest::Method::POST,
                "/session",
                Some(json!({
                    "capabilities": {
                        "alwaysMatch": {
                            "browserName": "chrome",
                            "goog:chromeOptions": {
                                "args": [
                                    "--headless",
                                    "--no-sandbox",
                                    "--disable-dev-shm-usage",
                                    "--disable-gpu",
                                    "--window-size=1280,1024"
                                ]
                            }
                        }
                    }
                })),
            )
            .await?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .context("WebDriver did not return a session id")?
            .to_string();

        self.call(
            reqwest::Method::POST,
            &format!("/session/{}/timeouts", id),
            Some(json!({ "pageLoad": PAGE_LOAD_TIMEOUT_MS, "implicit": IMPLICIT_WAIT_MS })),
        )
        .await?;

        tracing::info!("WebDriver session started: {}", id);
        *guard = Some(id.clone());
        Ok(id)
    }

    /// End the browser session, if one is open
    pub async fn close(&self) -> Result<()> {
        let id = self.session_id.lock().await.take();
        if let Some(id) = id {
            self.call(reqwest::Method::DELETE, &format!("/session/{}", id), None)
                .await?;
            tracing::info!("WebDriver session closed: {}", id);
        }
        Ok(())
    }

    async fn find_element(&self, session: &str, selector: &str) -> Result<String> {
        let value = self
            .call(
                reqwest::Method::POST,
                &format!("/session/{}/element", session),
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await
            .with_context(|| format!("Element not found: {}", selector))?;

        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(String::from)
            .with_context(|| format!("Malformed element reference for {}", selector))
    }

    async fn navigate(&self, url: &str) -> Result<ToolResult> {
        let session = self.session().await?;
        self.call(
            reqwest::Method::POST,
            &format!("/session/{}/url", session),
            Some(json!({ "url": url })),
        )
        .await?;

        let title = self
            .call(reqwest::Method::GET, &format!("/session/{}/title", session), None)
            .await?;
        let title = title.as_str().unwrap_or_default();
        Ok(ToolResult::success(format!("Navigated to {} (title: {})", url, title)))
    }

    async fn screenshot(&self) -> Result<ToolResult> {
        let session = self.session().await?;
        let value = self
            .call(
                reqwest::Method::GET,
                &format!("/session/{}/screenshot", session),
                None,
            )
            .await?;
        let encoded = value.as_str().context("Screenshot response is not a string")?;
        let data = STANDARD
            .decode(encoded)
            .context("Screenshot is not valid base64")?;
        Ok(ToolResult::image(data, "image/png").with_text("Browser screenshot"))
    }

    async fn click(&self, selector: &str) -> Result<ToolResult> {
        let session = self.session().await?;
        let element = self.find_element(&session, selector).await?;
        self.call(
            reqwest::Method::POST,
            &format!("/session/{}/element/{}/click", session, element),
            Some(json!({})),
        )
        .await?;
        Ok(ToolResult::success(format!("Clicked {}", selector)))
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<ToolResult> {
        let session = self.session().await?;
        let element = self.find_element(&session, selector).await?;
        self.call(
            reqwest::Method::POST,
            &format!("/session/{}/element/{}/value", session, element),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(ToolResult::success(format!("Typed {} characters into {}", text.chars().count(), selector)))
    }

    async fn extract(&self, selector: &str) -> Result<ToolResult> {
        let session = self.session().await?;
        let element = self.find_element(&session, selector).await?;
        let value = self
            .call(
                reqwest::Method::GET,
                &format!("/session/{}/element/{}/text", session, element),
                None,
            )
            .await?;
        let mut text = value.as_str().unwrap_or_default().to_string();
        if text.chars().count() > MAX_EXTRACT_LENGTH {
            text = text.chars().take(MAX_EXTRACT_LENGTH).collect();
            text.push_str("\n... (content truncated)");
        }
        Ok(ToolResult::success(text))
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        "browser"
    }

    fn description(&self) -> &str {
        "Control a headless web browser: navigate to URLs, take screenshots, click and type into elements, and extract element text. Elements are addressed by CSS selector."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::object(
            json!({
                "command": {
                    "type": "string",
                    "enum": ["navigate", "screenshot", "click", "type", "extract"],
                    "description": "The browser command to run"
                },
                "url": {
                    "type": "string",
                    "description": "URL for 'navigate'"
                },
                "selector": {
                    "type": "string",
                    "description": "CSS selector for 'click', 'type' and 'extract' (defaults to 'body' for extract)"
                },
                "text": {
                    "type": "string",
                    "description": "Text for 'type'"
                }
            }),
            &["command"],
        )
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let command: BrowserCommand = match serde_json::from_value(input.clone()) {
            Ok(command) => command,
            Err(e) => return Ok(ToolResult::error(format!("Invalid browser input: {}", e))),
        };

        let result = match &command {
            BrowserCommand::Navigate { url } => self.navigate(url).await,
            BrowserCommand::Screenshot => self.screenshot().await,
            BrowserCommand::Click { selector } => self.click(selector).await,
            BrowserCommand::Type { selector, text } => self.type_text(selector, text).await,
            BrowserCommand::Extract { selector } => {
                self.extract(selector.as_deref().unwrap_or("body")).await
            }
        };

        Ok(result.unwrap_or_else(|e| {
            tracing::warn!("Browser command {:?} failed: {:#}", command, e);
            ToolResult::error(format!("{:#}", e))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn server_with_session() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/session")
            .with_status(200)
            .with_body(r#"{"value":{"sessionId":"s1","capabilities":{}}}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/session/s1/timeouts")
            .with_status(200)
            .with_body(r#"{"value":null}"#)
            .create_async()
            .await;
        server
    }

    #[tokio::test]
    async fn test_navigate_then_screenshot_reuses_session() {
        let mut server = server_with_session().await;
        server
            .mock("POST", "/session/s1/url")
            .with_status(200)
            .with_body(r#"{"value":null}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/session/s1/title")
            .with_status(200)
            .with_body(r#"{"value":"Example Domain"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/session/s1/screenshot")
            .with_status(200)
            .with_body(r#"{"value":"iVBORw=="}"#)
            .create_async()
            .await;

        let tool = BrowserTool::new(server.url()).unwrap();
        let result = tool
            .execute(&json!({ "command": "navigate", "url": "https://example.com" }))
            .await
            .unwrap();
        assert!(!result.is_error, "{}", result.text());
        assert!(result.text().contains("Example Domain"));

        let result = tool.execute(&json!({ "command": "screenshot" })).await.unwrap();
        assert!(!result.is_error, "{}", result.text());
        assert_eq!(result.first_image().unwrap().0, &[0x89, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn test_missing_element_is_failed_result() {
        let mut server = server_with_session().await;
        server
            .mock("POST", "/session/s1/element")
            .with_status(404)
            .with_body(r#"{"value":{"error":"no such element","message":"Unable to locate"}}"#)
            .create_async()
            .await;

        let tool = BrowserTool::new(server.url()).unwrap();
        let result = tool
            .execute(&json!({ "command": "click", "selector": "#missing" }))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("Element not found: #missing"));
        assert!(result.text().contains("no such element"));
    }

    #[tokio::test]
    async fn test_unreachable_driver_is_failed_result() {
        let tool = BrowserTool::new("http://127.0.0.1:1").unwrap();
        let result = tool
            .execute(&json!({ "command": "navigate", "url": "https://example.com" }))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("WebDriver unreachable"));
    }

    #[tokio::test]
    async fn test_type_requires_text() {
        let tool = BrowserTool::new(DEFAULT_WEBDRIVER_URL).unwrap();
        let result = tool
            .execute(&json!({ "command": "type", "selector": "input" }))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("Invalid browser input"));
    }
}
