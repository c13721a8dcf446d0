//! Agent loop with tool calling support
//!
//! A run takes one user message through repeated model calls:
//! - the model answers, possibly requesting tools
//! - every requested tool is executed and answered, in request order
//! - the answers are sent back, until the model stops asking for tools
//!
//! A turn (assistant message plus its tool results) is appended to the
//! conversation only once all of its results are in, so a cancelled run never
//! leaves an unanswered `tool_use` behind.

use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::outcome::{RunOutcome, RunStats, TerminationReason};
use super::system_prompt::default_system_prompt;
use crate::config::{AgentConfig, DEFAULT_MODEL};
use crate::conversation::{ContentBlock, ConversationState, Message};
use crate::core::{AgentError, AgentResult};
use crate::llm::{LlmProvider, MessageRequest, MessageResponse};
use crate::session::SessionRecorder;
use crate::tools::{ToolRegistry, ToolResult};

/// Request and execution settings for the loop
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    /// Capability flag forwarded to the provider
    pub beta: Option<String>,
    /// Upper bound for a single tool call
    pub tool_timeout: Duration,
    /// Run the tools of one turn concurrently
    pub parallel_tools: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            system_prompt: Some(default_system_prompt().to_string()),
            beta: None,
            tool_timeout: Duration::from_secs(120),
            parallel_tools: true,
        }
    }
}

impl LoopOptions {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            beta: config.beta_flag.clone(),
            tool_timeout: config.tool_timeout,
            parallel_tools: config.parallel_tools,
            ..Self::default()
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }
}

/// Progress notifications emitted during a run
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// A model request is about to be sent
    ModelRequest { turn: usize },
    /// The model answered (not yet committed to the conversation)
    AssistantMessage(Message),
    ToolCallStart {
        id: String,
        name: String,
        input: Value,
    },
    ToolCallEnd {
        id: String,
        name: String,
        success: bool,
        duration: Duration,
        /// Text parts of the result
        output: String,
    },
    /// A turn and its tool results were appended
    TurnComplete { turn: usize },
}

/// Callback receiving loop events
pub type OnEvent = Box<dyn Fn(&LoopEvent) + Send + Sync>;

#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    ModelResponded(MessageResponse),
    HasToolUse(Message),
    ExecutingTools(Message),
    NoToolUse(Message),
    Done,
    DoneError(AgentError),
    DoneMaxTurns,
    Cancelled,
}

impl LoopState {
    fn name(&self) -> &'static str {
        match self {
            LoopState::AwaitingModel => "awaiting_model",
            LoopState::ModelResponded(_) => "model_responded",
            LoopState::HasToolUse(_) => "has_tool_use",
            LoopState::ExecutingTools(_) => "executing_tools",
            LoopState::NoToolUse(_) => "no_tool_use",
            LoopState::Done => "done",
            LoopState::DoneError(_) => "done_error",
            LoopState::DoneMaxTurns => "done_max_turns",
            LoopState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCall {
    id: String,
    name: String,
    input: Value,
}

type CallOutput = (ToolResult, Duration);

/// Drives the request/execute/respond cycle
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    options: LoopOptions,
    recorder: Option<SessionRecorder>,
    cancel: Option<CancellationToken>,
    on_event: Option<OnEvent>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn LlmProvider>, registry: ToolRegistry, options: LoopOptions) -> Self {
        tracing::info!(
            "Creating agent loop: provider={}, model={}, tools={:?}",
            provider.name(),
            options.model,
            registry.names()
        );
        Self {
            provider,
            registry: Arc::new(registry),
            options,
            recorder: None,
            cancel: None,
            on_event: None,
        }
    }

    /// Record tool outputs and history into a session directory
    pub fn with_recorder(mut self, recorder: SessionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Stop runs when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LoopEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(Box::new(handler));
        self
    }

    pub fn options(&self) -> &LoopOptions {
        &self.options
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn recorder(&self) -> Option<&SessionRecorder> {
        self.recorder.as_ref()
    }

    /// Run one user message to a terminal state
    ///
    /// `state` is owned by the run and handed back in the outcome, including
    /// every turn completed before an error, the turn limit, or cancellation.
    pub async fn run(
        &self,
        user_text: &str,
        mut state: ConversationState,
        max_turns: usize,
    ) -> RunOutcome {
        tracing::info!(
            "Starting run: history={} messages, max_turns={}",
            state.len(),
            max_turns
        );

        state.append(Message::user(user_text));

        let mut stats = RunStats::default();
        let mut turns = 0usize;
        let mut current = LoopState::AwaitingModel;

        let reason = loop {
            tracing::debug!("Loop state: {}", current.name());

            current = match current {
                LoopState::AwaitingModel => {
                    if turns >= max_turns {
                        LoopState::DoneMaxTurns
                    } else {
                        match self.request_model(&state, turns, &mut stats).await {
                            None => LoopState::Cancelled,
                            Some(Ok(response)) => LoopState::ModelResponded(response),
                            Some(Err(err)) => LoopState::DoneError(err),
                        }
                    }
                }
                LoopState::ModelResponded(response) => match validate_response(&response) {
                    Err(err) => LoopState::DoneError(err),
                    Ok(()) => {
                        let message = response.into_message();
                        self.emit(|| LoopEvent::AssistantMessage(message.clone()));
                        if message.has_tool_use() {
                            LoopState::HasToolUse(message)
                        } else {
                            LoopState::NoToolUse(message)
                        }
                    }
                },
                LoopState::NoToolUse(message) => {
                    state.append(message);
                    LoopState::Done
                }
                LoopState::HasToolUse(message) => {
                    tracing::info!("Model requested {} tool call(s)", message.tool_uses().len());
                    LoopState::ExecutingTools(message)
                }
                LoopState::ExecutingTools(message) => {
                    let calls = pending_calls(&message);
                    match self.execute_tools(calls, &mut stats).await {
                        None => LoopState::Cancelled,
                        Some(results) => {
                            state.append(message);
                            state.append(Message::tool_results(results));
                            turns += 1;
                            self.emit(|| LoopEvent::TurnComplete { turn: turns });
                            LoopState::AwaitingModel
                        }
                    }
                }
                LoopState::Done => break TerminationReason::Done,
                LoopState::DoneMaxTurns => {
                    tracing::warn!("Turn limit of {} reached", max_turns);
                    break TerminationReason::MaxTurns;
                }
                LoopState::DoneError(err) => {
                    tracing::error!("Run aborted: {}", err);
                    break TerminationReason::Error(err);
                }
                LoopState::Cancelled => {
                    tracing::warn!("Run cancelled after {} turn(s)", turns);
                    break TerminationReason::Cancelled;
                }
            };
        };

        stats.turns = turns;
        tracing::info!(
            "Run finished: {} (turns={}, model_requests={}, tool_calls={}, tokens in/out={}/{})",
            reason,
            turns,
            stats.model_requests,
            stats.tool_calls(),
            stats.input_tokens,
            stats.output_tokens
        );

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.save_history(&state) {
                tracing::warn!("Failed to save history: {}", e);
            }
        }

        RunOutcome {
            state,
            reason,
            stats,
        }
    }

    /// Send the conversation to the model; `None` if cancelled while waiting
    async fn request_model(
        &self,
        state: &ConversationState,
        turn: usize,
        stats: &mut RunStats,
    ) -> Option<AgentResult<MessageResponse>> {
        let request = MessageRequest {
            model: self.options.model.clone(),
            max_tokens: self.options.max_tokens,
            system: self.options.system_prompt.clone(),
            messages: state.snapshot(),
            tools: self.registry.schemas(),
            beta: self.options.beta.clone(),
        };

        tracing::info!(
            "Sending request to {}: {} messages, {} tools",
            self.provider.name(),
            request.messages.len(),
            request.tools.len()
        );
        self.emit(|| LoopEvent::ModelRequest { turn });

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.cancelled() => return None,
            result = self.provider.send(&request) => result,
        };

        if let Ok(response) = &result {
            stats.record_model_call(&response.usage, started.elapsed());
            tracing::debug!(
                "Response: {} blocks, stop_reason={:?}, usage={:?}",
                response.content.len(),
                response.stop_reason,
                response.usage
            );
        }
        Some(result)
    }

    /// Execute every call and return one `tool_result` block per call, in
    /// call order; `None` if cancelled before all results were collected
    async fn execute_tools(
        &self,
        calls: Vec<PendingCall>,
        stats: &mut RunStats,
    ) -> Option<Vec<ContentBlock>> {
        let mut started = Vec::with_capacity(calls.len());

        let joined: Vec<Result<CallOutput, JoinError>> = if self.options.parallel_tools {
            let handles: Vec<_> = calls
                .iter()
                .map(|call| {
                    let (handle, at) = self.spawn_call(call);
                    started.push(at);
                    handle
                })
                .collect();
            let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
            tokio::select! {
                biased;
                _ = self.cancelled() => {
                    aborts.iter().for_each(|handle| handle.abort());
                    return None;
                }
                joined = join_all(handles) => joined,
            }
        } else {
            let mut joined = Vec::with_capacity(calls.len());
            for call in &calls {
                let (handle, at) = self.spawn_call(call);
                started.push(at);
                let abort = handle.abort_handle();
                tokio::select! {
                    biased;
                    _ = self.cancelled() => {
                        abort.abort();
                        return None;
                    }
                    output = handle => joined.push(output),
                }
            }
            joined
        };

        let mut results = Vec::with_capacity(calls.len());
        for ((call, output), at) in calls.into_iter().zip(joined).zip(started) {
            let (result, elapsed) = match output {
                Ok(output) => output,
                Err(err) => (join_failure(&call.name, err), at.elapsed()),
            };

            if result.is_error {
                tracing::warn!(
                    tool = %call.name,
                    id = %call.id,
                    error = %result.error.as_deref().unwrap_or(""),
                    "Tool execution failed"
                );
            } else {
                tracing::info!(tool = %call.name, id = %call.id, "Tool execution succeeded");
            }

            stats.record_tool_call(&call.name, !result.is_error, elapsed);

            if let Some(recorder) = &self.recorder {
                if let Err(e) =
                    recorder.record_tool_output(&call.name, &call.id, &call.input, &result, elapsed)
                {
                    tracing::warn!("Failed to record output of {}: {}", call.name, e);
                }
            }

            self.emit(|| LoopEvent::ToolCallEnd {
                id: call.id.clone(),
                name: call.name.clone(),
                success: !result.is_error,
                duration: elapsed,
                output: result.text(),
            });

            results.push(result.into_block(call.id));
        }

        Some(results)
    }

    /// Run one call on its own task; a panic is caught inside the task so
    /// the call keeps its own duration
    fn spawn_call(&self, call: &PendingCall) -> (JoinHandle<CallOutput>, Instant) {
        tracing::info!(tool = %call.name, id = %call.id, "Executing tool");
        self.emit(|| LoopEvent::ToolCallStart {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        });

        let registry = Arc::clone(&self.registry);
        let name = call.name.clone();
        let input = call.input.clone();
        let timeout = self.options.tool_timeout;

        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let execution = tokio::time::timeout(timeout, registry.execute(&name, &input));
            let result = match AssertUnwindSafe(execution).catch_unwind().await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => failure_result(&name, format!("timed out after {:?}", timeout)),
                Err(payload) => failure_result(&name, panic_message(payload)),
            };
            (result, started.elapsed())
        });
        (handle, started)
    }

    async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    }

    fn emit(&self, event: impl FnOnce() -> LoopEvent) {
        if let Some(handler) = &self.on_event {
            handler(&event());
        }
    }
}

fn pending_calls(message: &Message) -> Vec<PendingCall> {
    message
        .tool_uses()
        .into_iter()
        .map(|tool_use| PendingCall {
            id: tool_use.id.to_string(),
            name: tool_use.name.to_string(),
            input: tool_use.input.clone(),
        })
        .collect()
}

/// Reject responses the tool-use protocol cannot answer
fn validate_response(response: &MessageResponse) -> AgentResult<()> {
    if response.content.is_empty() {
        return Err(AgentError::ProtocolViolation(
            "model returned an empty response".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for block in &response.content {
        match block {
            ContentBlock::ToolUse { id, name, .. } => {
                if id.is_empty() {
                    return Err(AgentError::ProtocolViolation(format!(
                        "tool_use for '{}' has no id",
                        name
                    )));
                }
                if name.is_empty() {
                    return Err(AgentError::ProtocolViolation(format!(
                        "tool_use {} has no tool name",
                        id
                    )));
                }
                if !seen.insert(id.as_str()) {
                    return Err(AgentError::ProtocolViolation(format!(
                        "duplicate tool_use id {}",
                        id
                    )));
                }
            }
            ContentBlock::ToolResult { tool_use_id, .. } => {
                return Err(AgentError::ProtocolViolation(format!(
                    "assistant response contains a tool_result for {}",
                    tool_use_id
                )));
            }
            ContentBlock::Text { .. } | ContentBlock::Image { .. } => {}
        }
    }
    Ok(())
}

/// Failed result for a call that panicked or whose task was aborted
fn join_failure(tool: &str, err: JoinError) -> ToolResult {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "task was cancelled".to_string()
    };
    failure_result(tool, message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {}", text)
    } else {
        "panicked".to_string()
    }
}

fn failure_result(tool: &str, message: String) -> ToolResult {
    let err = AgentError::ToolExecutionFailure {
        tool: tool.to_string(),
        message,
    };
    tracing::error!("{}", err);
    ToolResult::error(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(blocks: Vec<ContentBlock>) -> MessageResponse {
        MessageResponse::from_blocks(blocks)
    }

    #[test]
    fn test_validate_accepts_text_and_tool_use() {
        let resp = response(vec![
            ContentBlock::text("Let me look"),
            ContentBlock::tool_use("t1", "bash", json!({"command": "ls"})),
            ContentBlock::tool_use("t2", "bash", json!({"command": "pwd"})),
        ]);
        assert!(validate_response(&resp).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let resp = response(vec![
            ContentBlock::tool_use("t1", "bash", json!({})),
            ContentBlock::tool_use("t1", "search", json!({})),
        ]);
        let err = validate_response(&resp).unwrap_err();
        assert!(matches!(err, AgentError::ProtocolViolation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let no_id = response(vec![ContentBlock::tool_use("", "bash", json!({}))]);
        assert!(validate_response(&no_id).is_err());

        let no_name = response(vec![ContentBlock::tool_use("t1", "", json!({}))]);
        assert!(validate_response(&no_name).is_err());

        assert!(validate_response(&response(vec![])).is_err());
    }

    #[test]
    fn test_validate_rejects_tool_result_from_model() {
        let resp = response(vec![ToolResult::success("forged").into_block("t9")]);
        let err = validate_response(&resp).unwrap_err();
        assert!(err.to_string().contains("t9"));
    }

    #[test]
    fn test_pending_calls_keep_order() {
        let message = Message::assistant_with_blocks(vec![
            ContentBlock::tool_use("b", "search", json!({"pattern": "x"})),
            ContentBlock::text("and"),
            ContentBlock::tool_use("a", "bash", json!({"command": "ls"})),
        ]);
        let ids: Vec<_> = pending_calls(&message).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_panic_message_from_string_payload() {
        let payload: Box<dyn Any + Send> = Box::new(format!("index {} out of range", 7));
        assert_eq!(panic_message(payload), "panicked: index 7 out of range");
    }

    #[tokio::test]
    async fn test_join_failure_reports_panic_message() {
        let err = tokio::spawn(async { panic!("kaboom") }).await.unwrap_err();
        let result = join_failure("broken", err);
        assert!(result.is_error);
        assert_eq!(
            result.error.as_deref(),
            Some("Tool 'broken' failed: panicked: kaboom")
        );
    }

    #[test]
    fn test_options_from_config() {
        let config = AgentConfig::default()
            .with_model("claude-test")
            .with_tool_timeout(Duration::from_secs(3));
        let options = LoopOptions::from_config(&config);
        assert_eq!(options.model, "claude-test");
        assert_eq!(options.tool_timeout, Duration::from_secs(3));
        assert_eq!(options.beta, config.beta_flag);
        assert!(options.system_prompt.is_some());
    }
}
