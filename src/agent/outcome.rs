//! Run outcome, termination reason and statistics

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::conversation::ConversationState;
use crate::core::AgentError;
use crate::llm::Usage;

/// Why a run stopped
#[derive(Debug)]
pub enum TerminationReason {
    /// The model answered without requesting tools
    Done,
    /// The turn budget ran out
    MaxTurns,
    /// The run was cancelled; the interrupted turn was not appended
    Cancelled,
    /// A loop-level failure ended the run
    Error(AgentError),
}

impl TerminationReason {
    pub fn is_done(&self) -> bool {
        matches!(self, TerminationReason::Done)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TerminationReason::Error(_))
    }

    /// The error that ended the run, if any
    pub fn error(&self) -> Option<&AgentError> {
        match self {
            TerminationReason::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Done => write!(f, "done"),
            TerminationReason::MaxTurns => write!(f, "turn limit reached"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
            TerminationReason::Error(err) => write!(f, "error: {}", err),
        }
    }
}

/// Per-tool counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolUsage {
    pub calls: u32,
    pub successes: u32,
    pub failures: u32,
    pub total_duration: Duration,
}

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub turns: usize,
    pub model_requests: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model_time: Duration,
    pub tools: BTreeMap<String, ToolUsage>,
}

impl RunStats {
    pub(crate) fn record_model_call(&mut self, usage: &Usage, elapsed: Duration) {
        self.model_requests += 1;
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.model_time += elapsed;
    }

    pub(crate) fn record_tool_call(&mut self, tool: &str, success: bool, elapsed: Duration) {
        let usage = self.tools.entry(tool.to_string()).or_default();
        usage.calls += 1;
        if success {
            usage.successes += 1;
        } else {
            usage.failures += 1;
        }
        usage.total_duration += elapsed;
    }

    /// Total tool calls across all tools
    pub fn tool_calls(&self) -> u32 {
        self.tools.values().map(|usage| usage.calls).sum()
    }

    /// Total failed tool calls across all tools
    pub fn tool_failures(&self) -> u32 {
        self.tools.values().map(|usage| usage.failures).sum()
    }
}

/// Final state of a run
#[derive(Debug)]
pub struct RunOutcome {
    pub state: ConversationState,
    pub reason: TerminationReason,
    pub stats: RunStats,
}

impl RunOutcome {
    /// Whether the model finished but some tools failed along the way
    pub fn had_tool_failures(&self) -> bool {
        self.stats.tool_failures() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tool_calls() {
        let mut stats = RunStats::default();
        stats.record_tool_call("bash", true, Duration::from_millis(10));
        stats.record_tool_call("bash", false, Duration::from_millis(5));
        stats.record_tool_call("search", true, Duration::from_millis(1));

        let bash = &stats.tools["bash"];
        assert_eq!(bash.calls, 2);
        assert_eq!(bash.successes, 1);
        assert_eq!(bash.failures, 1);
        assert_eq!(bash.total_duration, Duration::from_millis(15));
        assert_eq!(stats.tool_calls(), 3);
        assert_eq!(stats.tool_failures(), 1);
        assert_eq!(
            stats.tools.keys().collect::<Vec<_>>(),
            vec!["bash", "search"]
        );
    }

    #[test]
    fn test_record_model_call() {
        let mut stats = RunStats::default();
        let usage = Usage {
            input_tokens: 100,
            output_tokens: 20,
        };
        stats.record_model_call(&usage, Duration::from_millis(300));
        stats.record_model_call(&usage, Duration::from_millis(200));
        assert_eq!(stats.model_requests, 2);
        assert_eq!(stats.input_tokens, 200);
        assert_eq!(stats.output_tokens, 40);
        assert_eq!(stats.model_time, Duration::from_millis(500));
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(TerminationReason::Done.to_string(), "done");
        let reason = TerminationReason::Error(AgentError::ModelRequestFailure("boom".into()));
        assert!(reason.is_error());
        assert_eq!(reason.to_string(), "error: Model request failed: boom");
    }
}
