pub mod agent_loop;
pub mod outcome;
pub mod system_prompt;

pub use agent_loop::{AgentLoop, LoopEvent, LoopOptions, OnEvent};
pub use outcome::{RunOutcome, RunStats, TerminationReason, ToolUsage};
pub use system_prompt::{default_system_prompt, SYSTEM_PROMPT};
