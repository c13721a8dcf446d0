//! Agent configuration
//!
//! Values come from environment variables, with builder overrides:
//! - `ANTHROPIC_API_KEY` - required by the console binary.
//! - `ANTHROPIC_BASE_URL` - API base URL. Defaults to `https://api.anthropic.com`.
//! - `AGENT_MODEL` - model identifier. Defaults to `claude-3-5-sonnet-20241022`.
//! - `AGENT_BETA_FLAG` - capability flag. Defaults to `computer-use-2024-10-22`; empty disables it.
//! - `AGENT_MAX_TOKENS` - response token limit. Defaults to `4096`.
//! - `AGENT_MAX_TURNS` - tool turns per run. Defaults to `20`.
//! - `AGENT_TOOL_TIMEOUT_SECS` - per tool call timeout. Defaults to `120`.
//! - `AGENT_PARALLEL_TOOLS` - run the tools of one turn concurrently. Defaults to `true`.
//! - `AGENT_WORKING_DIR` - directory tools operate in. Defaults to the current directory.
//! - `AGENT_SESSION_DIR` - where session recordings go. Unset disables recording.
//! - `AGENT_LOG_DIR` - log directory. Defaults to `logs`.
//! - `WEBDRIVER_URL` - WebDriver endpoint for the browser tool. Defaults to `http://localhost:9515`.
//! - `DOCKER_PATH` - docker executable. Defaults to `docker`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::tools::browser::DEFAULT_WEBDRIVER_URL;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_BETA_FLAG: &str = "computer-use-2024-10-22";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Runtime configuration for the agent and its tools
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Anthropic API key
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Capability flag sent with every request
    pub beta_flag: Option<String>,
    /// Response token limit
    pub max_tokens: u32,
    /// Tool turns allowed per run
    pub max_turns: usize,
    /// Timeout for a single tool call
    pub tool_timeout: Duration,
    /// Run the tools of one turn concurrently
    pub parallel_tools: bool,
    /// Directory tools operate in
    pub working_dir: PathBuf,
    /// Root for session recordings
    pub session_dir: Option<PathBuf>,
    /// Log directory
    pub log_dir: PathBuf,
    /// WebDriver endpoint
    pub webdriver_url: String,
    /// docker executable
    pub docker_path: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            beta_flag: Some(DEFAULT_BETA_FLAG.to_string()),
            max_tokens: 4096,
            max_turns: 20,
            tool_timeout: Duration::from_secs(120),
            parallel_tools: true,
            working_dir: PathBuf::from("."),
            session_dir: None,
            log_dir: PathBuf::from("logs"),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            docker_path: "docker".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_key = lookup("ANTHROPIC_API_KEY").filter(|k| !k.is_empty());
        if let Some(url) = lookup("ANTHROPIC_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = lookup("AGENT_MODEL") {
            config.model = model;
        }
        if let Some(flag) = lookup("AGENT_BETA_FLAG") {
            config.beta_flag = (!flag.trim().is_empty()).then_some(flag);
        }
        if let Some(v) = parse_var(&lookup, "AGENT_MAX_TOKENS")? {
            config.max_tokens = v;
        }
        if let Some(v) = parse_var(&lookup, "AGENT_MAX_TURNS")? {
            config.max_turns = v;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AGENT_TOOL_TIMEOUT_SECS")? {
            config.tool_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = parse_var(&lookup, "AGENT_PARALLEL_TOOLS")? {
            config.parallel_tools = v;
        }
        if let Some(dir) = lookup("AGENT_WORKING_DIR") {
            config.working_dir = PathBuf::from(dir);
        }
        config.session_dir = lookup("AGENT_SESSION_DIR").map(PathBuf::from);
        if let Some(dir) = lookup("AGENT_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("WEBDRIVER_URL") {
            config.webdriver_url = url;
        }
        if let Some(path) = lookup("DOCKER_PATH") {
            config.docker_path = path;
        }

        Ok(config)
    }

    /// The API key, or an error naming the variable
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.beta_flag.as_deref(), Some(DEFAULT_BETA_FLAG));
        assert_eq!(config.max_turns, 20);
        assert!(config.parallel_tools);
        assert!(config.session_dir.is_none());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("AGENT_MAX_TURNS", "3"),
            ("AGENT_TOOL_TIMEOUT_SECS", "5"),
            ("AGENT_PARALLEL_TOOLS", "false"),
            ("AGENT_BETA_FLAG", ""),
        ]))
        .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.tool_timeout, Duration::from_secs(5));
        assert!(!config.parallel_tools);
        assert!(config.beta_flag.is_none());
    }

    #[test]
    fn test_invalid_number() {
        let err = AgentConfig::from_lookup(lookup(&[("AGENT_MAX_TURNS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "AGENT_MAX_TURNS"));
    }
}
