//! Tool system for the agent
//!
//! This module provides the Tool trait, the ToolRegistry, and the built-in
//! tools. Adding a tool means implementing `Tool` and registering it; the
//! agent loop does not change.

pub mod bash;
pub mod browser;
pub mod computer;
pub mod docker;
pub mod file_edit;
mod registry;
pub mod search;
mod tool;

use std::sync::Arc;

pub use bash::BashTool;
pub use browser::BrowserTool;
pub use computer::ComputerTool;
pub use docker::DockerTool;
pub use file_edit::FileEditTool;
pub use registry::ToolRegistry;
pub use search::SearchTool;
pub use tool::{Tool, ToolResult, ToolResultData};

use crate::config::AgentConfig;

/// The built-in tools in their advertised order
pub fn default_tools(config: &AgentConfig) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
    let browser = Arc::new(BrowserTool::new(config.webdriver_url.clone())?);
    Ok(default_tools_with_browser(config, browser))
}

/// Same as [`default_tools`], sharing a browser the caller keeps to close
/// its WebDriver session
pub fn default_tools_with_browser(
    config: &AgentConfig,
    browser: Arc<BrowserTool>,
) -> Vec<Arc<dyn Tool>> {
    let dir = &config.working_dir;
    vec![
        Arc::new(BashTool::with_working_dir(dir.to_string_lossy().to_string())) as Arc<dyn Tool>,
        Arc::new(FileEditTool::with_base_dir(dir.clone())),
        Arc::new(ComputerTool::new(dir.clone())),
        browser,
        Arc::new(SearchTool::with_base_dir(dir.clone())),
        Arc::new(DockerTool::new(config.docker_path.clone())),
    ]
}

/// Registry holding the built-in tools
pub fn default_registry(config: &AgentConfig) -> anyhow::Result<ToolRegistry> {
    Ok(ToolRegistry::new(default_tools(config)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry(&AgentConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec!["bash", "file_edit", "computer", "browser", "search", "docker"]
        );
        for schema in registry.schemas() {
            assert_eq!(schema.input_schema.schema_type, "object");
            assert!(!schema.description.is_empty());
        }
    }
}
