//! Tool registry
//!
//! A fixed, ordered set of tools. Lookup is by name; schemas are advertised in
//! registration order so identical registries produce identical requests.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::tool::{Tool, ToolResult};
use crate::core::{AgentError, AgentResult};
use crate::llm::ToolDefinition;

/// Read-only mapping from tool name to tool
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry, rejecting duplicate names
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> AgentResult<Self> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            let name = tool.name().to_string();
            if index.insert(name.clone(), position).is_some() {
                return Err(AgentError::DuplicateTool(name));
            }
        }

        tracing::info!("Tool registry initialized with {} tools", tools.len());
        Ok(Self { tools, index })
    }

    /// Find a tool by name
    pub fn lookup(&self, name: &str) -> AgentResult<Arc<dyn Tool>> {
        self.index
            .get(name)
            .map(|&position| Arc::clone(&self.tools[position]))
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// Tool descriptors in registration order
    pub fn schemas(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up and run a tool, converting every failure into a failed result
    pub async fn execute(&self, name: &str, input: &Value) -> ToolResult {
        let tool = match self.lookup(name) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::warn!("{}", e);
                return ToolResult::error(e.to_string());
            }
        };

        match tool.execute(input).await {
            Ok(result) => result,
            Err(e) => {
                let err = AgentError::ToolExecutionFailure {
                    tool: name.to_string(),
                    message: format!("{:#}", e),
                };
                tracing::warn!("{}", err);
                ToolResult::error(err.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolInputSchema;
    use async_trait::async_trait;
    use serde_json::json;

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn input_schema(&self) -> ToolInputSchema {
            ToolInputSchema::object(json!({}), &[])
        }

        async fn execute(&self, input: &Value) -> anyhow::Result<ToolResult> {
            if input.get("fail").is_some() {
                anyhow::bail!("bad input");
            }
            Ok(ToolResult::success(self.0))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(vec![
            Arc::new(NamedTool("zeta")) as Arc<dyn Tool>,
            Arc::new(NamedTool("alpha")),
            Arc::new(NamedTool("mid")),
        ])
        .unwrap()
    }

    #[test]
    fn test_schemas_follow_registration_order() {
        let names: Vec<String> = registry().schemas().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ToolRegistry::new(vec![Arc::new(NamedTool("a")) as Arc<dyn Tool>, Arc::new(NamedTool("a"))])
            .unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "a"));
    }

    #[test]
    fn test_lookup_miss_is_unknown_tool() {
        let err = registry().lookup("nope").err().unwrap();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool_is_failed_result() {
        let result = registry().execute("nope", &json!({})).await;
        assert!(result.is_error);
        assert!(result.text().contains("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_execute_error_is_failed_result() {
        let result = registry().execute("alpha", &json!({"fail": true})).await;
        assert!(result.is_error);
        assert!(result.text().contains("bad input"));
    }

    #[tokio::test]
    async fn test_execute_success() {
        let result = registry().execute("mid", &json!({})).await;
        assert!(!result.is_error);
        assert_eq!(result.text(), "mid");
    }
}
