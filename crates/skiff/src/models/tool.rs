use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AgentError, AgentResult};

/// A tool that can be called by a model, as advertised in the rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema of the parameters the tool accepts
    pub parameters: Value,
}

impl Tool {
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

type ToolHandler =
    Box<dyn Fn(Map<String, Value>) -> BoxFuture<'static, AgentResult<String>> + Send + Sync>;

/// A tool descriptor paired with the async function that backs it.
pub struct RegisteredTool {
    pub tool: Tool,
    handler: ToolHandler,
}

impl RegisteredTool {
    pub fn new<F, Fut>(tool: Tool, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AgentResult<String>> + Send + 'static,
    {
        RegisteredTool {
            tool,
            handler: Box::new(move |arguments| Box::pin(handler(arguments))),
        }
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }

    /// Invoke the backing function with the arguments demanded by the model
    pub async fn call(&self, arguments: Map<String, Value>) -> AgentResult<String> {
        (self.handler)(arguments).await
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

/// The set of tools one agent exposes to its model. Names are unique and the
/// registration order is the order tools appear in the rendered prompt.
/// Read-only once the agent is constructed.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, rejecting duplicate names
    pub fn register(&mut self, tool: RegisteredTool) -> AgentResult<()> {
        if self.tools.iter().any(|t| t.name() == tool.name()) {
            return Err(AgentError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// The advertised specs, in registration order
    pub fn specs(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.tool.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool() -> RegisteredTool {
        RegisteredTool::new(
            Tool::new(
                "echo",
                "Echoes back the input",
                json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                }),
            ),
            |arguments| async move {
                Ok(arguments
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string())
            },
        )
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();

        let mut arguments = Map::new();
        arguments.insert("message".to_string(), json!("hi"));
        let result = registry.get("echo").unwrap().call(arguments).await.unwrap();
        assert_eq!(result, "hi");
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        let err = registry.register(echo_tool()).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_specs_preserve_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        registry
            .register(RegisteredTool::new(
                Tool::new("noop", "Does nothing", json!({"type": "object", "properties": {}})),
                |_| async move { Ok(String::new()) },
            ))
            .unwrap();

        let names: Vec<String> = registry.specs().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["echo", "noop"]);
    }

    #[test]
    fn test_unknown_tool_lookup() {
        let registry = ToolRegistry::new();
        assert!(registry.get("missing").is_none());
    }
}
