use crate::error::{Result, ToolingError};
use futures::future::join_all;
use llm::message::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A handler's future; its `Result` maps onto §4.3's dispatch contract: `Ok`
/// becomes the tool's output text, `Err` is captured and rendered as
/// `"Execution error: ..."` — tool failures never abort the Actor loop.
pub type ToolFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>;
pub type ToolHandler = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub schema: Value,
    handler: ToolHandler,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler,
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name.clone(), self.description.clone()).with_parameters(self.schema.clone())
    }

    /// Drives the handler to completion, capturing any failure as text so
    /// the caller sees a uniform synchronous-looking interface (§4.3,
    /// §9 "Async/sync mix").
    pub async fn execute(&self, args: Value) -> String {
        match (self.handler)(args).await {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(tool = %self.name, error = %err, "tool execution failed");
                format!("Execution error: {err}")
            }
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name).finish()
    }
}

/// Registered tools for one Actor instance. Each concurrent Actor owns its
/// own registry (fresh tool-registry view per §4.6), though the underlying
/// handlers may close over shared state (e.g. the Plan).
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. Re-registering an existing name is rejected with
    /// `DuplicateTool` rather than silently overwriting it (§4.3, §9).
    pub fn register(&mut self, tool: Tool) -> Result<()> {
        if self.tools.contains_key(&tool.name) {
            return Err(ToolingError::DuplicateTool(tool.name));
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Schemas for a subset of registered tools, in the order requested, for
    /// inclusion in the LLM request's `tools[]`.
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(Tool::definition)
            .collect()
    }

    /// All registered tool schemas.
    pub fn all_schemas(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(Tool::definition).collect()
    }

    /// Looks up and invokes `name`'s handler. Never found is itself captured
    /// as `"Execution error: ..."` text, consistent with how dispatch
    /// failures are surfaced to the Actor.
    pub async fn dispatch(&self, name: &str, args: Value) -> String {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => format!("Execution error: tool {name:?} not found"),
        }
    }

    /// Dispatches several named calls concurrently (bounded fan-out is the
    /// caller's concern — see `orchestrator::actor`), preserving the input
    /// order in the returned vector regardless of completion order.
    pub async fn dispatch_all(&self, calls: Vec<(String, Value)>) -> Vec<String> {
        let futures = calls.into_iter().map(|(name, args)| self.dispatch(&name, args));
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_tool(name: &str) -> Tool {
        Tool::new(
            name,
            "echoes its input",
            serde_json::json!({"type": "object", "properties": {}}),
            Arc::new(|args: Value| Box::pin(async move { Ok(args.to_string()) }) as ToolFuture),
        )
    }

    fn failing_tool(name: &str) -> Tool {
        Tool::new(
            name,
            "always fails",
            serde_json::json!({"type": "object", "properties": {}}),
            Arc::new(|_: Value| Box::pin(async move { Err(anyhow::anyhow!("boom")) }) as ToolFuture),
        )
    }

    #[tokio::test]
    async fn dispatch_invokes_registered_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        let out = registry.dispatch("echo", serde_json::json!({"x": 1})).await;
        assert_eq!(out, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_reports_execution_error() {
        let registry = ToolRegistry::new();
        let out = registry.dispatch("missing", serde_json::json!({})).await;
        assert!(out.starts_with("Execution error:"));
    }

    #[tokio::test]
    async fn failing_handler_does_not_propagate_as_error() {
        let mut registry = ToolRegistry::new();
        registry.register(failing_tool("boom")).unwrap();
        let out = registry.dispatch("boom", serde_json::json!({})).await;
        assert!(out.starts_with("Execution error: boom"));
    }

    #[test]
    fn registering_duplicate_tool_name_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        let err = registry.register(echo_tool("echo")).unwrap_err();
        assert!(matches!(err, ToolingError::DuplicateTool(name) if name == "echo"));
    }

    #[tokio::test]
    async fn dispatch_all_preserves_call_order_regardless_of_completion_order() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        let calls = vec![
            ("echo".to_string(), serde_json::json!({"i": 1})),
            ("echo".to_string(), serde_json::json!({"i": 2})),
            ("echo".to_string(), serde_json::json!({"i": 3})),
        ];
        let results = registry.dispatch_all(calls).await;
        assert_eq!(results, vec![r#"{"i":1}"#, r#"{"i":2}"#, r#"{"i":3}"#]);
    }

    #[test]
    fn schemas_for_filters_and_orders_by_requested_names() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("a")).unwrap();
        registry.register(echo_tool("b")).unwrap();
        let schemas = registry.schemas_for(&["b".to_string(), "a".to_string(), "missing".to_string()]);
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].name, "b");
        assert_eq!(schemas[1].name, "a");
    }
}
