use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolContext, ToolDefinition, ToolOutput};

/// Tools by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool {} registered twice; keeping the latest", name);
        } else {
            tracing::debug!("Registered tool {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Run `name` with its own execution timeout.
    pub async fn call(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let timeout = tool.execution_timeout();

        match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!("Tool {} failed: {}", name, e);
                }
                result
            }
            Err(_) => Err(ToolError::Timeout {
                name: name.to_string(),
                timeout,
            }),
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
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::pipeline::Session;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Returns its parameters."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }

        async fn execute(
            &self,
            params: serde_json::Value,
            _ctx: &mut ToolContext<'_>,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::success(params, Duration::ZERO))
        }
    }

    struct Stall;

    #[async_trait]
    impl Tool for Stall {
        fn name(&self) -> &str {
            "stall"
        }

        fn description(&self) -> &str {
            "Never returns in time."
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }

        async fn execute(
            &self,
            _params: serde_json::Value,
            _ctx: &mut ToolContext<'_>,
        ) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ToolOutput::success(serde_json::Value::Null, Duration::ZERO))
        }

        fn execution_timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
    }

    #[tokio::test]
    async fn call_dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);

        let output = registry
            .call("echo", serde_json::json!({"a": 1}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(output.result, serde_json::json!({"a": 1}));
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let err = registry
            .call("missing", serde_json::Value::Null, &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Stall));
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let err = registry
            .call("stall", serde_json::Value::Null, &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}
