//! Tool trait shared by every tool the front-end can call.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ToolError;
use crate::pipeline::Session;

/// Per-call context. Tools that drive the pipeline mutate the session.
pub struct ToolContext<'a> {
    pub session: &'a mut Session,
}

impl<'a> ToolContext<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }
}

/// Output of a successful tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Name, description and schema advertised to the front-end.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the parameters object.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError>;

    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}
