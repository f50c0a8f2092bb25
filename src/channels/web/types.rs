//! Request and response DTOs for the web gateway API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::ToolDefinition;

// --- Sessions ---

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
}

// --- Tools ---

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    pub name: String,
    pub result: serde_json::Value,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDefinition>,
}

// --- Events ---

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only stream events for this session.
    pub session_id: Option<Uuid>,
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channel: &'static str,
    pub simulated_dispatch: bool,
    pub chain_id: u64,
}
