// dispatch-gateway: JSON wire contract (§6)

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Falls back to the gateway's `default_flow` when omitted.
    #[serde(default)]
    pub workflow: Option<String>,
    pub input: String,
    pub user_id: String,
    pub archive_id: String,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    /// Clamped to `[1, max_timeout_secs]`; falls back to
    /// `default_timeout_secs` when omitted.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteMetadata {
    pub user_id: String,
    pub workflow: String,
    /// `""` when the request omitted it — §6 types this field as a
    /// plain string, not a nullable one.
    pub experiment_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub workflow: String,
    pub output: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub metadata: ExecuteMetadata,
    pub process_time_ms: i64,
    pub trace_id: String,
}

#[derive(Debug, Serialize)]
pub struct WorkflowDetail {
    pub name: String,
    pub description: String,
    pub model: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct WorkflowListResponse {
    pub workflows: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub time: String,
    pub workflows: usize,
    pub workflow_names: Vec<String>,
}
