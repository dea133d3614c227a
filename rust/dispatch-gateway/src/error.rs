// dispatch-gateway: CoreError -> HTTP status mapping (§7, §9), grounded
// on `adamtc007-ob-poc::api::workflow_routes::WorkflowApiError`'s
// `IntoResponse` pattern.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dispatch_core::CoreError;
use serde_json::json;

/// Wraps a `CoreError` for endpoints that surface it directly as an
/// HTTP error rather than folding it into a 200 envelope (that folding
/// is specific to `POST /api/execute`'s `Timeout` handling and lives in
/// `routes::execute` instead).
pub struct GatewayError(pub CoreError);

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::WorkflowNotFound(name) => {
                (StatusCode::NOT_FOUND, format!("workflow not found: {name}"))
            }
            CoreError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CoreError::QueueFull => (
                StatusCode::TOO_MANY_REQUESTS,
                "request queue is full, retry later".to_string(),
            ),
            CoreError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "task deadline exceeded".to_string(),
            ),
            CoreError::UpstreamTransient(msg) | CoreError::UpstreamPermanent(msg) => {
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            CoreError::PluginLoad(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            CoreError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            CoreError::Multiple(errs) => (StatusCode::INTERNAL_SERVER_ERROR, errs.join("; ")),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
