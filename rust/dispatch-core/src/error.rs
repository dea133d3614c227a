// dispatch-core: error kinds shared across the dispatch core

use thiserror::Error;

/// Result type used throughout the dispatch core.
pub type CoreResult<T> = Result<T, CoreError>;

/// The eight abstract error kinds from the core's error handling design.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("queue is full")]
    QueueFull,

    #[error("task deadline exceeded")]
    Timeout,

    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),

    #[error("upstream permanent error: {0}")]
    UpstreamPermanent(String),

    #[error("plugin load failed: {0}")]
    PluginLoad(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Aggregated errors from a Parallel composer, one entry per failed child.
    #[error("{} child error(s): {}", .0.len(), .0.join("; "))]
    Multiple(Vec<String>),
}

impl CoreError {
    /// Whether a caller may retry this error (§7 `is_retryable`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::UpstreamTransient(_) | CoreError::QueueFull)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CoreError::InvalidRequest(_) => "InvalidRequest",
            CoreError::WorkflowNotFound(_) => "WorkflowNotFound",
            CoreError::QueueFull => "QueueFull",
            CoreError::Timeout => "Timeout",
            CoreError::UpstreamTransient(_) => "UpstreamTransient",
            CoreError::UpstreamPermanent(_) => "UpstreamPermanent",
            CoreError::PluginLoad(_) => "PluginLoad",
            CoreError::Internal(_) => "Internal",
            CoreError::Multiple(_) => "Multiple",
        }
    }
}
