use dispatch_core::Registry;
use dispatch_scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub registry: Arc<Registry>,
    pub default_flow: String,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
}

impl AppState {
    /// Resolves a request's optional `timeout` (seconds) against the
    /// configured default and ceiling (§6 `default_timeout_secs`/
    /// `max_timeout_secs`).
    pub fn resolve_timeout(&self, requested_secs: Option<u64>) -> Duration {
        let requested = requested_secs.map(Duration::from_secs).unwrap_or(self.default_timeout);
        requested.min(self.max_timeout).max(Duration::from_secs(1))
    }
}
