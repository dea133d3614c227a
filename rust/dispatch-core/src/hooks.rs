// dispatch-core: before/after hooks (§3 "Hook state", §9 "Hooks as polymorphism")

use crate::context::ExecutionContext;
use crate::error::CoreResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A hook sees the context and the current message and returns either a
/// transformed message to continue with, or (for before-hooks) a message
/// that replaces the rest of processing when `should_short_circuit` is
/// true. After-hooks ignore the short-circuit flag.
pub type HookFuture = Pin<Box<dyn Future<Output = CoreResult<(String, bool)>> + Send>>;

pub type HookFn = Arc<dyn Fn(ExecutionContext, String) -> HookFuture + Send + Sync>;

/// Wraps a plain async closure as a `HookFn`.
pub fn hook_fn<F, Fut>(f: F) -> HookFn
where
    F: Fn(ExecutionContext, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CoreResult<(String, bool)>> + Send + 'static,
{
    Arc::new(move |ctx, msg| Box::pin(f(ctx, msg)))
}

/// At most one before-hook and one after-hook per workflow (§3). Set once,
/// before the workflow is handed to a `Registry` — never mutated after.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before: Option<HookFn>,
    pub after: Option<HookFn>,
}

impl Hooks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_before(mut self, hook: HookFn) -> Self {
        self.before = Some(hook);
        self
    }

    pub fn with_after(mut self, hook: HookFn) -> Self {
        self.after = Some(hook);
        self
    }
}
