// dispatch-core: the Workflow (Agent) abstraction — §4.C

use crate::context::ExecutionContext;
use crate::error::{CoreError, CoreResult};
use crate::hooks::Hooks;
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// A callable, hot-swappable processing unit. Leaf agents call a model
/// endpoint; composite agents (§4.B) delegate to children. Implementors
/// must be safe for concurrent invocation on distinct inputs and must
/// observe `ctx` promptly.
#[async_trait]
pub trait Workflow: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn model(&self) -> &str;

    /// Metadata-only discriminator surfaced by `GET /api/workflows/{name}`.
    fn kind(&self) -> &'static str {
        "leaf"
    }

    async fn process(&self, ctx: &ExecutionContext, input: String) -> CoreResult<String>;
}

/// Runs `fut` and converts any panic unwinding out of it into an
/// `Internal` error, so that a panicking hook or leaf call never takes
/// down a scheduler worker (§4.C, §4.F failure semantics).
pub async fn catch_panics<Fut, T>(fut: Fut) -> CoreResult<T>
where
    Fut: Future<Output = CoreResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(CoreError::Internal(format!(
            "recovered panic: {}",
            panic_message(&panic)
        ))),
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Decorates an inner `Workflow` with at most one before-hook and one
/// after-hook (§3 "Hook state", §4.C `Process` semantics). Hooks are
/// fixed at construction time — registering a hook after the workflow
/// has been published to a `Registry` is a misuse the type system
/// doesn't prevent but the contract forbids (§4.C).
pub struct HookedWorkflow {
    inner: Arc<dyn Workflow>,
    hooks: Hooks,
}

impl HookedWorkflow {
    pub fn new(inner: Arc<dyn Workflow>, hooks: Hooks) -> Self {
        Self { inner, hooks }
    }

    pub fn unhooked(inner: Arc<dyn Workflow>) -> Self {
        Self::new(inner, Hooks::none())
    }
}

#[async_trait]
impl Workflow for HookedWorkflow {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    async fn process(&self, ctx: &ExecutionContext, input: String) -> CoreResult<String> {
        if ctx.is_done() {
            return Err(CoreError::Timeout);
        }

        let mut current = input;

        if let Some(before) = &self.hooks.before {
            let (transformed, short_circuit) =
                catch_panics(before(ctx.clone(), current.clone())).await?;
            if short_circuit {
                return Ok(transformed);
            }
            current = transformed;
        }

        let mut output = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(CoreError::Timeout),
            result = catch_panics(self.inner.process(ctx, current)) => result?,
        };

        if let Some(after) = &self.hooks.after {
            let (transformed, _) = catch_panics(after(ctx.clone(), output.clone())).await?;
            output = transformed;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    struct Echo;

    #[async_trait]
    impl Workflow for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn model(&self) -> &str {
            "none"
        }
        async fn process(&self, _ctx: &ExecutionContext, input: String) -> CoreResult<String> {
            Ok(input)
        }
    }

    struct Panicker;

    #[async_trait]
    impl Workflow for Panicker {
        fn name(&self) -> &str {
            "panicker"
        }
        fn description(&self) -> &str {
            "always panics"
        }
        fn model(&self) -> &str {
            "none"
        }
        async fn process(&self, _ctx: &ExecutionContext, _input: String) -> CoreResult<String> {
            panic!("boom");
        }
    }

    fn fresh_ctx() -> (ExecutionContext, crate::context::CancelHandle) {
        ExecutionContext::new(Instant::now() + std::time::Duration::from_secs(30))
    }

    #[tokio::test]
    async fn panics_are_converted_to_internal_errors() {
        let wf = HookedWorkflow::unhooked(Arc::new(Panicker));
        let (ctx, _h) = fresh_ctx();
        let err = wf.process(&ctx, "x".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[tokio::test]
    async fn before_hook_can_short_circuit() {
        let before = crate::hooks::hook_fn(|_ctx, _msg| async move {
            Ok(("short-circuited".to_string(), true))
        });
        let wf = HookedWorkflow::new(Arc::new(Echo), Hooks::none().with_before(before));
        let (ctx, _h) = fresh_ctx();
        let out = wf.process(&ctx, "hello".into()).await.unwrap();
        assert_eq!(out, "short-circuited");
    }

    #[tokio::test]
    async fn after_hook_transforms_output() {
        let after = crate::hooks::hook_fn(|_ctx, msg| async move {
            Ok((format!("{msg}!"), false))
        });
        let wf = HookedWorkflow::new(Arc::new(Echo), Hooks::none().with_after(after));
        let (ctx, _h) = fresh_ctx();
        let out = wf.process(&ctx, "hi".into()).await.unwrap();
        assert_eq!(out, "hi!");
    }

    #[tokio::test]
    async fn expired_context_is_rejected_before_running() {
        let wf = HookedWorkflow::unhooked(Arc::new(Echo));
        let (ctx, _h) = ExecutionContext::new(Instant::now() - std::time::Duration::from_secs(1));
        let err = wf.process(&ctx, "x".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout));
    }
}
