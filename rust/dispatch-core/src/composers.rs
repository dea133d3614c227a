// dispatch-core: workflow composition runtime — §4.B
//
// Composers are themselves `Workflow`s, so they nest arbitrarily: a
// Parallel composer's children may be Sequential composers, and so on.
// Each composer variant below owns its control-flow shape; none of
// them know whether their children are leaf `LlmAgent`s, plugin
// workflows, or further composers.

use crate::context::ExecutionContext;
use crate::error::{CoreError, CoreResult};
use crate::workflow::{catch_panics, Workflow};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs children one after another, threading each child's output into
/// the next child's input. Stops at the first child error (§4.B
/// Sequential).
pub struct SequentialComposer {
    name: String,
    description: String,
    children: Vec<Arc<dyn Workflow>>,
}

impl SequentialComposer {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        children: Vec<Arc<dyn Workflow>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            children,
        }
    }
}

#[async_trait]
impl Workflow for SequentialComposer {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn model(&self) -> &str {
        "composite"
    }
    fn kind(&self) -> &'static str {
        "sequential"
    }

    async fn process(&self, ctx: &ExecutionContext, input: String) -> CoreResult<String> {
        let mut current = input;
        for child in &self.children {
            if ctx.is_done() {
                return Err(CoreError::Timeout);
            }
            current = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(CoreError::Timeout),
                result = catch_panics(child.process(ctx, current)) => result?,
            };
        }
        Ok(current)
    }
}

/// Runs every child concurrently against the same input, bounded to at
/// most `width` in flight at once via a semaphore (§4.B Parallel). Every
/// child runs to completion even if others fail; outputs are joined in
/// **completion order**, not submission order — callers should assert
/// on the set of outputs present, not their position. Any number of
/// child failures are aggregated into a single `CoreError::Multiple`
/// that preserves each individual error's text.
pub struct ParallelComposer {
    name: String,
    description: String,
    children: Vec<Arc<dyn Workflow>>,
    width: usize,
    join_with: String,
}

impl ParallelComposer {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        children: Vec<Arc<dyn Workflow>>,
        width: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            children,
            width: width.max(1),
            join_with: "\n".to_string(),
        }
    }

    pub fn with_join_separator(mut self, sep: impl Into<String>) -> Self {
        self.join_with = sep.into();
        self
    }
}

#[async_trait]
impl Workflow for ParallelComposer {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn model(&self) -> &str {
        "composite"
    }
    fn kind(&self) -> &'static str {
        "parallel"
    }

    async fn process(&self, ctx: &ExecutionContext, input: String) -> CoreResult<String> {
        if ctx.is_done() {
            return Err(CoreError::Timeout);
        }

        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut in_flight: FuturesUnordered<_> = self
            .children
            .iter()
            .map(|child| {
                let child = Arc::clone(child);
                let semaphore = Arc::clone(&semaphore);
                let input = input.clone();
                let ctx = ctx.clone();
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("semaphore never closed during composer lifetime");
                    tokio::select! {
                        biased;
                        _ = ctx.cancelled() => Err(CoreError::Timeout),
                        result = catch_panics(child.process(&ctx, input)) => result,
                    }
                }
            })
            .collect();

        let mut outputs = Vec::with_capacity(self.children.len());
        let mut errors = Vec::new();
        while let Some(result) = in_flight.next().await {
            match result {
                Ok(output) => outputs.push(output),
                Err(err) => errors.push(err.to_string()),
            }
        }

        if !errors.is_empty() {
            return Err(CoreError::Multiple(errors));
        }

        Ok(outputs.join(&self.join_with))
    }
}

/// Default iteration cap (§4.B Loop: "Default `N=10`").
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Applies its child sequentially for up to `max_iterations`, passing
/// each iteration's output as the next iteration's input. There is no
/// "converged" predicate in the core — termination is bounded iteration
/// only (§4.B Loop), in addition to the usual early exit on child error
/// or context cancellation.
pub struct LoopComposer {
    name: String,
    description: String,
    child: Arc<dyn Workflow>,
    max_iterations: usize,
}

impl LoopComposer {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        child: Arc<dyn Workflow>,
        max_iterations: usize,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            child,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn with_default_iterations(
        name: impl Into<String>,
        description: impl Into<String>,
        child: Arc<dyn Workflow>,
    ) -> Self {
        Self::new(name, description, child, DEFAULT_MAX_ITERATIONS)
    }
}

#[async_trait]
impl Workflow for LoopComposer {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn model(&self) -> &str {
        "composite"
    }
    fn kind(&self) -> &'static str {
        "loop"
    }

    async fn process(&self, ctx: &ExecutionContext, input: String) -> CoreResult<String> {
        let mut current = input;
        for _ in 0..self.max_iterations {
            if ctx.is_done() {
                return Err(CoreError::Timeout);
            }
            current = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(CoreError::Timeout),
                result = catch_panics(self.child.process(ctx, current)) => result?,
            };
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    struct Append(&'static str);

    #[async_trait]
    impl Workflow for Append {
        fn name(&self) -> &str {
            "append"
        }
        fn description(&self) -> &str {
            "appends a fixed suffix"
        }
        fn model(&self) -> &str {
            "none"
        }
        async fn process(&self, _ctx: &ExecutionContext, input: String) -> CoreResult<String> {
            Ok(format!("{input}{}", self.0))
        }
    }

    struct AlwaysFails(&'static str);

    #[async_trait]
    impl Workflow for AlwaysFails {
        fn name(&self) -> &str {
            "fails"
        }
        fn description(&self) -> &str {
            "always errors"
        }
        fn model(&self) -> &str {
            "none"
        }
        async fn process(&self, _ctx: &ExecutionContext, _input: String) -> CoreResult<String> {
            Err(CoreError::Internal(self.0.to_string()))
        }
    }

    fn fresh_ctx() -> ExecutionContext {
        ExecutionContext::new(Instant::now() + std::time::Duration::from_secs(30)).0
    }

    #[tokio::test]
    async fn sequential_threads_output_through_each_child() {
        let composer = SequentialComposer::new(
            "seq",
            "d",
            vec![Arc::new(Append("-a")), Arc::new(Append("-b"))],
        );
        let out = composer.process(&fresh_ctx(), "x".into()).await.unwrap();
        assert_eq!(out, "x-a-b");
    }

    #[tokio::test]
    async fn sequential_stops_at_first_error() {
        let composer = SequentialComposer::new(
            "seq",
            "d",
            vec![Arc::new(AlwaysFails("boom")), Arc::new(Append("-b"))],
        );
        let err = composer.process(&fresh_ctx(), "x".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::Internal(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn parallel_runs_every_child_and_joins_the_set_of_outputs() {
        let composer = ParallelComposer::new(
            "par",
            "d",
            vec![Arc::new(Append("-1")), Arc::new(Append("-2")), Arc::new(Append("-3"))],
            2,
        );
        let out = composer.process(&fresh_ctx(), "x".into()).await.unwrap();
        let mut pieces: Vec<&str> = out.split('\n').collect();
        pieces.sort_unstable();
        assert_eq!(pieces, vec!["x-1", "x-2", "x-3"]);
    }

    #[tokio::test]
    async fn parallel_aggregates_all_child_errors() {
        let composer = ParallelComposer::new(
            "par",
            "d",
            vec![Arc::new(AlwaysFails("a")), Arc::new(AlwaysFails("b"))],
            2,
        );
        let err = composer.process(&fresh_ctx(), "x".into()).await.unwrap_err();
        match err {
            CoreError::Multiple(errs) => assert_eq!(errs.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn loop_stops_at_max_iterations() {
        let composer = LoopComposer::new("loop", "d", Arc::new(Append("x")), 3);
        let out = composer.process(&fresh_ctx(), String::new()).await.unwrap();
        assert_eq!(out, "xxx");
    }

    #[tokio::test]
    async fn loop_with_default_iterations_runs_ten_times() {
        let composer = LoopComposer::with_default_iterations("loop", "d", Arc::new(Append("x")));
        let out = composer.process(&fresh_ctx(), String::new()).await.unwrap();
        assert_eq!(out.len(), DEFAULT_MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn loop_stops_at_first_child_error() {
        let composer = LoopComposer::new("loop", "d", Arc::new(AlwaysFails("boom")), 5);
        let err = composer.process(&fresh_ctx(), String::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::Internal(msg) if msg == "boom"));
    }

    struct Sleeps(std::time::Duration);

    #[async_trait]
    impl Workflow for Sleeps {
        fn name(&self) -> &str {
            "sleeps"
        }
        fn description(&self) -> &str {
            "sleeps before echoing input"
        }
        fn model(&self) -> &str {
            "none"
        }
        async fn process(&self, _ctx: &ExecutionContext, input: String) -> CoreResult<String> {
            tokio::time::sleep(self.0).await;
            Ok(input)
        }
    }

    #[tokio::test]
    async fn sequential_honors_cancellation_mid_run() {
        let (ctx, handle) =
            ExecutionContext::new(Instant::now() + std::time::Duration::from_secs(30));
        let composer = SequentialComposer::new(
            "seq",
            "d",
            vec![
                Arc::new(Sleeps(std::time::Duration::from_millis(200))),
                Arc::new(Append("-b")),
            ],
        );

        let run = tokio::spawn(async move { composer.process(&ctx, "x".into()).await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::Timeout));
    }

    #[tokio::test]
    async fn parallel_honors_cancellation_before_dispatch() {
        let (ctx, handle) =
            ExecutionContext::new(Instant::now() + std::time::Duration::from_secs(30));
        handle.cancel();
        let composer =
            ParallelComposer::new("par", "d", vec![Arc::new(Append("-1")), Arc::new(Append("-2"))], 2);
        let err = composer.process(&ctx, "x".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout));
    }
}
