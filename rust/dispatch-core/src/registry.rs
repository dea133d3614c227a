// dispatch-core: Workflow Registry — §4.D
//
// Backed by `dashmap::DashMap`, which shards its internal locking so
// `resolve` never contends with a concurrent `register`/`unregister`
// on a different key, and never holds a lock across the caller's
// eventual `process` call: `resolve` clones the `Arc<dyn Workflow>`
// handle out of its map shard guard and drops the guard immediately.
// This keeps hot-swapping a plugin's workflow (unregister + register,
// §4.E) from ever blocking an in-flight call.

use crate::error::{CoreError, CoreResult};
use crate::workflow::Workflow;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Registry {
    workflows: DashMap<String, Arc<dyn Workflow>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `workflow` under its own `name()`, replacing whatever
    /// was previously registered under that name (plugin reload path,
    /// §4.E).
    pub fn register(&self, workflow: Arc<dyn Workflow>) {
        let name = workflow.name().to_string();
        self.workflows.insert(name, workflow);
    }

    /// Removes the workflow registered under `name`, if any. In-flight
    /// calls against the handle a caller already resolved are
    /// unaffected — they hold their own `Arc` clone.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.remove(name).map(|(_, workflow)| workflow)
    }

    /// Resolves `name` to a workflow handle without holding a map
    /// shard lock across the eventual `process` call.
    pub fn resolve(&self, name: &str) -> CoreResult<Arc<dyn Workflow>> {
        self.workflows
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CoreError::WorkflowNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// Names of every registered workflow, for `GET /api/workflows`.
    /// No ordering guarantee.
    pub fn list_names(&self) -> Vec<String> {
        self.workflows.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
