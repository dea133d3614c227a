// dispatch-scheduler: the unit of work moving through the queue (§3 "Task")

use dispatch_core::{CoreError, CoreResult, ExecutionContext};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// What a caller hands the scheduler to enqueue one workflow run.
pub struct SubmitRequest {
    pub workflow_name: String,
    pub input: String,
    pub user_id: String,
    pub archive_id: String,
    pub experiment_id: Option<String>,
    pub parameters: Option<serde_json::Value>,
    /// Echoed back verbatim in the response when the client supplies
    /// one (§8 round-trip law 10); the scheduler generates one when
    /// absent (§4.H).
    pub trace_id: Option<String>,
    pub timeout: std::time::Duration,
}

/// What comes back out of the queue once a worker has finished it (or
/// the run was abandoned because the deadline passed first).
pub struct TaskResult {
    pub trace_id: String,
    pub result: CoreResult<String>,
}

/// An enqueued unit of work. Workers consume these from the shared
/// receiver and thread `ctx` into the resolved workflow's `process`.
pub(crate) struct Task {
    pub trace_id: String,
    pub workflow_name: String,
    pub input: String,
    /// Caller-supplied parameter map (§3 Task). Not one of the three
    /// context keys propagated into `ExecutionContext` — this is
    /// Task-level metadata only, carried through for workflows that
    /// choose to inspect it via the registry rather than the context.
    pub parameters: Option<serde_json::Value>,
    pub ctx: ExecutionContext,
    pub reply: oneshot::Sender<TaskResult>,
}

impl Task {
    pub fn new(
        trace_id: String,
        request: SubmitRequest,
        deadline: Instant,
        reply: oneshot::Sender<TaskResult>,
    ) -> Self {
        let (ctx, _handle) = ExecutionContext::new(deadline);
        let ctx = ctx.with_metadata(request.user_id, request.archive_id, trace_id.clone());
        Self {
            trace_id,
            workflow_name: request.workflow_name,
            input: request.input,
            parameters: request.parameters,
            ctx,
            reply,
        }
    }

    pub fn fail(self, error: CoreError) {
        let _ = self.reply.send(TaskResult {
            trace_id: self.trace_id,
            result: Err(error),
        });
    }
}
