// dispatch-scheduler: bounded FIFO queue + worker pool — §4.F
//
// The queue is a bounded `tokio::sync::mpsc` channel; `submit` is
// `try_send`, which never blocks and returns `QueueFull` immediately
// at capacity (§8 property 3). `workers` tasks share one
// `Arc<tokio::sync::Mutex<Receiver<Task>>>` so a single MPSC channel
// fans out to many consumers — each worker loop is
// `lock -> recv -> drop lock -> process`, so only one worker holds the
// lock at a time and none of them hold it while a workflow is running.

use crate::task::{SubmitRequest, Task, TaskResult};
use dispatch_core::{catch_panics, CoreError, CoreResult, Registry};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub struct Scheduler {
    sender: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

/// Returned by `submit`: the trace-id to echo back regardless of
/// outcome, the task's absolute deadline (so the caller can race its
/// own wait against it — §4.G step 6), and either the one-shot
/// receiver for the eventual result or the immediate admission error.
pub struct SubmitOutcome {
    pub trace_id: String,
    pub deadline: Instant,
    pub receiver: CoreResult<oneshot::Receiver<TaskResult>>,
}

impl Scheduler {
    /// Spawns `workers` worker loops pulling from a queue of capacity
    /// `queue_size`, each resolving tasks against `registry`.
    pub fn start(registry: Arc<Registry>, workers: usize, queue_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>(queue_size);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let registry = Arc::clone(&registry);
                tokio::spawn(worker_loop(worker_id, receiver, registry))
            })
            .collect();

        Self {
            sender,
            workers: handles,
        }
    }

    /// Enqueues a task without blocking. Returns `QueueFull` the moment
    /// the queue is at capacity — callers never wait for room. The
    /// trace-id and the task's deadline are always returned alongside
    /// the result, even on immediate failure, so the caller can echo
    /// the trace-id in an error response (§8 round-trip laws 10/11) and
    /// race the receiver against the deadline itself (§4.G step 6):
    /// a task that is still queued when its deadline elapses must not
    /// make the caller wait for a worker to eventually dequeue it.
    pub fn submit(&self, request: SubmitRequest) -> SubmitOutcome {
        let trace_id = request
            .trace_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let deadline = Instant::now() + request.timeout;
        let (reply_tx, reply_rx) = oneshot::channel();
        let task = Task::new(trace_id.clone(), request, deadline, reply_tx);

        let result = self.sender.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(task) => {
                task.fail(CoreError::QueueFull);
                CoreError::QueueFull
            }
            mpsc::error::TrySendError::Closed(task) => {
                task.fail(CoreError::Internal("scheduler is shut down".into()));
                CoreError::Internal("scheduler is shut down".into())
            }
        });

        SubmitOutcome {
            trace_id,
            deadline,
            receiver: result.map(|()| reply_rx),
        }
    }

    /// Stops accepting new work and waits for in-flight tasks to
    /// finish. Queued-but-not-started tasks are dropped — their
    /// `reply` sender going out of scope resolves the caller's receiver
    /// with a `RecvError`, which callers should treat the same as
    /// `Internal`.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.workers {
            if let Err(err) = handle.await {
                error!(error = %err, "scheduler worker task panicked");
            }
        }
    }
}

async fn worker_loop(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<Task>>>, registry: Arc<Registry>) {
    loop {
        let task = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };
        let Some(task) = task else {
            debug!(worker_id, "scheduler worker shutting down, queue closed");
            return;
        };
        run_task(&registry, task).await;
    }
}

async fn run_task(registry: &Registry, task: Task) {
    let Task {
        trace_id,
        workflow_name,
        input,
        parameters: _,
        ctx,
        reply,
    } = task;

    let result = if ctx.is_done() {
        Err(CoreError::Timeout)
    } else {
        match registry.resolve(&workflow_name) {
            Ok(workflow) => {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => Err(CoreError::Timeout),
                    result = catch_panics(workflow.process(&ctx, input)) => result,
                }
            }
            Err(err) => Err(err),
        }
    };

    if let Err(err) = &result {
        warn!(trace_id = %trace_id, workflow = %workflow_name, error = %err, "task finished with error");
    }

    let _ = reply.send(TaskResult { trace_id, result });
}
