// dispatch-core: execution context plumbing (trace/user/archive ids, deadline, cancellation)

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

/// Context key names. Part of the external plugin contract (spec §6) —
/// renaming these breaks every compiled plugin artifact.
pub const CTX_KEY_USER_ID: &str = "user_id";
pub const CTX_KEY_ARCHIVE_ID: &str = "archive_id";
pub const CTX_KEY_TRACE_ID: &str = "trace_id";

struct Inner {
    deadline: Instant,
    cancel: watch::Receiver<bool>,
    /// Keeps the cancellation channel's sender side alive for as long as
    /// this context (or any context derived from it) exists. Without
    /// this, every `CancelHandle` returned by `new` gets dropped
    /// immediately by callers that don't need early cancellation (e.g.
    /// `Task::new`), which would close the watch channel and make
    /// `changed()` return an error indistinguishable from "cancelled".
    _keep_alive: Arc<watch::Sender<bool>>,
    user_id: String,
    archive_id: String,
    trace_id: String,
}

/// A cancellable, deadline-bound execution context threaded through a
/// single task's `Process` call and everything it invokes (composers,
/// leaf agents, endpoint pool calls).
///
/// Cheap to clone: metadata is duplicated but the cancellation channel
/// is shared via `watch::Receiver::clone`.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

/// The producer side of a context's cancellation signal. Held by whoever
/// owns the task (the gateway) so it can cancel early on client disconnect.
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl ExecutionContext {
    /// Construct a root context with no metadata attached yet. The
    /// scheduler fills in user/archive/trace ids before invoking the
    /// workflow (§4.H).
    pub fn new(deadline: Instant) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let inner = Inner {
            deadline,
            cancel: rx,
            _keep_alive: Arc::clone(&tx),
            user_id: String::new(),
            archive_id: String::new(),
            trace_id: String::new(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            CancelHandle(tx),
        )
    }

    /// Derive a child context carrying the given request metadata. This
    /// is the "inject metadata into ctx" step the scheduler performs
    /// before calling `processor` (§4.F).
    pub fn with_metadata(
        &self,
        user_id: impl Into<String>,
        archive_id: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: self.inner.deadline,
                cancel: self.inner.cancel.clone(),
                _keep_alive: Arc::clone(&self.inner._keep_alive),
                user_id: user_id.into(),
                archive_id: archive_id.into(),
                trace_id: trace_id.into(),
            }),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn archive_id(&self) -> &str {
        &self.inner.archive_id
    }

    pub fn trace_id(&self) -> &str {
        &self.inner.trace_id
    }

    /// True once the deadline has passed or the context was explicitly
    /// cancelled.
    pub fn is_done(&self) -> bool {
        Instant::now() >= self.inner.deadline || *self.inner.cancel.borrow()
    }

    /// Resolves once the context becomes done. Callers `select!` this
    /// against their own work to honor cancellation promptly.
    pub async fn cancelled(&self) {
        if self.is_done() {
            return;
        }
        let mut rx = self.inner.cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep_until(self.inner.deadline) => {}
            _ = async {
                loop {
                    if *rx.borrow() {
                        return;
                    }
                    // The sender side is kept alive by every context
                    // derived from the same root (`Inner::_keep_alive`),
                    // so this only errors once all of them are gone —
                    // at that point no cancel signal can ever arrive,
                    // and the deadline arm above is the only way out.
                    if rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
            } => {}
        }
    }
}
