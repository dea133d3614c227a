//! Concurrency and dispatch core: workflow abstraction, composition
//! runtime, model endpoint pool, and the in-memory workflow registry.
//! The scheduler, plugin loader, config, and HTTP gateway crates sit on
//! top of this one.

pub mod composers;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod leaf;
pub mod model_registry;
pub mod registry;
pub mod workflow;

pub use composers::{LoopComposer, ParallelComposer, SequentialComposer, DEFAULT_MAX_ITERATIONS};
pub use context::{CancelHandle, ExecutionContext, CTX_KEY_ARCHIVE_ID, CTX_KEY_TRACE_ID, CTX_KEY_USER_ID};
pub use endpoint::{Endpoint, EndpointPool, Message, ModelEndpoint};
pub use error::{CoreError, CoreResult};
pub use hooks::{hook_fn, HookFn, HookFuture, Hooks};
pub use leaf::LlmAgent;
pub use model_registry::ModelRegistry;
pub use registry::Registry;
pub use workflow::{catch_panics, HookedWorkflow, Workflow};
