// dispatch-core: resolves a workflow's declared `model` string to a
// callable `ModelEndpoint` (§4.A, §6 `model_api_pools`).
//
// A model name of the form `pool:<name>` resolves to the configured
// `EndpointPool` named `<name>`; any other model name is rejected at
// registration time rather than at first call, so a typo in a workflow
// YAML surfaces during startup instead of mid-request.

use crate::endpoint::ModelEndpoint;
use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Arc;

const POOL_PREFIX: &str = "pool:";

#[derive(Default)]
pub struct ModelRegistry {
    pools: HashMap<String, Arc<dyn ModelEndpoint>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, name: impl Into<String>, pool: Arc<dyn ModelEndpoint>) -> Self {
        self.pools.insert(name.into(), pool);
        self
    }

    /// Parses a `model` string and looks up the pool it names. Returns
    /// `InvalidRequest` for any name that isn't a recognized `pool:`
    /// reference or doesn't match a configured pool.
    pub fn resolve(&self, model: &str) -> CoreResult<Arc<dyn ModelEndpoint>> {
        let pool_name = model.strip_prefix(POOL_PREFIX).ok_or_else(|| {
            CoreError::InvalidRequest(format!(
                "model '{model}' is not a pool reference (expected '{POOL_PREFIX}<name>')"
            ))
        })?;
        self.pools.get(pool_name).cloned().ok_or_else(|| {
            CoreError::InvalidRequest(format!("no model pool configured named '{pool_name}'"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::endpoint::Message;
    use async_trait::async_trait;
    use tokio::time::Instant;

    struct Stub;

    #[async_trait]
    impl ModelEndpoint for Stub {
        async fn call(&self, _ctx: &ExecutionContext, _messages: &[Message]) -> CoreResult<String> {
            Ok("stub".into())
        }
    }

    #[tokio::test]
    async fn resolves_registered_pool_by_name() {
        let registry = ModelRegistry::new().with_pool("fast", Arc::new(Stub));
        let pool = registry.resolve("pool:fast").unwrap();
        let (ctx, _h) = ExecutionContext::new(Instant::now() + std::time::Duration::from_secs(5));
        assert_eq!(pool.call(&ctx, &[]).await.unwrap(), "stub");
    }

    #[test]
    fn rejects_model_names_missing_the_pool_prefix() {
        let registry = ModelRegistry::new().with_pool("fast", Arc::new(Stub));
        let err = registry.resolve("fast").unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_unknown_pool_names() {
        let registry = ModelRegistry::new();
        let err = registry.resolve("pool:missing").unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }
}
