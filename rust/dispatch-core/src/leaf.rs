// dispatch-core: leaf Workflow backed directly by a model endpoint (§4.C)

use crate::context::ExecutionContext;
use crate::endpoint::{Message, ModelEndpoint};
use crate::error::CoreResult;
use crate::workflow::Workflow;
use async_trait::async_trait;
use std::sync::Arc;

/// The simplest possible workflow: forward the input as a single user
/// message to a model endpoint (or pool) and return its completion
/// verbatim. Composers wrap instances of this (or of native Rust
/// plugins) to build the multi-step flows described in the workflow
/// YAML (§4.B).
pub struct LlmAgent {
    name: String,
    description: String,
    model_name: String,
    system_prompt: Option<String>,
    endpoint: Arc<dyn ModelEndpoint>,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        model_name: impl Into<String>,
        endpoint: Arc<dyn ModelEndpoint>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            model_name: model_name.into(),
            system_prompt: None,
            endpoint,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[async_trait]
impl Workflow for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    async fn process(&self, ctx: &ExecutionContext, input: String) -> CoreResult<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.push(Message::user(input));
        self.endpoint.call(ctx, &messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use tokio::time::Instant;

    struct Echoing;

    #[async_trait]
    impl ModelEndpoint for Echoing {
        async fn call(&self, _ctx: &ExecutionContext, messages: &[Message]) -> CoreResult<String> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl ModelEndpoint for AlwaysFails {
        async fn call(&self, _ctx: &ExecutionContext, _messages: &[Message]) -> CoreResult<String> {
            Err(CoreError::UpstreamPermanent("nope".into()))
        }
    }

    fn fresh_ctx() -> ExecutionContext {
        ExecutionContext::new(Instant::now() + std::time::Duration::from_secs(30)).0
    }

    #[tokio::test]
    async fn forwards_input_as_user_message() {
        let agent = LlmAgent::new("greeter", "says hi", "gpt-x", Arc::new(Echoing));
        let out = agent.process(&fresh_ctx(), "hello".into()).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn system_prompt_is_prepended_not_returned() {
        let agent = LlmAgent::new("greeter", "says hi", "gpt-x", Arc::new(Echoing))
            .with_system_prompt("be terse");
        let out = agent.process(&fresh_ctx(), "hello".into()).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn propagates_endpoint_errors() {
        let agent = LlmAgent::new("broken", "fails", "gpt-x", Arc::new(AlwaysFails));
        let err = agent.process(&fresh_ctx(), "hello".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::UpstreamPermanent(_)));
    }
}
