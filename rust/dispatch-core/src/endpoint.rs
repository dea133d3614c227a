// dispatch-core: Endpoint Pool — §4.A
//
// Hides N equivalent upstream LLM endpoints behind one logical model
// name, selecting among them by strict round-robin. Grounded on
// `knhk-sidecar::retry::RetryExecutor`'s bounded-attempt/backoff shape,
// adapted to the linear backoff spec.md calls for at this layer.

use crate::context::ExecutionContext;
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One chat-style message in the prompt passed to a model endpoint.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Resolved handle to "a model" — either a single upstream or a pool.
/// Leaf agents hold one of these; they don't know or care which.
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    async fn call(&self, ctx: &ExecutionContext, messages: &[Message]) -> CoreResult<String>;
}

/// One upstream endpoint within a pool.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub credential: String,
}

/// N equivalent upstream endpoints behind one logical model name,
/// selected by `atomic-increment(counter) mod N` (§4.A). Construction
/// fails if the endpoint list is empty; N=1 is legal and degenerates to
/// always selecting the single endpoint.
pub struct EndpointPool {
    name: String,
    base_type: String,
    endpoints: Vec<Endpoint>,
    counter: AtomicUsize,
    http: reqwest::Client,
}

/// Up to this many attempts total (including the first) for a single
/// call before surfacing `UpstreamTransient` exhausted.
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_millis(100);

impl EndpointPool {
    pub fn new(
        name: impl Into<String>,
        base_type: impl Into<String>,
        endpoints: Vec<Endpoint>,
    ) -> CoreResult<Self> {
        if endpoints.is_empty() {
            return Err(CoreError::InvalidRequest(
                "endpoint pool requires at least one endpoint".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            base_type: base_type.into(),
            endpoints,
            counter: AtomicUsize::new(0),
            http: reqwest::Client::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_type(&self) -> &str {
        &self.base_type
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Selects the next endpoint via an atomic, strictly increasing
    /// counter modulo the pool size. Reaches every endpoint within any
    /// `N` consecutive selections (§8 invariant 6).
    fn next_endpoint(&self) -> &Endpoint {
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[idx]
    }

    async fn call_once(
        &self,
        endpoint: &Endpoint,
        messages: &[Message],
    ) -> Result<String, CallError> {
        let body = serde_json::json!({
            "model": self.base_type,
            "messages": messages.iter().map(|m| serde_json::json!({
                "role": m.role,
                "content": m.content,
            })).collect::<Vec<_>>(),
        });

        let resp = self
            .http
            .post(&endpoint.url)
            .bearer_auth(&endpoint.credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Transient(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(CallError::Transient(format!("upstream {status}")));
        }
        if status.is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CallError::Permanent(format!("upstream {status}: {text}")));
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CallError::Permanent(format!("invalid upstream body: {e}")))?;

        extract_completion(&value).ok_or_else(|| {
            CallError::Permanent("upstream response missing completion text".into())
        })
    }
}

enum CallError {
    Transient(String),
    Permanent(String),
}

/// Extracts the textual completion from a generic chat-completion style
/// JSON body (`choices[0].message.content`), falling back to a bare
/// `output`/`text` field for simpler upstreams.
fn extract_completion(value: &serde_json::Value) -> Option<String> {
    if let Some(text) = value
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
    {
        return Some(text.to_string());
    }
    if let Some(text) = value.get("output").and_then(|v| v.as_str()) {
        return Some(text.to_string());
    }
    if let Some(text) = value.get("text").and_then(|v| v.as_str()) {
        return Some(text.to_string());
    }
    None
}

#[async_trait]
impl ModelEndpoint for EndpointPool {
    async fn call(&self, ctx: &ExecutionContext, messages: &[Message]) -> CoreResult<String> {
        let mut last_err = String::new();
        for attempt in 0..MAX_ATTEMPTS {
            if ctx.is_done() {
                return Err(CoreError::Timeout);
            }
            let endpoint = self.next_endpoint();
            let call = self.call_once(endpoint, messages);
            let result = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(CoreError::Timeout),
                result = call => result,
            };
            match result {
                Ok(text) => return Ok(text),
                Err(CallError::Permanent(msg)) => return Err(CoreError::UpstreamPermanent(msg)),
                Err(CallError::Transient(msg)) => {
                    last_err = msg;
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(BACKOFF_STEP * (attempt + 1)).await;
                    }
                }
            }
        }
        Err(CoreError::UpstreamTransient(format!(
            "exhausted {MAX_ATTEMPTS} attempts against pool {}: {last_err}",
            self.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn construction_rejects_empty_endpoint_list() {
        let err = EndpointPool::new("p", "openai", vec![]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }

    #[test]
    fn round_robin_visits_every_endpoint_in_n_consecutive_selections() {
        let pool = EndpointPool::new(
            "p",
            "openai",
            vec![
                Endpoint {
                    url: "http://a".into(),
                    credential: "k".into(),
                },
                Endpoint {
                    url: "http://b".into(),
                    credential: "k".into(),
                },
                Endpoint {
                    url: "http://c".into(),
                    credential: "k".into(),
                },
            ],
        )
        .unwrap();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            seen.insert(pool.next_endpoint().url.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn single_endpoint_pool_is_legal() {
        let pool = EndpointPool::new(
            "p",
            "openai",
            vec![Endpoint {
                url: "http://only".into(),
                credential: "k".into(),
            }],
        )
        .unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.next_endpoint().url, "http://only");
        assert_eq!(pool.next_endpoint().url, "http://only");
    }

    proptest! {
        #[test]
        fn round_robin_counter_always_lands_in_bounds(n in 1usize..16, selections in 0usize..200) {
            let endpoints: Vec<Endpoint> = (0..n)
                .map(|i| Endpoint { url: format!("http://e{i}"), credential: "k".into() })
                .collect();
            let pool = EndpointPool::new("p", "openai", endpoints).unwrap();
            for _ in 0..selections {
                let idx = pool.counter.fetch_add(1, Ordering::Relaxed) % pool.endpoints.len();
                prop_assert!(idx < pool.len());
            }
        }
    }

    fn fresh_ctx() -> ExecutionContext {
        ExecutionContext::new(tokio::time::Instant::now() + Duration::from_secs(5)).0
    }

    #[tokio::test]
    async fn call_succeeds_against_a_mocked_upstream() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "mocked completion"}}]
            })))
            .mount(&server)
            .await;

        let pool = EndpointPool::new(
            "p",
            "openai",
            vec![Endpoint {
                url: server.uri(),
                credential: "k".into(),
            }],
        )
        .unwrap();

        let ctx = fresh_ctx();
        let out = pool.call(&ctx, &[Message::user("hi")]).await.unwrap();
        assert_eq!(out, "mocked completion");
    }

    #[tokio::test]
    async fn call_surfaces_client_errors_as_permanent_without_retry() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let pool = EndpointPool::new(
            "p",
            "openai",
            vec![Endpoint {
                url: server.uri(),
                credential: "k".into(),
            }],
        )
        .unwrap();

        let ctx = fresh_ctx();
        let err = pool.call(&ctx, &[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, CoreError::UpstreamPermanent(_)));
    }

    #[tokio::test]
    async fn call_retries_transient_server_errors_then_succeeds() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "output": "second attempt succeeded"
            })))
            .mount(&server)
            .await;

        let pool = EndpointPool::new(
            "p",
            "openai",
            vec![Endpoint {
                url: server.uri(),
                credential: "k".into(),
            }],
        )
        .unwrap();

        let ctx = fresh_ctx();
        let out = pool.call(&ctx, &[Message::user("hi")]).await.unwrap();
        assert_eq!(out, "second attempt succeeded");
    }
}
