// dispatch-gateway: HTTP surface (§6), grounded on
// `adamtc007-ob-poc::api::workflow_routes`'s `Router::new().route(...)`
// style.

use crate::error::GatewayError;
use crate::state::AppState;
use crate::wire::{
    ExecuteMetadata, ExecuteRequest, ExecuteResponse, HealthResponse, WorkflowDetail,
    WorkflowListResponse,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dispatch_core::{CoreError, Workflow};
use dispatch_scheduler::{SubmitRequest, TaskResult};
use futures::stream;
use std::time::Instant;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/:name", get(get_workflow))
        .route("/api/execute", post(execute))
        .route("/api/stream", post(stream_execute))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let workflow_names = state.registry.list_names();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION").to_string(),
        time: chrono::Utc::now().to_rfc3339(),
        workflows: workflow_names.len(),
        workflow_names,
    })
}

async fn list_workflows(State(state): State<AppState>) -> impl IntoResponse {
    let workflows = state.registry.list_names();
    Json(WorkflowListResponse {
        count: workflows.len(),
        workflows,
    })
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WorkflowDetail>, GatewayError> {
    let workflow = state.registry.resolve(&name)?;
    Ok(Json(WorkflowDetail {
        name: workflow.name().to_string(),
        description: workflow.description().to_string(),
        model: workflow.model().to_string(),
        kind: workflow.kind().to_string(),
    }))
}

fn build_submit_request(state: &AppState, request: &ExecuteRequest) -> SubmitRequest {
    let workflow_name = request
        .workflow
        .clone()
        .unwrap_or_else(|| state.default_flow.clone());
    let timeout = state.resolve_timeout(request.timeout);
    SubmitRequest {
        workflow_name,
        input: request.input.clone(),
        user_id: request.user_id.clone(),
        archive_id: request.archive_id.clone(),
        experiment_id: request.experiment_id.clone(),
        parameters: request.parameters.clone(),
        trace_id: request.trace_id.clone(),
        timeout,
    }
}

/// Maps a workflow-level error to its HTTP status (§4.G step 7, §7).
/// `QueueFull` maps to `429` (§9 Open Question 1); a task whose deadline
/// passes maps to `200` with `success:false` rather than a bodyless
/// `408` (§9 Open Question 2), so the client always gets a uniform JSON
/// envelope. `WorkflowNotFound` is the one workflow error that is not a
/// `500`.
fn status_for(error: &CoreError) -> StatusCode {
    match error {
        CoreError::WorkflowNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CoreError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
        CoreError::Timeout => StatusCode::OK,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_envelope(
    workflow: String,
    user_id: String,
    experiment_id: Option<String>,
    trace_id: String,
    process_time_ms: i64,
    error: CoreError,
) -> (StatusCode, Json<ExecuteResponse>) {
    let status = status_for(&error);
    warn!(
        trace_id = %trace_id,
        workflow = %workflow,
        error_kind = error.kind_name(),
        error_message = %error,
        "task finished with error",
    );
    (
        status,
        Json(ExecuteResponse {
            output: String::new(),
            success: false,
            message: Some(error.to_string()),
            metadata: ExecuteMetadata {
                user_id,
                workflow: workflow.clone(),
                experiment_id: experiment_id.unwrap_or_default(),
            },
            workflow,
            process_time_ms,
            trace_id,
        }),
    )
}

/// Races the result channel against the task's own deadline (§4.G step
/// 6: "Wait on (result-channel, ctx.Done)"). A task still sitting in
/// the queue when its deadline elapses must not make the caller wait
/// for a worker to eventually dequeue and run it — `timeout_at` fires
/// on the wall-clock deadline regardless of where the task is in its
/// lifecycle. The worker keeps running the abandoned task to
/// completion and its eventual write to the (by now unread) one-shot
/// channel is simply dropped (§5 Cancellation semantics).
async fn await_result(
    trace_id: String,
    deadline: tokio::time::Instant,
    receiver: oneshot::Receiver<TaskResult>,
) -> TaskResult {
    match tokio::time::timeout_at(deadline, receiver).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => TaskResult {
            trace_id,
            result: Err(CoreError::Internal(
                "scheduler dropped the task before replying".into(),
            )),
        },
        Err(_) => TaskResult {
            trace_id,
            result: Err(CoreError::Timeout),
        },
    }
}

/// Execute-synchronous algorithm (§4.G): submit, wait on the result
/// channel, fold into the response envelope either way — a workflow
/// error is never a bare HTTP error body, it's always the same shaped
/// JSON with `success:false`.
async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> (StatusCode, Json<ExecuteResponse>) {
    let started = Instant::now();
    let user_id = request.user_id.clone();
    let experiment_id = request.experiment_id.clone();
    let submit_request = build_submit_request(&state, &request);
    let workflow_name = submit_request.workflow_name.clone();

    let outcome = state.scheduler.submit(submit_request);
    let receiver = match outcome.receiver {
        Ok(receiver) => receiver,
        Err(err) => {
            let elapsed = started.elapsed().as_millis() as i64;
            return error_envelope(
                workflow_name,
                user_id,
                experiment_id,
                outcome.trace_id,
                elapsed,
                err,
            );
        }
    };

    let result = await_result(outcome.trace_id, outcome.deadline, receiver).await;

    let elapsed = started.elapsed().as_millis() as i64;
    match result.result {
        Ok(output) => (
            StatusCode::OK,
            Json(ExecuteResponse {
                output,
                success: true,
                message: None,
                metadata: ExecuteMetadata {
                    user_id,
                    workflow: workflow_name.clone(),
                    experiment_id: experiment_id.unwrap_or_default(),
                },
                workflow: workflow_name,
                process_time_ms: elapsed,
                trace_id: result.trace_id,
            }),
        ),
        Err(err) => error_envelope(
            workflow_name,
            user_id,
            experiment_id,
            result.trace_id,
            elapsed,
            err,
        ),
    }
}

/// Streaming variant of `execute`. `dispatch-core` workflows don't emit
/// incremental tokens, so this wraps the same submit-and-wait flow in a
/// single `data` event followed by `done`/`error`, rather than faking a
/// token-by-token feed (§4.G, §9 Streaming).
async fn stream_execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let started = Instant::now();
    let user_id = request.user_id.clone();
    let experiment_id = request.experiment_id.clone();
    let submit_request = build_submit_request(&state, &request);
    let workflow_name = submit_request.workflow_name.clone();

    let outcome = state.scheduler.submit(submit_request);
    let events: Vec<Event> = match outcome.receiver {
        Err(err) => {
            let elapsed = started.elapsed().as_millis() as i64;
            let (_, envelope) = error_envelope(
                workflow_name,
                user_id,
                experiment_id,
                outcome.trace_id,
                elapsed,
                err,
            );
            vec![sse_event("error", &envelope.0)]
        }
        Ok(receiver) => {
            let result = await_result(outcome.trace_id, outcome.deadline, receiver).await;
            let elapsed = started.elapsed().as_millis() as i64;
            match result.result {
                Ok(output) => {
                    let response = ExecuteResponse {
                        output: output.clone(),
                        success: true,
                        message: None,
                        metadata: ExecuteMetadata {
                            user_id,
                            workflow: workflow_name.clone(),
                            experiment_id: experiment_id.unwrap_or_default(),
                        },
                        workflow: workflow_name,
                        process_time_ms: elapsed,
                        trace_id: result.trace_id,
                    };
                    vec![
                        Event::default().event("data").data(output),
                        sse_event("done", &response),
                    ]
                }
                Err(err) => {
                    let (_, envelope) = error_envelope(
                        workflow_name,
                        user_id,
                        experiment_id,
                        result.trace_id,
                        elapsed,
                        err,
                    );
                    vec![sse_event("error", &envelope.0)]
                }
            }
        }
    };

    Sse::new(stream::iter(events.into_iter().map(Ok))).keep_alive(KeepAlive::default())
}

fn sse_event(name: &'static str, payload: &ExecuteResponse) -> Event {
    let body = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(name).data(body)
}
