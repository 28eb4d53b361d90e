use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use faas_core::{ExecutionId, FunctionId};
use faas_executor::{ExecuteRequest, ExecutionOutcome, ExecutorStateSnapshot};
use faas_sandbox::SandboxRequest;
use faas_store::{AggregateMetrics, ExecutionRecord};

use crate::core::FaasCore;

/// `POST /execute` body: `{functionId, code, timeoutMs?}` (spec.md §6). The
/// HTTP contract carries no inbound request shape for the sandboxed fetch
/// handler, so it runs against a default (empty) [`SandboxRequest`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteHttpRequest {
    function_id: FunctionId,
    code: String,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateQuery {
    function_id: FunctionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbortHttpRequest {
    execution_id: ExecutionId,
}

#[derive(Debug, Serialize)]
struct AbortHttpResponse {
    aborted: bool,
}

async fn execute(
    State(core): State<Arc<FaasCore>>,
    Json(body): Json<ExecuteHttpRequest>,
) -> Json<ExecutionOutcome> {
    let mut request = ExecuteRequest::new(body.code, SandboxRequest::default());
    request.timeout = body.timeout_ms.map(Duration::from_millis);
    Json(core.execute(body.function_id, request).await)
}

async fn state(
    State(core): State<Arc<FaasCore>>,
    Query(query): Query<StateQuery>,
) -> Json<ExecutorStateSnapshot> {
    Json(core.get_state(&query.function_id))
}

async fn logs(
    State(core): State<Arc<FaasCore>>,
    Path(function_id): Path<FunctionId>,
) -> Json<Vec<ExecutionRecord>> {
    Json(core.get_execution_logs(&function_id))
}

async fn metrics(
    State(core): State<Arc<FaasCore>>,
    Path(function_id): Path<FunctionId>,
) -> Json<AggregateMetrics> {
    Json(core.get_aggregate_metrics(&function_id))
}

async fn abort(
    State(core): State<Arc<FaasCore>>,
    Json(body): Json<AbortHttpRequest>,
) -> Json<AbortHttpResponse> {
    let aborted = core.abort(body.execution_id);
    Json(AbortHttpResponse { aborted })
}

/// Builds the Executor HTTP surface (spec.md §6's first table): `/execute`,
/// `/state`, `/logs/{functionId}`, `/metrics/{functionId}`, `/abort`. A
/// mismatched method on any of these paths falls through to axum's own `405`;
/// an unmatched path falls through to its own `404` — neither needs a
/// handler here.
pub fn executor_router(core: Arc<FaasCore>) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/state", get(state))
        .route("/logs/{function_id}", get(logs))
        .route("/metrics/{function_id}", get(metrics))
        .route("/abort", post(abort))
        .with_state(core)
}
