use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use faas_core::FunctionId;
use faas_store::{LogEntry, LogEntryInput, LogMetrics, LogPage};

use super::error::ApiError;
use crate::core::FaasCore;

const DEFAULT_PAGE_SIZE: usize = 50;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogsQuery {
    function_id: FunctionId,
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsQuery {
    function_id: FunctionId,
}

async fn append(
    State(core): State<Arc<FaasCore>>,
    Json(entry): Json<LogEntryInput>,
) -> Result<(StatusCode, Json<LogEntry>), ApiError> {
    let entry = core
        .log_store()
        .append(entry, now_ms())
        .map_err(|err| ApiError(err.to_string()))?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn query(
    State(core): State<Arc<FaasCore>>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<LogPage>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let page = core
        .log_store()
        .query(&params.function_id, limit, params.cursor.as_deref())
        .map_err(|err| ApiError(err.to_string()))?;
    Ok(Json(page))
}

async fn metrics(
    State(core): State<Arc<FaasCore>>,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<LogMetrics>, ApiError> {
    let metrics = core
        .log_store()
        .metrics(&params.function_id)
        .map_err(|err| ApiError(err.to_string()))?;
    Ok(Json(metrics))
}

async fn delete_for_function(
    State(core): State<Arc<FaasCore>>,
    Path(function_id): Path<FunctionId>,
) -> Result<StatusCode, ApiError> {
    core.log_store()
        .delete_for_function(&function_id)
        .map_err(|err| ApiError(err.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the Log/Metric Store HTTP surface (spec.md §6's second table):
/// `POST/GET /logs`, `GET /metrics`, `DELETE /logs/{functionId}`. Missing the
/// required `functionId` query parameter, or a missing required field on
/// `POST /logs`, both surface as `400` through axum's own extractor
/// rejections before these handlers run.
pub fn log_store_router(core: Arc<FaasCore>) -> Router {
    Router::new()
        .route("/logs", post(append).get(query))
        .route("/logs/{function_id}", delete(delete_for_function))
        .route("/metrics", get(metrics))
        .with_state(core)
}
