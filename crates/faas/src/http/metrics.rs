use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::header::ACCEPT;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use faas_metrics::export::{json, openmetrics, prometheus};

use crate::core::FaasCore;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Content-negotiates spec.md §4.G's three export formats off the `Accept`
/// header. OpenMetrics is matched before plain `text/plain` since its media
/// type is more specific; `application/json` and anything unrecognized
/// (including a missing header) fall back to Prometheus text, the format
/// every Prometheus-compatible scraper sends without an `Accept` header at
/// all.
async fn export(State(core): State<Arc<FaasCore>>, headers: HeaderMap) -> Response {
    let accept = headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if accept.contains("openmetrics-text") {
        let body = openmetrics::render(core.metrics());
        ([("content-type", openmetrics::CONTENT_TYPE)], body).into_response()
    } else if accept.contains("application/json") {
        let body = json::export(core.metrics(), now_ms());
        ([("content-type", json::CONTENT_TYPE)], axum::Json(body)).into_response()
    } else {
        let body = prometheus::render(core.metrics());
        ([("content-type", prometheus::CONTENT_TYPE)], body).into_response()
    }
}

/// Builds the cross-function Metrics Exporter surface (spec.md §4.G), mounted
/// at `/metrics/export` to keep it distinct from the Log/Metric Store's
/// per-function `GET /metrics?functionId=` (spec.md §6).
pub fn metrics_router(core: Arc<FaasCore>) -> Router {
    Router::new()
        .route("/metrics/export", get(export))
        .with_state(core)
}
