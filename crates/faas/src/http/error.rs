use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// spec.md §7's `BadRequest` HTTP-surface-only error kind. `NotFound` and
/// `MethodNotAllowed` need no handler-level representation: axum's router
/// already returns 404/405 for an unmatched path or method before a handler
/// ever runs.
#[derive(Debug)]
pub struct ApiError(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": self.0 } }))).into_response()
    }
}
