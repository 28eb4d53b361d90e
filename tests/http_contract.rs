//! Exercises spec.md §6's HTTP contracts end-to-end over the axum routers
//! `faas::http` builds atop [`faas::FaasCore`].

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use faas::{FaasConfig, FaasCore};
use faas_sandbox::{BoxedHandler, Module, SandboxResponse};

fn ok_handler() -> BoxedHandler {
    Arc::new(|_req, _ctx| Box::pin(async { SandboxResponse::with_status(200) }))
}

fn core() -> Arc<FaasCore> {
    let compiler = faas_loader::StaticRegistryCompiler::new();
    compiler.register("console.log('hi')", Module::new(Some(ok_handler())));
    Arc::new(FaasCore::new(FaasConfig::default(), None, Arc::new(compiler)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn execute_returns_200_with_execution_result_json() {
    let router = faas::http::router(core());
    let body = json!({"functionId": "A", "code": "console.log('hi')"});
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/execute")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["coldStart"], true);
    assert!(value["executionId"].is_string());
}

#[tokio::test]
async fn execute_with_wrong_method_is_405() {
    let router = faas::http::router(core());
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/execute")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unmatched_path_is_404() {
    let router = faas::http::router(core());
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logs_round_trip_through_post_and_get() {
    let router = faas::http::router(core());
    let body = json!({"functionId": "A", "level": "info", "message": "hello"});
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logs")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/logs?functionId=A&limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["entries"].as_array().unwrap().len(), 1);
    assert_eq!(page["entries"][0]["message"], "hello");
}

#[tokio::test]
async fn logs_query_missing_function_id_is_400() {
    let router = faas::http::router(core());
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_logs_returns_204() {
    let router = faas::http::router(core());
    let response = router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/logs/A")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn metrics_export_defaults_to_prometheus_text() {
    let c = core();
    let outcome = c
        .execute(
            "A".into(),
            faas_executor::ExecuteRequest::new(
                "console.log('hi')",
                faas_sandbox::SandboxRequest::default(),
            ),
        )
        .await;
    assert!(outcome.success);

    let router = faas::http::router(c);
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("functions_invocations_total{function_id=\"A\"} 1"));
}

#[tokio::test]
async fn metrics_export_honors_json_accept_header() {
    let router = faas::http::router(core());
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics/export")
                .header("accept", "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = body_json(response).await;
    assert!(value["functions"].is_object());
    assert!(value["totalInvocations"].is_number());
}
