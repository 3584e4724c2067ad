//! Integration tests for the health endpoint.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use storyloom_test_support::ScriptedNarrationClient;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let app = common::build_test_app(Arc::new(ScriptedNarrationClient::new()), true);

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["streaming"], true);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_test_app(Arc::new(ScriptedNarrationClient::new()), true);

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
