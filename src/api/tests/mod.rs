use super::*;
use crate::leecher::test_helpers::{
    SHARE_ID, SHARE_LINK, create_task, create_test_leecher, publish_share, sampled_task,
};
use crate::remote::MemoryRemote;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use std::time::Duration;
use tower::ServiceExt;


/// Router over a fresh leecher; keep the tempdir alive for the test's duration
async fn create_test_app() -> (Router, Leecher, Arc<MemoryRemote>, tempfile::TempDir) {
    let (leecher, remote, temp_dir) = create_test_leecher().await;
    let app = create_router(leecher.clone(), leecher.config.clone());
    (app, leecher, remote, temp_dir)
}

async fn send(app: &Router, method: &str, uri: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn send_json(app: &Router, method: &str, uri: &str, body: serde_json::Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let (leecher, _remote, _temp_dir) = create_test_leecher().await;
    let mut config = (*leecher.config).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(start_api_server(
        leecher,
        Arc::new(config),
        shutdown.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (leecher, _remote, _temp_dir) = create_test_leecher().await;
    let mut config = (*leecher.config).clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(leecher, Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (leecher, _remote, _temp_dir) = create_test_leecher().await;
    let mut config = (*leecher.config).clone();
    config.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(leecher, Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://allowed.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://allowed.example"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (leecher, _remote, _temp_dir) = create_test_leecher().await;
    let mut config = (*leecher.config).clone();
    config.api.cors_enabled = false;
    let app = create_router(leecher, Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}
