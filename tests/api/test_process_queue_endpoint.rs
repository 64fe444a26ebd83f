// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use agriserve_knowledge::api::router;
use agriserve_knowledge::{
    AppState, EmbeddingQueue, HashEmbedder, InMemoryKnowledgeStore, QueueConfig, RateLimiter,
    RegexPiiScrubber, SourceType,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "cron-test-secret";

fn setup(secret: Option<&str>) -> (Router, Arc<EmbeddingQueue>) {
    let queue = Arc::new(EmbeddingQueue::new(
        QueueConfig::default(),
        Arc::new(RegexPiiScrubber::new().unwrap()),
        Arc::new(HashEmbedder::default()),
        Arc::new(InMemoryKnowledgeStore::new()),
    ));
    let state = AppState::new(
        Arc::new(RateLimiter::default()),
        queue.clone(),
        secret.map(str::to_string),
    );
    (router(state), queue)
}

fn post(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn fill(queue: &EmbeddingQueue, n: usize) {
    for i in 0..n {
        queue.enqueue(SourceType::Equipment, format!("eq-{}", i), "rotavator for hire", Default::default());
    }
}

#[tokio::test]
async fn test_missing_bearer_is_unauthorized() {
    let (app, queue) = setup(Some(SECRET));
    fill(&queue, 3);

    let response = app
        .oneshot(post("/api/knowledge/process-queue", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, serde_json::json!({ "error": "Unauthorized" }));
    assert_eq!(queue.len(), 3);
}

#[tokio::test]
async fn test_wrong_secret_is_unauthorized() {
    let (app, _) = setup(Some(SECRET));
    let response = app
        .oneshot(post("/api/knowledge/process-queue", Some("Bearer nope")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unconfigured_secret_rejects_drain() {
    let (app, _) = setup(None);
    let response = app
        .oneshot(post("/api/knowledge/process-queue", Some("Bearer ")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorized_drain_reports_counts() {
    let (app, queue) = setup(Some(SECRET));
    fill(&queue, 4);

    let response = app
        .oneshot(post(
            "/api/knowledge/process-queue?limit=3",
            Some(&format!("Bearer {}", SECRET)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["processed"], 3);
    assert_eq!(body["failed"], 0);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_default_limit_is_fifty() {
    let (app, queue) = setup(Some(SECRET));
    fill(&queue, 60);

    let response = app
        .oneshot(post(
            "/api/knowledge/process-queue",
            Some(&format!("Bearer {}", SECRET)),
        ))
        .await
        .unwrap();

    assert_eq!(json_body(response).await["processed"], 50);
    assert_eq!(queue.len(), 10);
}

#[tokio::test]
async fn test_percent_encoded_limit_is_decoded() {
    let (app, queue) = setup(Some(SECRET));
    fill(&queue, 5);

    let response = app
        .oneshot(post(
            "/api/knowledge/process-queue?limit=%32",
            Some(&format!("Bearer {}", SECRET)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["processed"], 2);
    assert_eq!(queue.len(), 3);
}

#[tokio::test]
async fn test_bad_limit_without_auth_is_still_unauthorized() {
    let (app, _) = setup(Some(SECRET));
    let response = app
        .oneshot(post("/api/knowledge/process-queue?limit=lots", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_limit_is_bad_request() {
    let (app, queue) = setup(Some(SECRET));
    fill(&queue, 2);

    let response = app
        .oneshot(post(
            "/api/knowledge/process-queue?limit=lots",
            Some(&format!("Bearer {}", SECRET)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("limit must be a non-negative integer"));
    assert_eq!(queue.len(), 2);
}

#[tokio::test]
async fn test_get_status_needs_no_auth() {
    let (app, _) = setup(Some(SECRET));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/knowledge/process-queue")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "embedding-queue-processor");
}

#[tokio::test]
async fn test_health_reports_queue_size() {
    let (app, queue) = setup(Some(SECRET));
    fill(&queue, 7);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queueSize"], 7);
    assert_eq!(body["trackedKeys"], 0);
}
