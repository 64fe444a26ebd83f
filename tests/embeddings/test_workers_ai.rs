// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use agriserve_knowledge::embeddings::{
    EmbeddingError, EmbeddingGenerator, WorkersAiConfig, WorkersAiEmbedder,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RUN_PATH: &str = "/accounts/acct-1/ai/run/@cf/baai/bge-base-en-v1.5";

fn embedder(server: &MockServer) -> WorkersAiEmbedder {
    WorkersAiEmbedder::new(WorkersAiConfig {
        account_id: Some("acct-1".to_string()),
        api_token: Some("cf-token".to_string()),
        base_url: server.uri(),
        base_backoff: Duration::from_millis(5),
        ..WorkersAiConfig::default()
    })
    .unwrap()
}

fn success_body() -> serde_json::Value {
    json!({
        "success": true,
        "errors": [],
        "result": { "shape": [1, 3], "data": [[0.25, -0.5, 0.75]] }
    })
}

#[tokio::test]
async fn test_returns_first_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(header("authorization", "Bearer cf-token"))
        .and(body_json(json!({ "text": "drip irrigation kit" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let vector = embedder(&server)
        .generate("  drip irrigation kit  ")
        .await
        .unwrap();
    assert_eq!(vector, vec![0.25, -0.5, 0.75]);
}

#[tokio::test]
async fn test_retries_server_error_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let vector = embedder(&server).generate("harvester").await.unwrap();
    assert_eq!(vector.len(), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let err = embedder(&server).generate("seed drill").await.unwrap_err();
    match err {
        EmbeddingError::Api { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "slow down");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad input"))
        .expect(1)
        .mount(&server)
        .await;

    let err = embedder(&server).generate("sprayer").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Api { status: 400, .. }));
}

#[tokio::test]
async fn test_unsuccessful_envelope_reports_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{ "code": 5007, "message": "model not found" }, { "message": "try again" }],
            "result": null
        })))
        .mount(&server)
        .await;

    let err = embedder(&server).generate("tiller").await.unwrap_err();
    match err {
        EmbeddingError::Provider(message) => assert_eq!(message, "model not found, try again"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_data_is_no_embedding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": { "data": [] }
        })))
        .mount(&server)
        .await;

    let err = embedder(&server).generate("thresher").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::NoEmbedding));
}

#[tokio::test]
async fn test_batch_skips_blank_texts_and_keeps_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(body_json(json!({ "text": ["tractor", "harvester"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": { "data": [[1.0, 0.0], [0.0, 1.0]] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let texts = vec![" tractor ".to_string(), "   ".to_string(), "harvester".to_string()];
    let results = embedder(&server).generate_batch(&texts).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap(), &vec![1.0, 0.0]);
    assert!(matches!(results[1], Err(EmbeddingError::EmptyText)));
    assert_eq!(results[2].as_ref().unwrap(), &vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_batch_failure_marks_every_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad batch"))
        .mount(&server)
        .await;

    let texts = vec!["a".to_string(), "b".to_string()];
    let results = embedder(&server).generate_batch(&texts).await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(EmbeddingError::Api { status: 400, .. }))));
}

#[tokio::test]
async fn test_model_reports_configured_model() {
    let server = MockServer::start().await;
    assert_eq!(embedder(&server).model(), "@cf/baai/bge-base-en-v1.5");
}
