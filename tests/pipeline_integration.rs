use std::{sync::Arc, time::Duration};

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use embedscope::{
    api,
    config::Config,
    embedding::HuggingFaceClient,
    processing::{
        EmbeddingUnit, ErrorKind, PcaReducer, PipelineRequest, PipelineService, PipelineSettings,
        Stage,
    },
};
use httpmock::{Method::POST, Mock, MockServer};
use serde_json::{Value, json};
use tower::ServiceExt;

const MODEL_ID: &str = "sentence-transformers/test-model";

fn settings() -> PipelineSettings {
    PipelineSettings {
        chunk_size: 4,
        chunk_overlap: 1,
        result_size: 2,
        embedding_concurrency: 2,
    }
}

fn config_for(server: &MockServer) -> Config {
    Config::from_lookup(|key| match key {
        "HF_TOKEN" => Some("hf_integration".into()),
        "MODEL_ID" => Some(MODEL_ID.into()),
        "EMBEDDING_API_URL" => Some(server.base_url()),
        "CHUNK_SIZE" => Some("4".into()),
        "CHUNK_OVERLAP" => Some("1".into()),
        "RESULT_SIZE" => Some("2".into()),
        "EMBEDDING_TIMEOUT_SECS" => Some("5".into()),
        "EMBEDDING_CONCURRENCY" => Some("2".into()),
        _ => None,
    })
    .expect("config")
}

async fn mock_embedding<'a>(server: &'a MockServer, text: &str, vector: Value) -> Mock<'a> {
    let model_path = format!("/{MODEL_ID}");
    let body = json!({ "inputs": text, "options": { "wait_for_model": true } });
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path(model_path)
                .header("authorization", "Bearer hf_integration")
                .json_body(body);
            then.status(200).json_body(vector);
        })
        .await
}

async fn alphabet_mocks(server: &MockServer) -> Vec<Mock<'_>> {
    vec![
        mock_embedding(server, "ABCD", json!([1.0, 0.0, 0.0, 0.2])).await,
        mock_embedding(server, "DEFGH", json!([[0.0, 1.0, 0.0, 0.1]])).await,
        mock_embedding(server, "HIJ", json!([0.0, 0.0, 1.0, 0.0])).await,
        mock_embedding(server, "ABCDEFGHIJ", json!([0.7, 0.6, 0.1, 0.0])).await,
    ]
}

fn request(text: &str, query: &str) -> PipelineRequest {
    PipelineRequest {
        text: text.into(),
        query: query.into(),
        ..PipelineRequest::default()
    }
}

#[tokio::test]
async fn runs_full_pipeline_against_mock_provider() {
    let server = MockServer::start_async().await;
    let mocks = alphabet_mocks(&server).await;
    let service = PipelineService::from_config(&config_for(&server)).expect("service");

    let outcome = service
        .run(request("ABCDEFGHIJ", "ABCDEFGHIJ"))
        .await
        .expect("outcome");

    for mock in &mocks {
        mock.assert_hits_async(1).await;
    }

    let texts: Vec<&str> = outcome.chunks.iter().map(|chunk| chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["ABCD", "DEFGH", "HIJ"]);
    assert_eq!(outcome.embedding_dimension, 4);
    assert_eq!(outcome.query.position, 3);
    assert_eq!(outcome.query.text, "ABCDEFGHIJ");
    assert_eq!(outcome.top_indices(), vec![0, 1]);
    assert!(outcome.chunks.iter().all(|chunk| chunk.point.iter().all(|v| v.is_finite())));

    let distinct = outcome
        .chunks
        .iter()
        .map(|chunk| chunk.point)
        .chain(std::iter::once(outcome.query.point))
        .collect::<Vec<_>>();
    for left in 0..distinct.len() {
        for right in (left + 1)..distinct.len() {
            assert_ne!(distinct[left], distinct[right], "points {left} and {right} collide");
        }
    }

    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.runs_completed, 1);
    assert_eq!(snapshot.chunks_embedded, 3);
}

#[tokio::test]
async fn provider_error_aborts_with_failing_chunk() {
    let server = MockServer::start_async().await;
    mock_embedding(&server, "ABCD", json!([1.0, 0.0, 0.0])).await;
    let model_path = format!("/{MODEL_ID}");
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path(model_path)
                .json_body_partial(r#"{ "inputs": "DEFGH" }"#);
            then.status(500)
                .json_body(json!({ "error": "internal inference failure" }));
        })
        .await;

    let client = HuggingFaceClient::new(
        format!("{}/{MODEL_ID}", server.base_url()),
        "hf_integration",
        Duration::from_secs(5),
    )
    .expect("client");
    let service = PipelineService::new(
        Box::new(client),
        Box::new(PcaReducer::new()),
        PipelineSettings {
            embedding_concurrency: 1,
            ..settings()
        },
    );

    let error = service
        .run(request("ABCDEFGHIJ", "ABCDEFGHIJ"))
        .await
        .unwrap_err();

    assert_eq!(error.stage(), Stage::Embedding);
    assert_eq!(error.kind(), ErrorKind::ProviderError);
    assert_eq!(error.unit(), Some(EmbeddingUnit::Chunk(1)));
    assert!(error.to_string().contains("internal inference failure"));
    assert_eq!(service.metrics_snapshot().runs_failed, 1);
}

#[tokio::test]
async fn http_surface_serves_visualization() {
    let server = MockServer::start_async().await;
    let _mocks = alphabet_mocks(&server).await;
    let service = PipelineService::from_config(&config_for(&server)).expect("service");
    let app = api::create_router(Arc::new(service));

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/visualize")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "text": "ABCDEFGHIJ", "query": "ABCDEFGHIJ" }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(json["chunks"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["chunks"][0]["highlighted"], true);
    assert_eq!(json["chunks"][2]["highlighted"], false);
    assert_eq!(json["query"]["position"], 3);
    assert_eq!(json["chunk_size"], 4);
    assert_eq!(json["chunk_overlap"], 1);
}

#[tokio::test]
async fn http_surface_reports_insufficient_data() {
    let server = MockServer::start_async().await;
    mock_embedding(&server, "ABCD", json!([1.0, 0.0, 0.0])).await;
    mock_embedding(&server, "query", json!([0.0, 1.0, 0.0])).await;
    let service = PipelineService::from_config(&config_for(&server)).expect("service");
    let app = api::create_router(Arc::new(service));

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/visualize")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "text": "ABCD", "query": "query" }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(json["kind"], "InsufficientData");
    assert_eq!(json["stage"], "reduction");
}
