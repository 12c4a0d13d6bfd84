//! Feature-extraction client for Hugging Face style inference endpoints.
//!
//! Each text is sent as `{"inputs": <text>, "options": {"wait_for_model": true}}` with a bearer
//! token. The endpoint answers with the embedding as a flat array of floats or as an array of
//! rows (the first row is used). While the model is still loading the service may answer `503`
//! with an `estimated_time`; the client sleeps and retries until the per-text timeout elapses.

use super::{EmbeddingClient, EmbeddingClientError};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// HTTP embedding client bound to one model endpoint.
pub struct HuggingFaceClient {
    http: Client,
    endpoint: String,
    token: String,
    timeout: Duration,
    min_retry_delay: Duration,
    max_retry_delay: Duration,
}

impl HuggingFaceClient {
    /// Build a client for `endpoint`, authenticating with `token`.
    ///
    /// `timeout` bounds each text end to end, including waits for a loading model.
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("embedscope/0.1")
            .build()
            .map_err(|error| {
                EmbeddingClientError::Provider(format!("failed to build HTTP client: {error}"))
            })?;
        let endpoint = endpoint.into();
        tracing::debug!(endpoint = %endpoint, ?timeout, "Initialized embedding client");
        Ok(Self {
            http,
            endpoint,
            token: token.into(),
            timeout,
            min_retry_delay: DEFAULT_MIN_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
        })
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        Self::new(
            config.embedding_endpoint(),
            config.hf_token.clone(),
            config.embedding_timeout,
        )
    }

    /// Bounds applied to the provider's `estimated_time` between loading retries.
    pub fn with_retry_window(mut self, min: Duration, max: Duration) -> Self {
        self.min_retry_delay = min;
        self.max_retry_delay = max.max(min);
        self
    }

    async fn embed_until_ready(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let mut attempt = 0_u32;
        loop {
            match self.request_once(text).await? {
                Attempt::Ready(vector) => return Ok(vector),
                Attempt::Loading { estimated } => {
                    attempt += 1;
                    let delay = self.retry_delay(estimated);
                    tracing::debug!(attempt, ?delay, "Model loading; retrying embedding");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn request_once(&self, text: &str) -> Result<Attempt, EmbeddingClientError> {
        let body = json!({
            "inputs": text,
            "options": { "wait_for_model": true }
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::Provider(format!(
                    "request to {} failed: {error}",
                    self.endpoint
                ))
            })?;

        let status = response.status();
        let payload = response.text().await.map_err(|error| {
            EmbeddingClientError::Provider(format!("failed to read response body: {error}"))
        })?;
        interpret_response(status, &payload)
    }

    fn retry_delay(&self, estimated: Option<f64>) -> Duration {
        estimated
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
            .unwrap_or(self.min_retry_delay)
            .clamp(self.min_retry_delay, self.max_retry_delay)
    }
}

#[async_trait]
impl EmbeddingClient for HuggingFaceClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        if text.is_empty() {
            return Err(EmbeddingClientError::EmptyInput);
        }
        match tokio::time::timeout(self.timeout, self.embed_until_ready(text)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Embedding request timed out");
                Err(EmbeddingClientError::Timeout(self.timeout))
            }
        }
    }
}

/// Outcome of a single provider round trip.
#[derive(Debug, PartialEq)]
enum Attempt {
    Ready(Vec<f32>),
    Loading { estimated: Option<f64> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProviderPayload {
    Flat(Vec<f32>),
    Rows(Vec<Vec<f32>>),
    Failure(ProviderFailure),
}

#[derive(Deserialize)]
struct ProviderFailure {
    error: Value,
    #[serde(default)]
    estimated_time: Option<f64>,
}

impl ProviderFailure {
    fn message(&self) -> String {
        match &self.error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        }
    }

    fn is_loading(&self, status: StatusCode) -> bool {
        status == StatusCode::SERVICE_UNAVAILABLE
            && (self.estimated_time.is_some() || self.message().to_lowercase().contains("loading"))
    }
}

/// Turn a provider response into a vector, a loading signal, or an error.
///
/// An error object is never accepted as an embedding, even with a success status.
fn interpret_response(status: StatusCode, body: &str) -> Result<Attempt, EmbeddingClientError> {
    let parsed = serde_json::from_str::<ProviderPayload>(body);

    if !status.is_success() {
        return match parsed {
            Ok(ProviderPayload::Failure(failure)) if failure.is_loading(status) => {
                Ok(Attempt::Loading {
                    estimated: failure.estimated_time,
                })
            }
            Ok(ProviderPayload::Failure(failure)) => Err(EmbeddingClientError::Provider(format!(
                "{status}: {}",
                failure.message()
            ))),
            _ => Err(EmbeddingClientError::Provider(format!(
                "{status}: {}",
                body.trim()
            ))),
        };
    }

    let vector = match parsed {
        Ok(ProviderPayload::Flat(vector)) => vector,
        Ok(ProviderPayload::Rows(rows)) => rows.into_iter().next().unwrap_or_default(),
        Ok(ProviderPayload::Failure(failure)) => {
            return Err(EmbeddingClientError::Provider(failure.message()));
        }
        Err(error) => {
            return Err(EmbeddingClientError::Provider(format!(
                "unrecognized embedding payload: {error}"
            )));
        }
    };

    if vector.is_empty() {
        return Err(EmbeddingClientError::Provider(
            "provider returned an empty embedding".to_string(),
        ));
    }
    Ok(Attempt::Ready(vector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    const MODEL_PATH: &str = "/models/test-model";

    fn client_for(server: &MockServer, timeout: Duration) -> HuggingFaceClient {
        HuggingFaceClient::new(server.url(MODEL_PATH), "hf_test", timeout)
            .expect("client")
            .with_retry_window(Duration::from_millis(10), Duration::from_millis(20))
    }

    #[tokio::test]
    async fn sends_wait_for_model_request_with_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(MODEL_PATH)
                    .header("authorization", "Bearer hf_test")
                    .json_body(json!({
                        "inputs": "hello world",
                        "options": { "wait_for_model": true }
                    }));
                then.status(200).json_body(json!([0.25, -0.5, 1.0]));
            })
            .await;

        let vector = client_for(&server, Duration::from_secs(5))
            .embed("hello world")
            .await
            .expect("embedding");

        mock.assert_async().await;
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn takes_first_row_of_nested_payload() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(200)
                    .json_body(json!([[0.1, 0.2], [0.9, 0.8]]));
            })
            .await;

        let vector = client_for(&server, Duration::from_secs(5))
            .embed("nested")
            .await
            .expect("embedding");
        assert_eq!(vector, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn empty_text_fails_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(200).json_body(json!([1.0]));
            })
            .await;

        let error = client_for(&server, Duration::from_secs(5))
            .embed("")
            .await
            .unwrap_err();

        assert!(matches!(error, EmbeddingClientError::EmptyInput));
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn provider_failure_carries_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(400)
                    .json_body(json!({ "error": "Authorization header is invalid" }));
            })
            .await;

        let error = client_for(&server, Duration::from_secs(5))
            .embed("text")
            .await
            .unwrap_err();
        match error {
            EmbeddingClientError::Provider(message) => {
                assert!(message.contains("Authorization header is invalid"), "{message}");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn model_that_never_loads_times_out() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(503).json_body(json!({
                    "error": "Model test-model is currently loading",
                    "estimated_time": 0.01
                }));
            })
            .await;

        let error = client_for(&server, Duration::from_millis(250))
            .embed("text")
            .await
            .unwrap_err();

        assert!(matches!(error, EmbeddingClientError::Timeout(_)));
        assert!(mock.hits_async().await >= 2);
    }

    #[tokio::test]
    async fn retries_transparently_until_model_is_ready() {
        let server = MockServer::start_async().await;
        let loading = server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(503).json_body(json!({
                    "error": "Model test-model is currently loading",
                    "estimated_time": 0.3
                }));
            })
            .await;

        let client =
            HuggingFaceClient::new(server.url(MODEL_PATH), "hf_test", Duration::from_secs(5))
                .expect("client")
                .with_retry_window(Duration::from_millis(300), Duration::from_millis(300));
        let pending = tokio::spawn(async move { client.embed("text").await });

        while loading.hits_async().await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        loading.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(MODEL_PATH);
                then.status(200).json_body(json!([0.5, 0.5]));
            })
            .await;

        let vector = pending.await.expect("join").expect("embedding");
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[test]
    fn error_payload_with_success_status_is_not_an_embedding() {
        let result = interpret_response(StatusCode::OK, r#"{"error": "boom"}"#);
        assert!(matches!(
            result,
            Err(EmbeddingClientError::Provider(ref message)) if message == "boom"
        ));
    }

    #[test]
    fn loading_requires_service_unavailable() {
        let body = r#"{"error": "Model is currently loading", "estimated_time": 12.5}"#;
        assert_eq!(
            interpret_response(StatusCode::SERVICE_UNAVAILABLE, body).expect("attempt"),
            Attempt::Loading {
                estimated: Some(12.5)
            }
        );
        assert!(interpret_response(StatusCode::INTERNAL_SERVER_ERROR, body).is_err());
    }

    #[test]
    fn rejects_unrecognized_and_empty_payloads() {
        assert!(interpret_response(StatusCode::OK, "[[[0.1, 0.2]]]").is_err());
        assert!(interpret_response(StatusCode::OK, "[]").is_err());
        assert!(interpret_response(StatusCode::OK, "not json").is_err());
    }

    #[test]
    fn retry_delay_clamps_estimate() {
        let client =
            HuggingFaceClient::new("http://127.0.0.1:1/model", "token", Duration::from_secs(1))
                .expect("client")
                .with_retry_window(Duration::from_millis(100), Duration::from_secs(2));
        assert_eq!(client.retry_delay(Some(30.0)), Duration::from_secs(2));
        assert_eq!(client.retry_delay(Some(0.01)), Duration::from_millis(100));
        assert_eq!(client.retry_delay(None), Duration::from_millis(100));
        assert_eq!(client.retry_delay(Some(0.5)), Duration::from_millis(500));
        assert_eq!(client.retry_delay(Some(f64::NAN)), Duration::from_millis(100));
    }
}
