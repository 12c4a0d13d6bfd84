//! HTTP surface consumed by the visualization layer.
//!
//! - `POST /visualize` – Chunk a document, embed the chunks and the query, project everything to
//!   3D, and return the chunks with their points, similarity scores, and top-match highlighting.
//! - `GET /metrics` – Observe run counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Failures are returned as `{ "error", "kind", "stage", "unit" }` so a client can name the failing
//! stage and, for embedding failures, the offending chunk.

use crate::metrics::MetricsSnapshot;
use crate::processing::{
    EmbeddingUnit, ErrorKind, PipelineApi, PipelineError, PipelineOutcome, PipelineRequest, Stage,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the pipeline.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/visualize", post(visualize::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Run the pipeline for one document and query.
///
/// Unset `chunk_size`, `chunk_overlap`, and `result_size` fall back to the configured defaults.
async fn visualize<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<PipelineRequest>,
) -> Result<Json<PipelineOutcome>, AppError>
where
    S: PipelineApi,
{
    let outcome = service.run(request).await?;
    tracing::info!(
        run_id = %outcome.run_id,
        chunks = outcome.chunks.len(),
        top_matches = outcome.top_matches.len(),
        "Visualize request completed"
    );
    Ok(Json(outcome))
}

/// Return a concise snapshot of run counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "visualize",
                method: "POST",
                path: "/visualize",
                description: "Chunk a document, embed chunks and query, project to 3D, and highlight the chunks most similar to the query.",
                request_example: Some(json!({
                    "text": "Document contents",
                    "query": "What is this about?",
                    "chunk_size": 1000,
                    "chunk_overlap": 200,
                    "result_size": 5,
                    "clean_text": true
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return run counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Error body returned for failed runs.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: ErrorKind,
    stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<EmbeddingUnit>,
}

struct AppError(PipelineError);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::InsufficientData
            | ErrorKind::InconsistentDimension
            | ErrorKind::DegenerateVector => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ProviderError => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
            stage: self.0.stage(),
            unit: self.0.unit(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
