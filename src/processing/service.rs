//! Pipeline orchestrator: chunking, embedding, projection, and ranking.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, HuggingFaceClient},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::chunk_text,
        ranking::{score_candidates, select_top},
        reduction::{DimensionReducer, PcaReducer, validate_matrix},
        sanitize::clean_text,
        types::{
            ChunkPoint, EmbeddingUnit, PipelineError, PipelineOutcome, PipelineRequest,
            QueryPoint, ReductionError,
        },
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Defaults applied when a request leaves a parameter unset.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Characters taken from the document per chunk.
    pub chunk_size: usize,
    /// Characters carried from one chunk into the next.
    pub chunk_overlap: usize,
    /// Number of best matches to highlight.
    pub result_size: usize,
    /// Maximum embedding requests in flight.
    pub embedding_concurrency: usize,
}

impl PipelineSettings {
    /// Extract pipeline defaults from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            result_size: config.result_size,
            embedding_concurrency: config.embedding_concurrency,
        }
    }
}

/// Runs the full pipeline for one document and one query.
///
/// Stages run strictly in sequence and every stage consumes the complete output of the previous
/// one. Position `i` refers to chunk `i` in every intermediate list; the query always occupies
/// the last position. Any failure aborts the run.
pub struct PipelineService {
    embedding_client: Box<dyn EmbeddingClient>,
    reducer: Box<dyn DimensionReducer>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Chunk, embed, project, and rank a document against a query.
    async fn run(&self, request: PipelineRequest) -> Result<PipelineOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl PipelineService {
    /// Assemble a service from explicit components.
    pub fn new(
        embedding_client: Box<dyn EmbeddingClient>,
        reducer: Box<dyn DimensionReducer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedding_client,
            reducer,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build the production service: remote embeddings and PCA projection.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        tracing::info!("Initializing embedding client");
        let client = HuggingFaceClient::from_config(config)?;
        Ok(Self::new(
            Box::new(client),
            Box::new(PcaReducer::new()),
            PipelineSettings::from_config(config),
        ))
    }

    /// Execute one pipeline run inside a span tagged with a fresh `run_id`.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", %run_id);
        let result = self.execute(run_id, request).instrument(span).await;

        match &result {
            Ok(outcome) => self.metrics.record_run(outcome.chunks.len() as u64),
            Err(error) => {
                self.metrics.record_failure();
                tracing::warn!(
                    %run_id,
                    stage = %error.stage(),
                    kind = %error.kind(),
                    unit = ?error.unit(),
                    error = %error,
                    "Pipeline run aborted"
                );
            }
        }
        result
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn execute(
        &self,
        run_id: Uuid,
        request: PipelineRequest,
    ) -> Result<PipelineOutcome, PipelineError> {
        let PipelineRequest {
            text,
            query,
            chunk_size,
            chunk_overlap,
            result_size,
            clean_text: clean,
        } = request;

        let chunk_size = chunk_size.unwrap_or(self.settings.chunk_size);
        let chunk_overlap = chunk_overlap.unwrap_or(self.settings.chunk_overlap);
        let result_size = result_size.unwrap_or(self.settings.result_size);

        if result_size == 0 {
            return Err(PipelineError::InvalidRequest(
                "result_size must be at least 1".into(),
            ));
        }
        if query.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "query text must not be empty".into(),
            ));
        }

        let document = if clean.unwrap_or(true) {
            clean_text(&text)
        } else {
            text
        };
        if document.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "document text must not be empty".into(),
            ));
        }

        let chunks = chunk_text(&document, chunk_size, chunk_overlap)?;
        tracing::info!(
            chunks = chunks.len(),
            chunk_size,
            chunk_overlap,
            characters = document.chars().count(),
            "Document chunked"
        );

        let mut vectors = self
            .embedding_client
            .embed_batch(&chunks, self.settings.embedding_concurrency)
            .await
            .map_err(|failure| PipelineError::Embedding {
                unit: EmbeddingUnit::Chunk(failure.index),
                source: failure.source,
            })?;
        debug_assert_eq!(vectors.len(), chunks.len());

        let query_vector = self
            .embedding_client
            .embed(&query)
            .await
            .map_err(|source| PipelineError::Embedding {
                unit: EmbeddingUnit::Query,
                source,
            })?;
        vectors.push(query_vector);

        let embedding_dimension = validate_matrix(&vectors)?;
        tracing::debug!(
            vectors = vectors.len(),
            embedding_dimension,
            "Embeddings collected"
        );

        let mut points = self.reducer.reduce(&vectors)?;
        if points.len() != vectors.len() {
            return Err(ReductionError::PointCountMismatch {
                expected: vectors.len(),
                actual: points.len(),
            }
            .into());
        }

        let scores = score_candidates(&vectors)?;
        let top_matches = select_top(scores.clone(), result_size)?;
        let ranks: HashMap<usize, usize> = top_matches
            .iter()
            .enumerate()
            .map(|(position, scored)| (scored.index, position + 1))
            .collect();

        let query_position = chunks.len();
        let query_point = points.pop().ok_or(ReductionError::PointCountMismatch {
            expected: vectors.len(),
            actual: 0,
        })?;

        let chunk_points = chunks
            .into_iter()
            .zip(points)
            .zip(scores)
            .enumerate()
            .map(|(index, ((text, point), scored))| {
                let rank = ranks.get(&index).copied();
                ChunkPoint {
                    index,
                    text,
                    point,
                    score: scored.score,
                    rank,
                    highlighted: rank.is_some(),
                }
            })
            .collect::<Vec<_>>();

        let top: Vec<usize> = top_matches.iter().map(|scored| scored.index).collect();
        tracing::info!(
            chunks = chunk_points.len(),
            embedding_dimension,
            ?top,
            "Pipeline run completed"
        );

        Ok(PipelineOutcome {
            run_id,
            chunks: chunk_points,
            query: QueryPoint {
                text: query,
                point: query_point,
                position: query_position,
            },
            top_matches,
            embedding_dimension,
            chunk_size,
            chunk_overlap,
        })
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn run(&self, request: PipelineRequest) -> Result<PipelineOutcome, PipelineError> {
        PipelineService::run(self, request).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }
}
