//! Core data types and error definitions for the processing pipeline.

use crate::embedding::EmbeddingClientError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy shared by every pipeline component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Bad chunking parameters, empty text, or another rejected input.
    InvalidArgument,
    /// Required credentials or settings are absent.
    ConfigurationMissing,
    /// The embedding endpoint failed or returned an unusable payload.
    ProviderError,
    /// An embedding did not complete within its timeout.
    Timeout,
    /// Embedding vectors do not share a single dimension.
    InconsistentDimension,
    /// Too few vectors for the requested operation.
    InsufficientData,
    /// A zero-magnitude vector reached similarity scoring.
    DegenerateVector,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors produced while splitting raw text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Chunking was requested with an impossible window.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

impl ChunkingError {
    /// Classify the error within the pipeline taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Errors produced while projecting embeddings into three dimensions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReductionError {
    /// Fewer vectors than projected components.
    #[error("at least {required} vectors are required for a 3D projection, got {actual}")]
    InsufficientData {
        /// Minimum number of vectors accepted.
        required: usize,
        /// Number of vectors supplied.
        actual: usize,
    },
    /// Input matrix was ragged.
    #[error("vector {index} has dimension {actual}, expected {expected}")]
    InconsistentDimension {
        /// Position of the offending vector.
        index: usize,
        /// Dimension of the first vector.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Decomposition did not converge.
    #[error("singular value decomposition failed to converge")]
    DecompositionFailed,
    /// Reducer returned a different number of points than vectors it was given.
    #[error("reducer returned {actual} points for {expected} vectors")]
    PointCountMismatch {
        /// Number of vectors passed to the reducer.
        expected: usize,
        /// Number of points it returned.
        actual: usize,
    },
}

impl ReductionError {
    /// Classify the error within the pipeline taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientData { .. } | Self::DecompositionFailed => {
                ErrorKind::InsufficientData
            }
            Self::InconsistentDimension { .. } | Self::PointCountMismatch { .. } => {
                ErrorKind::InconsistentDimension
            }
        }
    }
}

/// Errors produced while ranking candidates against the query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankingError {
    /// Ranking needs at least the query vector.
    #[error("no query vector supplied")]
    MissingQuery,
    /// The caller asked for zero results.
    #[error("result size must be greater than zero")]
    InvalidResultSize,
    /// A vector with zero magnitude cannot be compared by angle.
    #[error("vector {index} has zero magnitude")]
    DegenerateVector {
        /// Position of the zero vector (the query sits last).
        index: usize,
    },
    /// A candidate and the query disagree on dimension.
    #[error("vector {index} has dimension {actual}, query has {expected}")]
    InconsistentDimension {
        /// Position of the offending candidate.
        index: usize,
        /// Query dimension.
        expected: usize,
        /// Candidate dimension.
        actual: usize,
    },
}

impl RankingError {
    /// Classify the error within the pipeline taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingQuery => ErrorKind::InsufficientData,
            Self::InvalidResultSize => ErrorKind::InvalidArgument,
            Self::DegenerateVector { .. } => ErrorKind::DegenerateVector,
            Self::InconsistentDimension { .. } => ErrorKind::InconsistentDimension,
        }
    }
}

/// Text unit submitted to the embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "index")]
pub enum EmbeddingUnit {
    /// Chunk at the given position.
    Chunk(usize),
    /// The query text, always embedded after every chunk.
    Query,
}

impl fmt::Display for EmbeddingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk(index) => write!(f, "chunk {index}"),
            Self::Query => f.write_str("query"),
        }
    }
}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Request validation before any component ran.
    Request,
    /// Text segmentation.
    Chunking,
    /// Embedding acquisition.
    Embedding,
    /// 3D projection.
    Reduction,
    /// Similarity ranking.
    Ranking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Request => "request",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Reduction => "reduction",
            Self::Ranking => "ranking",
        };
        f.write_str(label)
    }
}

/// Errors emitted by the pipeline orchestrator. Any of them aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request parameters were rejected before processing.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed for a specific unit.
    #[error("Failed to embed {unit}: {source}")]
    Embedding {
        /// Unit whose embedding failed.
        unit: EmbeddingUnit,
        /// Underlying client failure.
        #[source]
        source: EmbeddingClientError,
    },
    /// Projection to 3D failed.
    #[error("Failed to reduce embeddings: {0}")]
    Reduction(#[from] ReductionError),
    /// Similarity ranking failed.
    #[error("Failed to rank chunks: {0}")]
    Ranking(#[from] RankingError),
}

impl PipelineError {
    /// Classify the error within the pipeline taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidArgument,
            Self::Chunking(error) => error.kind(),
            Self::Embedding { source, .. } => source.kind(),
            Self::Reduction(error) => error.kind(),
            Self::Ranking(error) => error.kind(),
        }
    }

    /// Stage that produced the failure.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidRequest(_) => Stage::Request,
            Self::Chunking(_) => Stage::Chunking,
            Self::Embedding { .. } => Stage::Embedding,
            Self::Reduction(_) => Stage::Reduction,
            Self::Ranking(_) => Stage::Ranking,
        }
    }

    /// Embedding unit involved in the failure, when one is known.
    pub fn unit(&self) -> Option<EmbeddingUnit> {
        match self {
            Self::Embedding { unit, .. } => Some(*unit),
            _ => None,
        }
    }
}

/// Parameters supplied to a single pipeline run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineRequest {
    /// Plain document text, already extracted from its source format.
    pub text: String,
    /// Query text compared against every chunk.
    pub query: String,
    /// Optional override for the chunk window.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Optional override for the chunk overlap.
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    /// Optional override for the number of highlighted matches.
    #[serde(default)]
    pub result_size: Option<usize>,
    /// Whether to normalize the document text before chunking (defaults to `true`).
    #[serde(default)]
    pub clean_text: Option<bool>,
}

/// Chunk index paired with its cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredIndex {
    /// Position of the chunk.
    pub index: usize,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Display-ready record for one chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPoint {
    /// Position of the chunk in document order.
    pub index: usize,
    /// Chunk text.
    pub text: String,
    /// Projected coordinates.
    pub point: [f32; 3],
    /// Cosine similarity to the query in the full embedding space.
    pub score: f32,
    /// One-based rank when the chunk is within the top matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    /// Whether the chunk belongs to the top matches.
    pub highlighted: bool,
}

/// Display-ready record for the query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPoint {
    /// Query text.
    pub text: String,
    /// Projected coordinates, sharing the chunk projection.
    pub point: [f32; 3],
    /// Position of the query within the embedded batch (always the last one).
    pub position: usize,
}

/// Result of a completed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Identifier attached to the run's log span.
    pub run_id: Uuid,
    /// Chunks in document order.
    pub chunks: Vec<ChunkPoint>,
    /// The query's projected point.
    pub query: QueryPoint,
    /// Best-matching chunks, best first.
    pub top_matches: Vec<ScoredIndex>,
    /// Dimension of the raw embeddings.
    pub embedding_dimension: usize,
    /// Chunk window used for this run.
    pub chunk_size: usize,
    /// Overlap used for this run.
    pub chunk_overlap: usize,
}

impl PipelineOutcome {
    /// Indices of the highlighted chunks, best first.
    pub fn top_indices(&self) -> Vec<usize> {
        self.top_matches.iter().map(|scored| scored.index).collect()
    }
}
