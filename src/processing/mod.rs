//! Document pipeline: sanitizing, chunking, projection, ranking, and orchestration.

pub mod chunking;
pub mod ranking;
pub mod reduction;
pub mod sanitize;
mod service;
pub mod types;

pub use reduction::{DimensionReducer, PcaReducer};
pub use service::{PipelineApi, PipelineService, PipelineSettings};
pub use types::{
    ChunkPoint, ChunkingError, EmbeddingUnit, ErrorKind, PipelineError, PipelineOutcome,
    PipelineRequest, QueryPoint, RankingError, ReductionError, ScoredIndex, Stage,
};
