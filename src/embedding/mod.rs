//! Embedding client abstraction and the inference-service adapter.

use crate::processing::types::ErrorKind;
use async_trait::async_trait;
use futures_util::{
    future::{BoxFuture, FutureExt},
    stream::{self, StreamExt, TryStreamExt},
};
use std::time::Duration;
use thiserror::Error;

pub mod huggingface;

pub use huggingface::HuggingFaceClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Empty text was submitted; no request is made for it.
    #[error("embedding input must not be empty")]
    EmptyInput,
    /// Provider was unreachable, rejected the request, or returned an unusable payload.
    #[error("provider error: {0}")]
    Provider(String),
    /// Provider did not produce a vector within the allotted time.
    #[error("no embedding within {0:?}")]
    Timeout(Duration),
}

impl EmbeddingClientError {
    /// Classify the error within the pipeline taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput => ErrorKind::InvalidArgument,
            Self::Provider(_) => ErrorKind::ProviderError,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Failure of one element within a batch.
#[derive(Debug, Error)]
#[error("text {index}: {source}")]
pub struct BatchEmbeddingError {
    /// Position of the failing text in the batch.
    pub index: usize,
    /// Underlying client failure.
    #[source]
    pub source: EmbeddingClientError,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce the embedding vector for a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;

    /// Embed every text with at most `concurrency` requests in flight.
    ///
    /// Vectors come back in input order. The first failure stops the batch, drops requests
    /// still in flight, and reports the failing position.
    async fn embed_batch(
        &self,
        texts: &[String],
        concurrency: usize,
    ) -> Result<Vec<Vec<f32>>, BatchEmbeddingError> {
        let pending: Vec<BoxFuture<'_, Result<Vec<f32>, BatchEmbeddingError>>> = texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                async move {
                    self.embed(text)
                        .await
                        .map_err(|source| BatchEmbeddingError { index, source })
                }
                .boxed()
            })
            .collect();

        stream::iter(pending)
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }
}
