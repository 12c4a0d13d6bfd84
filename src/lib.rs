#![deny(missing_docs)]

//! Core library for the embedding visualizer: chunk a document, embed the chunks and a query,
//! project everything into 3D, and rank chunks by similarity to the query.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline run counters.
pub mod metrics;
/// Document processing pipeline.
pub mod processing;
