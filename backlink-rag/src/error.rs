//! Error types for the `backlink-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in retrieval, caching, and chunking operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while calling an LLM for structured generation.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The LLM provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An upstream call did not settle within its time budget.
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        /// The operation that was raced against the timer.
        operation: String,
        /// The budget that elapsed.
        after: Duration,
    },

    /// An error in retrieval or indexing orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
