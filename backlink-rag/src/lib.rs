//! # backlink-rag
//!
//! Retrieval-augmented context for the publisher marketplace assistant.
//!
//! ## Components
//!
//! - [`DocumentChunker`]: splits extracted CSV, XLSX, DOCX, PDF and plain
//!   text into typed, prioritized chunks.
//! - [`DocumentIndexer`]: embeds chunks and chat turns into a per-user
//!   vector namespace.
//! - [`RetrievalService`]: dual (general + profile) vector search with
//!   threshold fallback and a profile guarantee, rendered into a prompt
//!   section by [`build_context_string`].
//! - [`SemanticCache`]: per-user cache keyed by query embedding similarity.
//! - [`QueryRewriter`]: LLM query expansion and topic extraction.
//!
//! Providers sit behind the [`EmbeddingProvider`], [`VectorIndex`] and
//! [`StructuredGenerator`] traits. OpenAI-compatible implementations are
//! available with the `openai` feature.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use backlink_rag::{InMemoryVectorIndex, RetrievalService, build_context_string};
//!
//! let index = Arc::new(InMemoryVectorIndex::new());
//! let service = RetrievalService::builder()
//!     .embedding_provider(embedder.clone())
//!     .vector_index(index)
//!     .build();
//!
//! let results = service.retrieve_context("user-42", "my budget for guest posts").await;
//! let context = build_context_string(&results);
//! ```

pub mod cache;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod formats;
pub mod indexer;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retrieval;
pub mod rewrite;
pub mod telemetry;
pub mod text;
pub mod timeout;
pub mod vectorstore;

pub use cache::{CacheStats, Clock, SemanticCache, SystemClock};
pub use chunking::{ColumnStatistics, DocumentChunker, Strategy, chunk_document};
pub use config::{CacheConfig, ChunkingConfig, RetrievalConfig};
pub use document::{
    Chunk, ChunkMetadata, ChunkType, ConversationMessage, DocumentInfo, Priority, RagResult,
    RagResultMetadata, Role, VectorMatch, VectorRecord,
};
pub use embedding::{EmbeddingProvider, cosine_similarity};
pub use error::{RagError, Result};
pub use formats::{
    ColumnType, CsvMetadata, DocumentMetadata, DocxMetadata, Heading, PdfMetadata, SheetMetadata,
    XlsxMetadata,
};
pub use indexer::DocumentIndexer;
pub use inmemory::InMemoryVectorIndex;
pub use retrieval::{RetrievalService, RetrievalServiceBuilder, build_context_string};
pub use rewrite::{QueryRewriter, StructuredGenerator};
pub use telemetry::init_tracing;
pub use vectorstore::{MetadataFilter, VectorIndex, user_namespace};
