//! Configuration for chunking, retrieval, and the semantic cache.
//!
//! Every config type has a `Default` matching production values and a
//! builder whose `build()` validates the combination of parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::Role;
use crate::error::{RagError, Result};

/// Suffix appended to a query to bias its embedding toward personal facts.
pub const DEFAULT_PROFILE_HINT: &str =
    "user profile preference favorite company ownership identity";

/// Parameters for the document chunking engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkingConfig {
    /// Maximum paragraph-chunk size in characters.
    pub chunk_size: usize,
    /// Number of trailing characters of a chunk carried into the next one.
    pub chunk_overlap: usize,
    /// Rows per CSV row-block chunk.
    pub csv_rows_per_block: usize,
    /// Paragraphs per DOCX paragraph-block chunk.
    pub docx_paragraphs_per_block: usize,
    /// Hard upper bound on the text length of any chunk, in characters.
    pub max_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            csv_rows_per_block: 20,
            docx_paragraphs_per_block: 3,
            max_chunk_chars: 8000,
        }
    }
}

impl ChunkingConfig {
    /// Create a new builder for constructing a [`ChunkingConfig`].
    pub fn builder() -> ChunkingConfigBuilder {
        ChunkingConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - either block size is zero
    /// - `max_chunk_chars < chunk_size`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.csv_rows_per_block == 0 || self.docx_paragraphs_per_block == 0 {
            return Err(RagError::ConfigError("block sizes must be greater than zero".to_string()));
        }
        if self.max_chunk_chars < self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "max_chunk_chars ({}) must be at least chunk_size ({})",
                self.max_chunk_chars, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`ChunkingConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChunkingConfigBuilder {
    config: ChunkingConfig,
}

impl ChunkingConfigBuilder {
    /// Set the maximum paragraph-chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive paragraph chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of rows per CSV row-block chunk.
    pub fn csv_rows_per_block(mut self, rows: usize) -> Self {
        self.config.csv_rows_per_block = rows;
        self
    }

    /// Set the number of paragraphs per DOCX paragraph-block chunk.
    pub fn docx_paragraphs_per_block(mut self, paragraphs: usize) -> Self {
        self.config.docx_paragraphs_per_block = paragraphs;
        self
    }

    /// Set the hard upper bound on chunk text length.
    pub fn max_chunk_chars(mut self, chars: usize) -> Self {
        self.config.max_chunk_chars = chars;
        self
    }

    /// Build the [`ChunkingConfig`], validating that parameters are consistent.
    pub fn build(self) -> Result<ChunkingConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Parameters for context retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Maximum number of results returned.
    pub top_k: usize,
    /// Minimum cosine similarity for a result to pass the threshold.
    pub min_score: f32,
    /// Roles to search; empty means no role filter.
    pub include_roles: Vec<Role>,
    /// Budget shared by the query embedding and by the pair of vector searches.
    pub timeout: Duration,
    /// Number of top results kept when too few pass `min_score`.
    pub fallback_count: usize,
    /// Number of profile results always carried into the output.
    pub profile_guarantee: usize,
    /// Upper bound on profile-search candidates.
    pub profile_candidates_cap: usize,
    /// Text appended to the query for the profile-focused embedding.
    pub profile_hint: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.3,
            include_roles: vec![Role::User, Role::Assistant],
            timeout: Duration::from_millis(5000),
            fallback_count: 3,
            profile_guarantee: 3,
            profile_candidates_cap: 10,
            profile_hint: DEFAULT_PROFILE_HINT.to_string(),
        }
    }
}

impl RetrievalConfig {
    /// Create a new builder for constructing a [`RetrievalConfig`].
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Number of candidates requested from the general search.
    pub fn general_candidates(&self) -> usize {
        self.top_k.saturating_mul(3)
    }

    /// Number of candidates requested from the profile search.
    pub fn profile_candidates(&self) -> usize {
        self.top_k.saturating_mul(2).min(self.profile_candidates_cap)
    }
}

/// Builder for constructing a validated [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Set the maximum number of results returned.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the similarity threshold.
    pub fn min_score(mut self, score: f32) -> Self {
        self.config.min_score = score;
        self
    }

    /// Set the roles to search.
    pub fn include_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.config.include_roles = roles.into_iter().collect();
        self
    }

    /// Set the upstream call budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set how many top results are kept when the threshold filters too many.
    pub fn fallback_count(mut self, count: usize) -> Self {
        self.config.fallback_count = count;
        self
    }

    /// Set how many profile results are always carried into the output.
    pub fn profile_guarantee(mut self, count: usize) -> Self {
        self.config.profile_guarantee = count;
        self
    }

    /// Set the upper bound on profile-search candidates.
    pub fn profile_candidates_cap(mut self, cap: usize) -> Self {
        self.config.profile_candidates_cap = cap;
        self
    }

    /// Set the text appended to the query for the profile embedding.
    pub fn profile_hint(mut self, hint: impl Into<String>) -> Self {
        self.config.profile_hint = hint.into();
        self
    }

    /// Build the [`RetrievalConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `min_score` is outside `[0, 1]`
    /// - `timeout` is zero
    pub fn build(self) -> Result<RetrievalConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.config.min_score) {
            return Err(RagError::ConfigError(format!(
                "min_score ({}) must be within [0, 1]",
                self.config.min_score
            )));
        }
        if self.config.timeout.is_zero() {
            return Err(RagError::ConfigError("timeout must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

/// Parameters for the semantic cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Age after which an entry is treated as absent.
    pub ttl: Duration,
    /// Maximum number of entries held.
    pub max_size: usize,
    /// Minimum cosine similarity for a lookup to hit.
    pub similarity_threshold: f32,
    /// Fraction of entries (oldest first) evicted when the cache is full.
    pub eviction_fraction: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_size: 1000,
            similarity_threshold: 0.95,
            eviction_fraction: 0.1,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for constructing a [`CacheConfig`].
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Number of entries removed by one capacity eviction (at least one).
    pub fn eviction_batch(&self) -> usize {
        ((self.max_size as f32 * self.eviction_fraction).floor() as usize).max(1)
    }
}

/// Builder for constructing a validated [`CacheConfig`].
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set the entry time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Set the maximum number of entries.
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Set the similarity needed for a hit.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the fraction of entries evicted when full.
    pub fn eviction_fraction(mut self, fraction: f32) -> Self {
        self.config.eviction_fraction = fraction;
        self
    }

    /// Build the [`CacheConfig`], validating that parameters are consistent.
    pub fn build(self) -> Result<CacheConfig> {
        if self.config.max_size == 0 {
            return Err(RagError::ConfigError("max_size must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.config.similarity_threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({}) must be within [0, 1]",
                self.config.similarity_threshold
            )));
        }
        if !(self.config.eviction_fraction > 0.0 && self.config.eviction_fraction <= 1.0) {
            return Err(RagError::ConfigError(format!(
                "eviction_fraction ({}) must be within (0, 1]",
                self.config.eviction_fraction
            )));
        }
        Ok(self.config)
    }
}
