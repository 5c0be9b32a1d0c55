//! Context retrieval for prompt injection.
//!
//! The [`RetrievalService`] embeds a chat query twice (as written, and with a
//! profile hint appended), searches the user's namespace with both vectors
//! concurrently, merges the hits, and selects a small set of results that
//! always includes the user's strongest profile facts.
//!
//! Retrieval is an enhancement: every failure, including missing providers,
//! resolves to an empty result list.
//!
//! # Example
//!
//! ```rust,ignore
//! use backlink_rag::{RetrievalService, RetrievalConfig, build_context_string};
//!
//! let service = RetrievalService::builder()
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_index(Arc::new(index))
//!     .config(RetrievalConfig::default())
//!     .build();
//!
//! let results = service.retrieve_context("user-42", "which sites did I shortlist?").await;
//! system_prompt.push_str(&build_context_string(&results));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::document::RagResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::text::truncate_chars;
use crate::timeout::with_timeout;
use crate::vectorstore::{MetadataFilter, VectorIndex, user_namespace};

/// Maximum characters of one result rendered into the context string.
const CONTEXT_CONTENT_CHARS: usize = 500;

const PROFILE_HEADER: &str = concat!(
    "## User Preferences and Profile ",
    "(facts the user has shared; use them to personalize answers):"
);
const HISTORY_HEADER: &str = "## Relevant Conversation History (from the user's previous chats):";

/// Orchestrates embedding, dual vector search, and result selection.
pub struct RetrievalService {
    config: RetrievalConfig,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl RetrievalService {
    /// Create a new [`RetrievalServiceBuilder`].
    pub fn builder() -> RetrievalServiceBuilder {
        RetrievalServiceBuilder::default()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Whether both the embedding provider and the vector index are present.
    pub fn is_configured(&self) -> bool {
        self.embedding_provider.is_some() && self.vector_index.is_some()
    }

    /// Retrieve context for a query using the service's configuration.
    pub async fn retrieve_context(&self, user_id: &str, query: &str) -> Vec<RagResult> {
        self.retrieve_context_with(user_id, query, &self.config).await
    }

    /// Retrieve context for a query with an explicit configuration.
    ///
    /// Never fails: missing providers, timeouts, and upstream errors all
    /// produce an empty list.
    pub async fn retrieve_context_with(
        &self,
        user_id: &str,
        query: &str,
        config: &RetrievalConfig,
    ) -> Vec<RagResult> {
        let (Some(embedder), Some(index)) = (&self.embedding_provider, &self.vector_index) else {
            warn!(user_id, "retrieval skipped: embedding provider or vector index not configured");
            return Vec::new();
        };

        match self.try_retrieve(embedder.as_ref(), index.as_ref(), user_id, query, config).await {
            Ok(results) => {
                info!(user_id, result_count = results.len(), "retrieved context");
                results
            }
            Err(e) => {
                warn!(user_id, error = %e, "retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    /// Rewrite the query with `rewrite` (if given), then retrieve context.
    ///
    /// A failed or empty rewrite falls back to the original query.
    pub async fn retrieve_context_with_rewrite<F, Fut>(
        &self,
        user_id: &str,
        query: &str,
        rewrite: Option<F>,
    ) -> Vec<RagResult>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let search_query = match rewrite {
            Some(rewrite) => match rewrite(query.to_string()).await {
                Ok(rewritten) if !rewritten.trim().is_empty() => {
                    debug!(user_id, original = query, rewritten = %rewritten, "query rewritten");
                    rewritten
                }
                Ok(_) => query.to_string(),
                Err(e) => {
                    warn!(user_id, error = %e, "query rewrite failed, using original query");
                    query.to_string()
                }
            },
            None => query.to_string(),
        };

        self.retrieve_context(user_id, &search_query).await
    }

    async fn try_retrieve(
        &self,
        embedder: &dyn EmbeddingProvider,
        index: &dyn VectorIndex,
        user_id: &str,
        query: &str,
        config: &RetrievalConfig,
    ) -> Result<Vec<RagResult>> {
        let query_embedding =
            with_timeout(config.timeout, "query embedding", embedder.embed(query)).await?;

        let profile_query = format!("{query} {}", config.profile_hint);
        let profile_embedding =
            match with_timeout(config.timeout, "profile embedding", embedder.embed(&profile_query))
                .await
            {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!(user_id, error = %e, "profile embedding failed, general search only");
                    None
                }
            };

        let namespace = user_namespace(user_id);
        let role_filter = (!config.include_roles.is_empty()).then(|| {
            MetadataFilter::one_of("role", config.include_roles.iter().map(|r| r.as_str()))
        });
        let profile_filter = match &role_filter {
            Some(roles) => MetadataFilter::eq("isProfile", true).and(roles.clone()),
            None => MetadataFilter::eq("isProfile", true),
        };

        let general_search = index.query(
            &namespace,
            &query_embedding,
            config.general_candidates(),
            role_filter.as_ref(),
        );
        let profile_search = async {
            match &profile_embedding {
                Some(embedding) => {
                    let candidates = config.profile_candidates();
                    index.query(&namespace, embedding, candidates, Some(&profile_filter)).await
                }
                None => Ok(Vec::new()),
            }
        };

        let (general, profile) = with_timeout(config.timeout, "vector search", async {
            let (general, profile) = tokio::join!(general_search, profile_search);
            Ok::<_, RagError>((general?, profile?))
        })
        .await?;

        debug!(
            user_id,
            general_hits = general.len(),
            profile_hits = profile.len(),
            "vector searches completed"
        );

        let candidates = general.into_iter().chain(profile).filter_map(RagResult::from_match);
        Ok(select_results(merge_by_id(candidates), config))
    }
}

/// Deduplicate by id, keeping the highest-scoring occurrence.
///
/// The output is sorted by descending score, ties broken by id.
pub fn merge_by_id(results: impl IntoIterator<Item = RagResult>) -> Vec<RagResult> {
    let mut best: HashMap<String, RagResult> = HashMap::new();
    for result in results {
        match best.get(&result.id) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                best.insert(result.id.clone(), result);
            }
        }
    }
    let mut merged: Vec<RagResult> = best.into_values().collect();
    sort_by_score(&mut merged);
    merged
}

fn sort_by_score(results: &mut [RagResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

/// Pick the final results from a merged, score-sorted candidate list.
///
/// 1. Keep candidates scoring at least `min_score`; if fewer than
///    `fallback_count` pass, keep the top `fallback_count` regardless.
/// 2. Always keep the top `profile_guarantee` profile candidates.
/// 3. Return at most `top_k`, sorted by score. Guaranteed profile results
///    claim their slots before the remaining ones are filled by score.
pub fn select_results(merged: Vec<RagResult>, config: &RetrievalConfig) -> Vec<RagResult> {
    let passing: Vec<&RagResult> =
        merged.iter().filter(|r| r.score >= config.min_score).collect();
    let thresholded: Vec<&RagResult> = if passing.len() < config.fallback_count {
        merged.iter().take(config.fallback_count).collect()
    } else {
        passing
    };

    let guaranteed: Vec<&RagResult> = merged
        .iter()
        .filter(|r| r.metadata.is_profile)
        .take(config.profile_guarantee.min(config.top_k))
        .collect();

    let mut selected: Vec<RagResult> = guaranteed.iter().map(|r| (*r).clone()).collect();
    for candidate in thresholded {
        if selected.len() >= config.top_k {
            break;
        }
        if !selected.iter().any(|s| s.id == candidate.id) {
            selected.push(candidate.clone());
        }
    }

    sort_by_score(&mut selected);
    selected
}

/// Render results as prompt sections.
///
/// Profile and preference results go under one header, everything else
/// under the conversation-history header. Empty sections are omitted; no
/// results render as an empty string.
pub fn build_context_string(results: &[RagResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let (personal, history): (Vec<&RagResult>, Vec<&RagResult>) =
        results.iter().partition(|r| r.is_personal());

    let mut context = String::new();
    for (header, section) in [(PROFILE_HEADER, &personal), (HISTORY_HEADER, &history)] {
        if section.is_empty() {
            continue;
        }
        context.push_str("\n\n");
        context.push_str(header);
        context.push('\n');
        for result in section {
            let content = result.content.trim();
            let shown = truncate_chars(content, CONTEXT_CONTENT_CHARS);
            let ellipsis = if shown.len() < content.len() { "..." } else { "" };
            context.push_str(&format!("- {shown}{ellipsis} (score={:.2})\n", result.score));
        }
    }
    context
}

/// Builder for constructing a [`RetrievalService`].
///
/// Providers are optional: a service built without them is valid and
/// returns no context.
#[derive(Default)]
pub struct RetrievalServiceBuilder {
    config: Option<RetrievalConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl RetrievalServiceBuilder {
    /// Set the retrieval configuration (defaults to [`RetrievalConfig::default`]).
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    pub fn build(self) -> RetrievalService {
        let service = RetrievalService {
            config: self.config.unwrap_or_default(),
            embedding_provider: self.embedding_provider,
            vector_index: self.vector_index,
        };
        if !service.is_configured() {
            warn!("retrieval service built without providers; context retrieval is disabled");
        }
        service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RagResultMetadata;

    fn result(id: &str, score: f32, is_profile: bool) -> RagResult {
        RagResult {
            id: id.to_string(),
            content: format!("content {id}"),
            score,
            metadata: RagResultMetadata { is_profile, ..Default::default() },
        }
    }

    #[test]
    fn merge_keeps_higher_score() {
        let merged = merge_by_id([
            result("a", 0.4, false),
            result("b", 0.5, false),
            result("a", 0.9, true),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "a");
        assert_eq!(merged[0].score, 0.9);
        assert!(merged[0].metadata.is_profile);
    }

    #[test]
    fn falls_back_to_top_three_when_scores_are_low() {
        let merged =
            merge_by_id((0..5).map(|i| result(&format!("r{i}"), 0.1 + i as f32 * 0.01, false)));
        let selected = select_results(merged, &RetrievalConfig::default());
        let ids: Vec<&str> = selected.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r4", "r3", "r2"]);
    }

    #[test]
    fn low_scoring_profile_result_survives_truncation() {
        let mut candidates: Vec<RagResult> =
            (0..8).map(|i| result(&format!("h{i}"), 0.9 - i as f32 * 0.01, false)).collect();
        candidates.push(result("profile", 0.05, true));
        let selected = select_results(merge_by_id(candidates), &RetrievalConfig::default());

        assert_eq!(selected.len(), 5);
        assert!(selected.iter().any(|r| r.id == "profile"));
        assert_eq!(selected.last().map(|r| r.id.as_str()), Some("profile"));
    }

    #[test]
    fn context_string_sections() {
        assert_eq!(build_context_string(&[]), "");

        let context = build_context_string(&[result("p", 0.81234, true)]);
        assert!(context.starts_with("\n\n## User Preferences and Profile"));
        assert!(context.contains("- content p (score=0.81)"));
        assert!(!context.contains("## Relevant Conversation History"));

        let context = build_context_string(&[result("p", 0.8, true), result("h", 0.7, false)]);
        let profile_at = context.find("## User Preferences").unwrap();
        let history_at = context.find("## Relevant Conversation History").unwrap();
        assert!(profile_at < history_at);
    }

    #[test]
    fn context_truncates_long_content() {
        let mut long = result("h", 0.5, false);
        long.content = "x".repeat(600);
        let context = build_context_string(&[long]);
        assert!(context.contains(&format!("- {}... (score=0.50)", "x".repeat(500))));
    }
}
