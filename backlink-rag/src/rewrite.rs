//! LLM-backed query expansion and topic extraction.
//!
//! Both operations are enhancements: on any failure they return the neutral
//! value (the original query, or no topics).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::text::first_sentences;

const MAX_REWRITE_SENTENCES: usize = 2;
const MAX_TOPICS: usize = 5;

/// An LLM endpoint that returns a JSON object conforming to a schema.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Generate an object for `prompt` that conforms to the JSON `schema`.
    async fn generate_object(&self, prompt: &str, schema: &Value) -> Result<Value>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpandedQuery {
    expanded_query: String,
}

#[derive(Deserialize)]
struct Topics {
    topics: Vec<String>,
}

/// Expands chat queries into richer search queries.
pub struct QueryRewriter {
    generator: Arc<dyn StructuredGenerator>,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    /// Expand `query` with synonyms and related terms.
    ///
    /// Returns the original query on failure or when the expansion is empty.
    pub async fn rewrite_query(&self, query: &str) -> String {
        match self.try_rewrite(query).await {
            Ok(expanded) if !expanded.is_empty() => {
                debug!(original = query, expanded = %expanded, "rewrote query");
                expanded
            }
            Ok(_) => query.to_string(),
            Err(e) => {
                warn!(error = %e, "query rewrite failed, keeping original query");
                query.to_string()
            }
        }
    }

    /// Extract 2–5 short topic labels from `query`; empty on failure.
    pub async fn extract_topics(&self, query: &str) -> Vec<String> {
        match self.try_extract_topics(query).await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(error = %e, "topic extraction failed");
                Vec::new()
            }
        }
    }

    /// Fallible expansion, for use with
    /// [`RetrievalService::retrieve_context_with_rewrite`].
    ///
    /// [`RetrievalService::retrieve_context_with_rewrite`]:
    ///     crate::RetrievalService::retrieve_context_with_rewrite
    pub async fn try_rewrite(&self, query: &str) -> Result<String> {
        let prompt = format!(
            "Rewrite the following search query for semantic retrieval over a user's chat history \
             and uploaded documents about publishers, websites and backlinks. Expand it with \
             synonyms, related terms, and broader or narrower concepts. Answer in at most \
             {MAX_REWRITE_SENTENCES} sentences.\n\nQuery: {query}"
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "expandedQuery": {
                    "type": "string",
                    "description": "The expanded search query, at most two sentences"
                }
            },
            "required": ["expandedQuery"],
            "additionalProperties": false
        });

        let value = self.generator.generate_object(&prompt, &schema).await?;
        let parsed: ExpandedQuery = serde_json::from_value(value).map_err(malformed)?;
        Ok(first_sentences(parsed.expanded_query.trim(), MAX_REWRITE_SENTENCES).to_string())
    }

    async fn try_extract_topics(&self, query: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "List 2 to 5 short topic labels (one to three words each) describing the \
             following query.\n\nQuery: {query}"
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "topics": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 2,
                    "maxItems": MAX_TOPICS
                }
            },
            "required": ["topics"],
            "additionalProperties": false
        });

        let value = self.generator.generate_object(&prompt, &schema).await?;
        let parsed: Topics = serde_json::from_value(value).map_err(malformed)?;
        Ok(parsed
            .topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_TOPICS)
            .collect())
    }
}

fn malformed(e: serde_json::Error) -> RagError {
    RagError::GenerationError {
        provider: "structured".to_string(),
        message: format!("response does not match schema: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Value>);

    #[async_trait]
    impl StructuredGenerator for Fixed {
        async fn generate_object(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
            match &self.0 {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(RagError::GenerationError {
                    provider: "test".into(),
                    message: e.to_string(),
                }),
            }
        }
    }

    fn rewriter(response: Result<Value>) -> QueryRewriter {
        QueryRewriter::new(Arc::new(Fixed(response)))
    }

    #[tokio::test]
    async fn returns_expansion() {
        let rewriter = rewriter(Ok(json!({"expandedQuery": "tech blogs with high domain rating"})));
        assert_eq!(
            rewriter.rewrite_query("tech sites").await,
            "tech blogs with high domain rating"
        );
    }

    #[tokio::test]
    async fn keeps_at_most_two_sentences() {
        let rewriter = rewriter(Ok(json!({"expandedQuery": "One. Two. Three."})));
        assert_eq!(rewriter.rewrite_query("q").await, "One. Two.");
    }

    #[tokio::test]
    async fn falls_back_to_original_query() {
        let failing = rewriter(Err(RagError::PipelineError("down".into())));
        assert_eq!(failing.rewrite_query("original").await, "original");

        let empty = rewriter(Ok(json!({"expandedQuery": "  "})));
        assert_eq!(empty.rewrite_query("original").await, "original");

        let malformed = rewriter(Ok(json!({"unexpected": true})));
        assert_eq!(malformed.rewrite_query("original").await, "original");
    }

    #[tokio::test]
    async fn extracts_topics() {
        let topics = json!({"topics": [" SEO ", "", "guest posts", "a", "b", "c", "d"]});
        let rewriter = rewriter(Ok(topics));
        assert_eq!(rewriter.extract_topics("q").await, vec!["SEO", "guest posts", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn topic_failure_is_empty() {
        let failing = rewriter(Err(RagError::PipelineError("down".into())));
        assert!(failing.extract_topics("q").await.is_empty());
    }
}
