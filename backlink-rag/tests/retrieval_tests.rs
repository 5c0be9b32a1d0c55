//! Retrieval service behaviour: fail-open, fallback, profile guarantee, and
//! end-to-end indexing through the in-memory index.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use backlink_rag::{
    ChunkingConfig, ConversationMessage, DocumentChunker, DocumentIndexer, DocumentInfo,
    EmbeddingProvider, InMemoryVectorIndex, MetadataFilter, QueryRewriter, RagError, Result,
    RetrievalConfig, RetrievalService, Role, StructuredGenerator, VectorIndex, VectorMatch,
    VectorRecord, build_context_string,
};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

/// Returns a constant vector and records every text it embeds.
#[derive(Default)]
struct RecordingEmbedder {
    seen: Mutex<Vec<String>>,
}

impl RecordingEmbedder {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(vec![1.0, 0.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        3
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "test".into(), message: "unavailable".into() })
    }

    fn dimensions(&self) -> usize {
        3
    }
}

const VOCABULARY: &[&str] =
    &["site", "traffic", "domain", "rating", "budget", "dr", "travel", "blog"];

struct VocabularyEmbedder;

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; VOCABULARY.len()];
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if let Some(position) = VOCABULARY.iter().position(|v| v.eq_ignore_ascii_case(word)) {
                vector[position] += 1.0;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len()
    }
}

/// Serves a fixed set of hits, honouring filters and `top_k` but not the vector.
struct ScriptedIndex {
    hits: Vec<VectorMatch>,
    delay: Option<Duration>,
    fail: bool,
}

impl ScriptedIndex {
    fn new(hits: Vec<VectorMatch>) -> Self {
        Self { hits, delay: None, fail: false }
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn upsert(&self, _namespace: &str, _records: &[VectorRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _namespace: &str,
        _vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            let backend = "scripted".into();
            return Err(RagError::VectorStoreError { backend, message: "503".into() });
        }
        Ok(self
            .hits
            .iter()
            .filter(|hit| filter.is_none_or(|f| f.matches(&hit.metadata)))
            .take(top_k)
            .cloned()
            .collect())
    }
}

fn hit(id: &str, score: f32, role: &str, is_profile: bool) -> VectorMatch {
    let Value::Object(metadata) = json!({
        "text": format!("message {id}"),
        "role": role,
        "isProfile": is_profile,
        "chatId": "chat-1",
    }) else {
        unreachable!()
    };
    VectorMatch { id: id.into(), score, metadata }
}

fn service(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> RetrievalService {
    RetrievalService::builder().embedding_provider(embedder).vector_index(index).build()
}

fn scripted_service(hits: Vec<VectorMatch>) -> RetrievalService {
    service(Arc::new(RecordingEmbedder::default()), Arc::new(ScriptedIndex::new(hits)))
}

#[tokio::test]
async fn unconfigured_service_returns_nothing() {
    let service = RetrievalService::builder().build();
    assert!(!service.is_configured());
    assert!(service.retrieve_context("user-1", "anything").await.is_empty());
}

#[tokio::test]
async fn embedding_failure_returns_nothing() {
    let index = Arc::new(ScriptedIndex::new(vec![hit("a", 0.9, "user", false)]));
    let service = service(Arc::new(FailingEmbedder), index);
    assert!(service.retrieve_context("user-1", "anything").await.is_empty());
}

#[tokio::test]
async fn search_failure_returns_nothing() {
    let index =
        ScriptedIndex { fail: true, ..ScriptedIndex::new(vec![hit("a", 0.9, "user", false)]) };
    let service = service(Arc::new(RecordingEmbedder::default()), Arc::new(index));
    assert!(service.retrieve_context("user-1", "anything").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_search_times_out_to_nothing() {
    let index = ScriptedIndex {
        delay: Some(Duration::from_secs(30)),
        ..ScriptedIndex::new(vec![hit("a", 0.9, "user", false)])
    };
    let config = RetrievalConfig::builder().timeout(Duration::from_millis(50)).build().unwrap();
    let service = RetrievalService::builder()
        .embedding_provider(Arc::new(RecordingEmbedder::default()))
        .vector_index(Arc::new(index))
        .config(config)
        .build();

    assert!(service.retrieve_context("user-1", "anything").await.is_empty());
}

#[tokio::test]
async fn low_scores_fall_back_to_top_three() {
    let hits = vec![
        hit("a", 0.10, "user", false),
        hit("b", 0.25, "assistant", false),
        hit("c", 0.05, "user", false),
        hit("d", 0.20, "user", false),
        hit("e", 0.15, "assistant", false),
    ];
    let service = scripted_service(hits);

    let results = service.retrieve_context("user-1", "what did I ask about").await;
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "d", "e"]);
}

#[tokio::test]
async fn low_scoring_profile_fact_is_always_included() {
    let hits =
        (0..10).map(|i| hit(&format!("h{i}"), 0.95 - i as f32 * 0.05, "assistant", false));
    let mut hits: Vec<VectorMatch> = hits.collect();
    hits.push(hit("profile", 0.12, "user", true));
    let service = scripted_service(hits);

    let results = service.retrieve_context("user-1", "recommend publishers").await;
    assert_eq!(results.len(), 5);
    assert!(results.iter().any(|r| r.id == "profile" && r.metadata.is_profile));
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn role_filter_excludes_system_turns() {
    let hits = vec![hit("sys", 0.99, "system", false), hit("u", 0.8, "user", false)];
    let service = scripted_service(hits);

    let results = service.retrieve_context("user-1", "q").await;
    assert!(results.iter().all(|r| r.id != "sys"));
}

#[tokio::test]
async fn duplicate_hits_are_merged() {
    let hits = vec![hit("p", 0.7, "user", true), hit("h", 0.6, "assistant", false)];
    let service = scripted_service(hits);

    let results = service.retrieve_context("user-1", "q").await;
    assert_eq!(results.iter().filter(|r| r.id == "p").count(), 1);
}

#[tokio::test]
async fn profile_search_uses_hinted_query() {
    let embedder = Arc::new(RecordingEmbedder::default());
    let index = Arc::new(ScriptedIndex::new(Vec::new()));
    let service = service(embedder.clone(), index);

    service.retrieve_context("user-1", "best sites").await;
    let seen = embedder.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], "best sites");
    assert!(seen[1].starts_with("best sites "));
    assert!(seen[1].len() > "best sites ".len());
}

struct FailingGenerator;

#[async_trait]
impl StructuredGenerator for FailingGenerator {
    async fn generate_object(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
        Err(RagError::GenerationError { provider: "test".into(), message: "rate limited".into() })
    }
}

struct ExpandingGenerator;

#[async_trait]
impl StructuredGenerator for ExpandingGenerator {
    async fn generate_object(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
        Ok(json!({ "expandedQuery": "high traffic travel blogs accepting guest posts" }))
    }
}

#[tokio::test]
async fn rewrite_is_used_when_it_succeeds() {
    let embedder = Arc::new(RecordingEmbedder::default());
    let service = service(embedder.clone(), Arc::new(ScriptedIndex::new(Vec::new())));
    let rewriter = QueryRewriter::new(Arc::new(ExpandingGenerator));
    let rewriter = &rewriter;

    service
        .retrieve_context_with_rewrite("user-1", "travel blogs", Some(move |q: String| async move {
            rewriter.try_rewrite(&q).await
        }))
        .await;
    assert_eq!(embedder.seen()[0], "high traffic travel blogs accepting guest posts");
}

#[tokio::test]
async fn failed_rewrite_falls_back_to_original_query() {
    let embedder = Arc::new(RecordingEmbedder::default());
    let service = service(embedder.clone(), Arc::new(ScriptedIndex::new(Vec::new())));
    let rewriter = QueryRewriter::new(Arc::new(FailingGenerator));
    let rewriter = &rewriter;

    service
        .retrieve_context_with_rewrite("user-1", "travel blogs", Some(move |q: String| async move {
            rewriter.try_rewrite(&q).await
        }))
        .await;
    assert_eq!(embedder.seen()[0], "travel blogs");
    assert_eq!(rewriter.rewrite_query("travel blogs").await, "travel blogs");
}

fn message(id: &str, role: Role, content: &str, is_profile: bool) -> ConversationMessage {
    ConversationMessage {
        message_id: id.into(),
        chat_id: "chat-9".into(),
        role,
        content: content.into(),
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
        is_profile,
        is_preference: false,
    }
}

#[tokio::test]
async fn indexed_messages_come_back_as_context() {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(VocabularyEmbedder);
    let index = Arc::new(InMemoryVectorIndex::new());
    let indexer = DocumentIndexer::new(embedder.clone(), index.clone());

    let messages = [
        ("u1", message("m1", Role::User, "I run a travel blog with good site traffic", true)),
        ("u1", message("m2", Role::Assistant, "Domain rating measures authority", false)),
        ("u1", message("m3", Role::System, "site traffic site traffic", false)),
        ("u2", message("m4", Role::User, "site traffic", true)),
    ];
    for (user_id, message) in &messages {
        indexer.index_message(user_id, message).await.unwrap();
    }

    let service = service(embedder, index.clone());
    let results = service.retrieve_context("u1", "site traffic").await;
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();

    assert_eq!(ids, vec!["m1", "m2"]);
    assert!(results[0].metadata.is_profile);
    assert_eq!(results[0].metadata.chat_id.as_deref(), Some("chat-9"));
    assert_eq!(results[1].metadata.role.as_deref(), Some("assistant"));

    let context = build_context_string(&results);
    let profile_at = context.find("## User Preferences and Profile").unwrap();
    let history_at = context.find("## Relevant Conversation History").unwrap();
    assert!(profile_at < history_at);
    assert!(context.contains("- I run a travel blog with good site traffic (score="));
    assert!(!context.contains("m4"));
}

#[tokio::test]
async fn indexed_chunks_use_document_scoped_ids() {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(VocabularyEmbedder);
    let index = Arc::new(InMemoryVectorIndex::new());
    let indexer = DocumentIndexer::new(embedder.clone(), index.clone());

    let config = ChunkingConfig::builder().chunk_size(60).chunk_overlap(10).build().unwrap();
    let chunker = DocumentChunker::new(config).unwrap();
    let info = DocumentInfo::new("doc-7", "notes.txt", "u1");
    let text = concat!(
        "Travel blog budget is modest.\n\n",
        "We want high domain rating sites.\n\n",
        "Traffic matters more than DR.",
    );
    let chunks = chunker.chunk_document(text, &info, None).unwrap();

    let written = indexer.index_chunks("u1", &chunks).await.unwrap();
    assert_eq!(written, chunks.len());
    assert_eq!(index.len("user_u1").await, chunks.len());

    let query = embedder.embed("domain rating").await.unwrap();
    let hits = index.query("user_u1", &query, 10, None).await.unwrap();
    assert!(hits.iter().all(|h| h.id.starts_with("doc-7_chunk_")));
    assert_eq!(hits[0].metadata["documentName"], "notes.txt");
    assert!(hits[0].metadata["text"].as_str().unwrap().contains("domain rating"));

    // Re-indexing replaces rather than duplicates.
    indexer.index_chunks("u1", &chunks).await.unwrap();
    assert_eq!(index.len("user_u1").await, chunks.len());
    assert_eq!(indexer.index_chunks("u1", &[]).await.unwrap(), 0);
}
