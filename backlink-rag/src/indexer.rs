//! Writes chunks and chat turns into a user's vector namespace.
//!
//! The metadata written here is what [`RagResult::from_match`] reads back:
//! record text lives under `text`, flags under `isProfile`/`isPreference`.
//!
//! [`RagResult::from_match`]: crate::RagResult::from_match

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info};

use crate::document::{Chunk, ConversationMessage, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorIndex, user_namespace};

/// Embeds content and upserts it into the owning user's namespace.
pub struct DocumentIndexer {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
}

impl DocumentIndexer {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self { embedding_provider, vector_index }
    }

    /// Embed and store document chunks. Returns the number of records written.
    ///
    /// Record ids are `{documentId}_chunk_{index}`, so re-indexing a document
    /// overwrites its previous chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or the upsert fails,
    /// naming the document.
    pub async fn index_chunks(&self, user_id: &str, chunks: &[Chunk]) -> Result<usize> {
        let Some(first) = chunks.first() else {
            return Ok(0);
        };
        let document_id = first.metadata.document_id.as_str();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document_id, error = %e, "embedding failed during indexing");
            RagError::PipelineError(format!("embedding failed for document '{document_id}': {e}"))
        })?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::PipelineError(format!(
                "embedding provider returned {} vectors for {} chunks of document '{document_id}'",
                embeddings.len(),
                chunks.len()
            )));
        }

        let records = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| {
                Ok(VectorRecord {
                    id: format!("{}_chunk_{}", chunk.metadata.document_id, chunk.index),
                    values,
                    metadata: chunk_metadata(chunk)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.vector_index.upsert(&user_namespace(user_id), &records).await.map_err(|e| {
            error!(document.id = %document_id, error = %e, "upsert failed during indexing");
            RagError::PipelineError(format!("upsert failed for document '{document_id}': {e}"))
        })?;

        info!(user_id, document.id = %document_id, chunk_count = records.len(), "indexed document");
        Ok(records.len())
    }

    /// Embed and store a single chat turn under its message id.
    pub async fn index_message(&self, user_id: &str, message: &ConversationMessage) -> Result<()> {
        let values = self.embedding_provider.embed(&message.content).await.map_err(|e| {
            error!(message.id = %message.message_id, error = %e, "embedding failed for message");
            RagError::PipelineError(format!(
                "embedding failed for message '{}': {e}",
                message.message_id
            ))
        })?;

        let record = VectorRecord {
            id: message.message_id.clone(),
            values,
            metadata: message_metadata(message),
        };
        self.vector_index.upsert(&user_namespace(user_id), std::slice::from_ref(&record)).await?;

        info!(
            user_id,
            message.id = %message.message_id,
            role = message.role.as_str(),
            "indexed message"
        );
        Ok(())
    }
}

fn chunk_metadata(chunk: &Chunk) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(&chunk.metadata).map_err(|e| {
        RagError::PipelineError(format!(
            "failed to serialize metadata for chunk {}: {e}",
            chunk.index
        ))
    })?;
    let Value::Object(mut metadata) = value else {
        return Err(RagError::PipelineError(format!(
            "metadata for chunk {} is not an object",
            chunk.index
        )));
    };
    metadata.insert("text".into(), Value::String(chunk.text.clone()));
    Ok(metadata)
}

fn message_metadata(message: &ConversationMessage) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("chatId".into(), message.chat_id.clone().into());
    metadata.insert("messageId".into(), message.message_id.clone().into());
    metadata.insert("role".into(), message.role.as_str().into());
    metadata.insert("createdAt".into(), message.created_at.to_rfc3339().into());
    metadata.insert("isProfile".into(), message.is_profile.into());
    metadata.insert("isPreference".into(), message.is_preference.into());
    metadata.insert("text".into(), message.content.clone().into());
    metadata
}
