//! Data types for chunks, retrieval results, and vector-index records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of the document being chunked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    /// Unique identifier for the document.
    pub document_id: String,
    /// Display name (usually the uploaded file name).
    pub document_name: String,
    /// Owner of the document.
    pub user_id: String,
}

impl DocumentInfo {
    /// Create document identity from its parts.
    pub fn new(
        document_id: impl Into<String>,
        document_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            document_name: document_name.into(),
            user_id: user_id.into(),
        }
    }
}

/// The strategy-specific kind of a chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Paragraph,
    CsvSummary,
    CsvColumn,
    CsvRows,
    CsvStatistics,
    XlsxSummary,
    XlsxSheetOverview,
    XlsxColumnAnalysis,
    DocxSummary,
    DocxOutline,
    DocxParagraphs,
    PdfSummary,
    PdfPage,
}

impl ChunkType {
    /// The wire name stored in chunk metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Paragraph => "paragraph",
            ChunkType::CsvSummary => "csv_summary",
            ChunkType::CsvColumn => "csv_column",
            ChunkType::CsvRows => "csv_rows",
            ChunkType::CsvStatistics => "csv_statistics",
            ChunkType::XlsxSummary => "xlsx_summary",
            ChunkType::XlsxSheetOverview => "xlsx_sheet_overview",
            ChunkType::XlsxColumnAnalysis => "xlsx_column_analysis",
            ChunkType::DocxSummary => "docx_summary",
            ChunkType::DocxOutline => "docx_outline",
            ChunkType::DocxParagraphs => "docx_paragraphs",
            ChunkType::PdfSummary => "pdf_summary",
            ChunkType::PdfPage => "pdf_page",
        }
    }
}

/// Retrieval priority hint attached to structured chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub document_id: String,
    pub document_name: String,
    pub user_id: String,
    /// Zero-based position among the document's chunks.
    pub chunk_index: usize,
    pub chunk_type: ChunkType,
    /// Number of chunks produced for the document; identical on every chunk.
    pub total_chunks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Format-specific fields (column name, page number, row range...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A unit of retrievable text derived from one source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The chunk's content.
    pub text: String,
    /// Zero-based position among the document's chunks.
    pub index: usize,
    /// Identity, position, and format-specific metadata.
    pub metadata: ChunkMetadata,
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A raw nearest-neighbour hit returned by a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorMatch {
    /// Vector-index identifier.
    pub id: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
    /// Stored metadata (includes the original text under `text` or `content`).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A vector plus metadata to upsert into a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// Metadata of a retrieved match, as read back from the index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RagResultMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub is_profile: bool,
    pub is_preference: bool,
}

/// One retrieved match, ready for prompt injection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagResult {
    /// Vector-index identifier.
    pub id: String,
    /// The matched text.
    pub content: String,
    /// Cosine similarity in `[0, 1]`.
    pub score: f32,
    pub metadata: RagResultMetadata,
}

impl RagResult {
    /// Build a result from a raw index hit.
    ///
    /// The text is read from `metadata.text`, falling back to `metadata.content`.
    /// Returns `None` when the resolved text is empty.
    pub fn from_match(hit: VectorMatch) -> Option<Self> {
        let content = non_empty_str(&hit.metadata, "text")
            .or_else(|| non_empty_str(&hit.metadata, "content"))?
            .to_string();

        let metadata = RagResultMetadata {
            chat_id: string_field(&hit.metadata, "chatId"),
            message_id: string_field(&hit.metadata, "messageId"),
            role: string_field(&hit.metadata, "role"),
            created_at: string_field(&hit.metadata, "createdAt"),
            is_profile: bool_field(&hit.metadata, "isProfile"),
            is_preference: bool_field(&hit.metadata, "isPreference"),
        };

        Some(Self { id: hit.id, content, score: hit.score, metadata })
    }

    /// Whether the result describes the user's profile or preferences.
    pub fn is_personal(&self) -> bool {
        self.metadata.is_profile || self.metadata.is_preference
    }
}

fn non_empty_str<'a>(metadata: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

fn string_field(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Indexes that only store string metadata hand booleans back as "true"/"false".
fn bool_field(metadata: &Map<String, Value>, key: &str) -> bool {
    match metadata.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// A chat turn to be stored in the user's vector namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub message_id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// The turn states a durable fact about the user.
    #[serde(default)]
    pub is_profile: bool,
    /// The turn states a user preference.
    #[serde(default)]
    pub is_preference: bool,
}
