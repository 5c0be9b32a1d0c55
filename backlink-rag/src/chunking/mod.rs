//! Document chunking engine.
//!
//! Converts extracted document text plus optional structural metadata into an
//! ordered list of [`Chunk`]s. The strategy is picked from the metadata:
//!
//! - CSV with headers → summary, per-column, row-block, and statistics chunks
//! - XLSX with sheets → workbook summary, sheet overviews, column analyses
//! - DOCX with headings → summary, outline, paragraph blocks
//! - PDF with pages → summary and one chunk per page
//! - anything else → paragraph chunks with overlap
//!
//! # Example
//!
//! ```rust,ignore
//! use backlink_rag::{DocumentChunker, DocumentInfo, ChunkingConfig};
//!
//! let chunker = DocumentChunker::new(ChunkingConfig::default())?;
//! let info = DocumentInfo::new("doc-1", "sites.csv", "user-1");
//! let chunks = chunker.chunk_document(&text, &info, Some(&metadata))?;
//! ```

mod csv;
mod docx;
mod paragraph;
mod pdf;
mod stats;
mod xlsx;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ChunkingConfig;
use crate::document::{Chunk, ChunkMetadata, ChunkType, DocumentInfo, Priority};
use crate::error::{RagError, Result};
use crate::formats::{CsvMetadata, DocumentMetadata, DocxMetadata, PdfMetadata, XlsxMetadata};
use crate::text::{break_point, truncate_chars};

pub use stats::ColumnStatistics;

/// The chunking strategy chosen for a document.
#[derive(Debug, Clone, Copy)]
pub enum Strategy<'a> {
    Csv(&'a CsvMetadata),
    Xlsx(&'a XlsxMetadata),
    Docx(&'a DocxMetadata),
    Pdf(&'a PdfMetadata),
    Paragraph,
}

impl<'a> Strategy<'a> {
    /// Pick a strategy from structural metadata.
    ///
    /// Structured strategies only apply when their metadata carries structure
    /// (headers, sheets, headings, pages); otherwise paragraphs are used.
    pub fn select(metadata: Option<&'a DocumentMetadata>) -> Self {
        match metadata {
            Some(DocumentMetadata::Csv(csv)) if !csv.headers.is_empty() => Strategy::Csv(csv),
            Some(DocumentMetadata::Xlsx(xlsx)) if !xlsx.sheets.is_empty() => Strategy::Xlsx(xlsx),
            Some(DocumentMetadata::Docx(docx)) if !docx.headings.is_empty() => {
                Strategy::Docx(docx)
            }
            Some(DocumentMetadata::Pdf(pdf)) if !pdf.pages.is_empty() => Strategy::Pdf(pdf),
            _ => Strategy::Paragraph,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Csv(_) => "csv",
            Strategy::Xlsx(_) => "xlsx",
            Strategy::Docx(_) => "docx",
            Strategy::Pdf(_) => "pdf",
            Strategy::Paragraph => "paragraph",
        }
    }
}

/// Splits extracted documents into retrieval chunks.
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    config: ChunkingConfig,
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self { config: ChunkingConfig::default() }
    }
}

impl DocumentChunker {
    /// Create a chunker, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is inconsistent.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk one document.
    ///
    /// Every returned chunk carries `total_chunks == chunks.len()` and the
    /// indices form the sequence `0..chunks.len()` in emission order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] when the input is malformed, such as
    /// a CSV quoted field left open at end of input. A CSV with fewer than two
    /// usable records is not an error and yields an empty list.
    pub fn chunk_document(
        &self,
        content: &str,
        info: &DocumentInfo,
        metadata: Option<&DocumentMetadata>,
    ) -> Result<Vec<Chunk>> {
        let strategy = Strategy::select(metadata);
        let mut emitter = ChunkEmitter::new(info, self.config.max_chunk_chars);

        match strategy {
            Strategy::Csv(csv) => csv::chunk(content, csv, &self.config, &mut emitter)?,
            Strategy::Xlsx(xlsx) => xlsx::chunk(xlsx, &mut emitter),
            Strategy::Docx(docx) => docx::chunk(content, docx, &self.config, &mut emitter),
            Strategy::Pdf(pdf) => pdf::chunk(content, pdf, &mut emitter),
            Strategy::Paragraph => paragraph::chunk(content, &self.config, &mut emitter),
        }

        let chunks = emitter.finish();
        info!(
            document.id = %info.document_id,
            strategy = strategy.name(),
            chunk_count = chunks.len(),
            "chunked document"
        );
        Ok(chunks)
    }
}

/// Chunk a document with explicit paragraph parameters and default block sizes.
///
/// # Errors
///
/// Returns [`RagError::ChunkingError`] for a zero `chunk_size` or an
/// `overlap` that is not smaller than `chunk_size`.
pub fn chunk_document(
    content: &str,
    info: &DocumentInfo,
    chunk_size: usize,
    overlap: usize,
    metadata: Option<&DocumentMetadata>,
) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig {
        chunk_size,
        chunk_overlap: overlap,
        max_chunk_chars: ChunkingConfig::default().max_chunk_chars.max(chunk_size),
        ..ChunkingConfig::default()
    };
    let chunker =
        DocumentChunker::new(config).map_err(|e| RagError::ChunkingError(e.to_string()))?;
    chunker.chunk_document(content, info, metadata)
}

/// Collects chunks in emission order and numbers them.
pub(crate) struct ChunkEmitter<'a> {
    info: &'a DocumentInfo,
    max_chars: usize,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkEmitter<'a> {
    fn new(info: &'a DocumentInfo, max_chars: usize) -> Self {
        Self { info, max_chars, chunks: Vec::new() }
    }

    pub(crate) fn document_name(&self) -> &'a str {
        &self.info.document_name
    }

    /// Append a chunk; blank text is skipped. Returns the last stored text.
    ///
    /// Text longer than the emitter's limit is split as in
    /// [`emit_continued`](Self::emit_continued), labelled with the document name.
    pub(crate) fn emit(
        &mut self,
        chunk_type: ChunkType,
        priority: Option<Priority>,
        text: &str,
        extra: Map<String, Value>,
    ) -> Option<&str> {
        let continued = format!("{} (cont.)", self.info.document_name);
        self.emit_continued(chunk_type, priority, "", &continued, text, extra)
    }

    /// Append `heading` followed by `body`, splitting on line boundaries when
    /// the whole would exceed the emitter's limit.
    ///
    /// Every piece after the first starts with the `continued` label. Lines
    /// that cannot fit on their own are cut at whitespace, or hard-cut on a
    /// char boundary. Split pieces carry a 1-based `part` in their metadata.
    pub(crate) fn emit_continued(
        &mut self,
        chunk_type: ChunkType,
        priority: Option<Priority>,
        heading: &str,
        continued: &str,
        body: &str,
        extra: Map<String, Value>,
    ) -> Option<&str> {
        let whole = if heading.is_empty() {
            body.trim().to_string()
        } else {
            format!("{heading}\n{}", body.trim_end())
        };
        let whole = whole.trim();
        if whole.is_empty() {
            debug!(
                document.id = %self.info.document_id,
                chunk_type = chunk_type.as_str(),
                "skipping empty chunk"
            );
            return None;
        }

        if whole.chars().count() <= self.max_chars {
            self.push(chunk_type, priority, whole.to_string(), extra);
            return self.chunks.last().map(|c| c.text.as_str());
        }

        let label_limit = self.max_chars.saturating_sub(1) / 2;
        let heading = truncate_chars(heading.trim(), label_limit);
        let continued = truncate_chars(continued.trim(), label_limit);
        let body = if heading.is_empty() { whole } else { body.trim_end() };
        let pieces = split_lines(heading, continued, body, self.max_chars);

        debug!(
            document.id = %self.info.document_id,
            chunk_type = chunk_type.as_str(),
            parts = pieces.len(),
            "splitting oversized chunk"
        );
        for (part, piece) in pieces.into_iter().enumerate() {
            let mut extra = extra.clone();
            extra.insert("part".to_string(), Value::from(part + 1));
            self.push(chunk_type, priority, piece, extra);
        }
        self.chunks.last().map(|c| c.text.as_str())
    }

    fn push(
        &mut self,
        chunk_type: ChunkType,
        priority: Option<Priority>,
        text: String,
        extra: Map<String, Value>,
    ) {
        let index = self.chunks.len();
        self.chunks.push(Chunk {
            text,
            index,
            metadata: ChunkMetadata {
                document_id: self.info.document_id.clone(),
                document_name: self.info.document_name.clone(),
                user_id: self.info.user_id.clone(),
                chunk_index: index,
                chunk_type,
                total_chunks: 0,
                priority,
                extra,
            },
        });
    }

    /// Back-fill `total_chunks` and hand over the chunks.
    fn finish(mut self) -> Vec<Chunk> {
        let total = self.chunks.len();
        for chunk in &mut self.chunks {
            chunk.metadata.total_chunks = total;
        }
        self.chunks
    }
}

/// Build a format-specific metadata map from key/value pairs.
pub(crate) fn extra<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Render a number without a trailing `.00` for whole values.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

/// Pack the lines of `body` into pieces of at most `max_chars` characters.
///
/// The first piece opens with `heading` (if any), later ones with `continued`.
fn split_lines(heading: &str, continued: &str, body: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = Piece::new(heading);

    for line in body.lines() {
        let mut line = line;
        loop {
            let room = current.room(max_chars);
            let line_len = line.chars().count();
            if line_len <= room {
                current.push_line(line, line_len);
                break;
            }
            if current.has_body {
                pieces.extend(current.finish());
                current = Piece::new(continued);
                continue;
            }

            let cut = break_point(line, room, room / 2);
            let head = &line[..cut];
            current.push_line(head, head.chars().count());
            pieces.extend(current.finish());
            current = Piece::new(continued);
            line = line[cut..].trim_start();
            if line.is_empty() {
                break;
            }
        }
    }

    pieces.extend(current.finish());
    pieces
}

/// One chunk being filled by [`split_lines`].
struct Piece {
    text: String,
    chars: usize,
    has_body: bool,
}

impl Piece {
    fn new(label: &str) -> Self {
        Self { text: label.to_string(), chars: label.chars().count(), has_body: false }
    }

    fn room(&self, max_chars: usize) -> usize {
        let separator = usize::from(!self.text.is_empty());
        max_chars.saturating_sub(self.chars + separator)
    }

    fn push_line(&mut self, line: &str, line_chars: usize) {
        if !self.text.is_empty() {
            self.text.push('\n');
            self.chars += 1;
        }
        self.text.push_str(line);
        self.chars += line_chars;
        self.has_body |= !line.trim().is_empty();
    }

    fn finish(self) -> Option<String> {
        let text = self.text.trim();
        (self.has_body && !text.is_empty()).then(|| text.to_string())
    }
}
