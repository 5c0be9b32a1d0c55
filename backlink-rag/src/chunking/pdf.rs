//! PDF strategy: document summary plus one chunk per non-empty page.
//!
//! Pages longer than the chunk limit continue in `Page n (cont.)` chunks.

use serde_json::json;

use super::{ChunkEmitter, extra};
use crate::document::{ChunkType, Priority};
use crate::formats::PdfMetadata;
use crate::text::word_count;

fn document_type(page_count: usize) -> &'static str {
    match page_count {
        0..=2 => "short",
        3..=20 => "article",
        _ => "long-form",
    }
}

pub(super) fn chunk(content: &str, metadata: &PdfMetadata, emitter: &mut ChunkEmitter<'_>) {
    let page_count = metadata.pages.len();
    let words = metadata.word_count.unwrap_or_else(|| {
        if content.trim().is_empty() {
            metadata.pages.iter().map(|p| word_count(p)).sum()
        } else {
            word_count(content)
        }
    });
    let title = metadata.title.clone().unwrap_or_else(|| emitter.document_name().to_string());
    let document_type = document_type(page_count);

    let mut text = format!("PDF Document: {title}\n");
    if let Some(author) = &metadata.author {
        text.push_str(&format!("Author: {author}\n"));
    }
    text.push_str(&format!("Pages: {page_count}\nWords: {words}\nDocument type: {document_type}"));

    emitter.emit(
        ChunkType::PdfSummary,
        Some(Priority::High),
        &text,
        extra([
            ("pageCount", json!(page_count)),
            ("wordCount", json!(words)),
            ("documentType", json!(document_type)),
        ]),
    );

    for (idx, page) in metadata.pages.iter().enumerate() {
        let page = page.trim();
        if page.is_empty() {
            continue;
        }
        let page_number = idx + 1;
        emitter.emit_continued(
            ChunkType::PdfPage,
            Some(Priority::Medium),
            &format!("Page {page_number}"),
            &format!("Page {page_number} (cont.)"),
            page,
            extra([("pageNumber", json!(page_number))]),
        );
    }
}
