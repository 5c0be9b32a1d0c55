//! DOCX strategy: document summary, heading outline, and paragraph blocks.

use serde_json::{Map, json};

use super::{ChunkEmitter, extra};
use crate::config::ChunkingConfig;
use crate::document::{ChunkType, Priority};
use crate::formats::DocxMetadata;
use crate::text::{average_words_per_sentence, split_paragraphs, word_count};

pub(super) fn chunk(
    content: &str,
    metadata: &DocxMetadata,
    config: &ChunkingConfig,
    emitter: &mut ChunkEmitter<'_>,
) {
    let paragraphs = split_paragraphs(content);

    emit_summary(content, metadata, paragraphs.len(), emitter);
    emit_outline(metadata, emitter);

    let per_block = config.docx_paragraphs_per_block;
    for (block_idx, block) in paragraphs.chunks(per_block).enumerate() {
        let start = block_idx * per_block + 1;
        let end = start + block.len() - 1;
        emitter.emit_continued(
            ChunkType::DocxParagraphs,
            Some(Priority::Low),
            "",
            &format!("Paragraphs {start}-{end} (cont.)"),
            &block.join("\n\n"),
            extra([("paragraphStart", json!(start)), ("paragraphEnd", json!(end))]),
        );
    }
}

fn readability(avg_words: f64) -> &'static str {
    if avg_words < 15.0 {
        "easy"
    } else if avg_words < 25.0 {
        "moderate"
    } else {
        "complex"
    }
}

fn document_type(metadata: &DocxMetadata, paragraph_count: usize) -> &'static str {
    if metadata.table_count >= 2 {
        "report"
    } else if metadata.list_count > 0 && metadata.list_count * 2 >= paragraph_count {
        "list"
    } else if metadata.headings.len() >= 3 {
        "structured"
    } else {
        "narrative"
    }
}

fn emit_summary(
    content: &str,
    metadata: &DocxMetadata,
    paragraph_count: usize,
    emitter: &mut ChunkEmitter<'_>,
) {
    let title = metadata.title.clone().unwrap_or_else(|| emitter.document_name().to_string());
    let words = metadata.word_count.unwrap_or_else(|| word_count(content));
    let avg_words = average_words_per_sentence(content);
    let readability = readability(avg_words);
    let document_type = document_type(metadata, paragraph_count);

    let mut text = format!("Document Summary: {title}\n");
    if let Some(author) = &metadata.author {
        text.push_str(&format!("Author: {author}\n"));
    }
    if let Some(pages) = metadata.page_count {
        text.push_str(&format!("Pages: {pages}\n"));
    }
    text.push_str(&format!(
        "Words: {words}\n\
         Structure: {} headings, {paragraph_count} paragraphs, {} tables, {} lists\n\
         Readability: {readability} (average {avg_words:.1} words per sentence)\n\
         Document type: {document_type}",
        metadata.headings.len(),
        metadata.table_count,
        metadata.list_count,
    ));

    emitter.emit(
        ChunkType::DocxSummary,
        Some(Priority::High),
        &text,
        extra([
            ("wordCount", json!(words)),
            ("headingCount", json!(metadata.headings.len())),
            ("paragraphCount", json!(paragraph_count)),
            ("readability", json!(readability)),
            ("documentType", json!(document_type)),
        ]),
    );
}

fn emit_outline(metadata: &DocxMetadata, emitter: &mut ChunkEmitter<'_>) {
    let mut text = String::from("Document Outline:\n");
    for heading in &metadata.headings {
        let depth = usize::from(heading.level.max(1) - 1);
        text.push_str(&format!("{}- {}\n", "  ".repeat(depth), heading.text.trim()));
    }
    emitter.emit(ChunkType::DocxOutline, Some(Priority::Medium), &text, Map::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readability_bands() {
        assert_eq!(readability(8.0), "easy");
        assert_eq!(readability(18.0), "moderate");
        assert_eq!(readability(31.0), "complex");
    }

    #[test]
    fn tables_make_a_report() {
        let metadata = DocxMetadata { table_count: 3, ..Default::default() };
        assert_eq!(document_type(&metadata, 10), "report");
        let metadata = DocxMetadata { list_count: 6, ..Default::default() };
        assert_eq!(document_type(&metadata, 10), "list");
        assert_eq!(document_type(&DocxMetadata::default(), 10), "narrative");
    }
}
