//! Default strategy: blank-line paragraphs packed into overlapping chunks.

use serde_json::Map;

use super::ChunkEmitter;
use crate::config::ChunkingConfig;
use crate::document::ChunkType;
use crate::text::{break_point, split_paragraphs, tail_chars};

/// Pack paragraphs into chunks of at most `chunk_size` characters.
///
/// When the next paragraph would overflow the buffer, the buffer is emitted
/// and the next one is seeded with the last `chunk_overlap` characters of the
/// emitted chunk. A paragraph longer than `chunk_size` is cut into windows,
/// at whitespace where possible, each seeded the same way.
pub(super) fn chunk(content: &str, config: &ChunkingConfig, emitter: &mut ChunkEmitter<'_>) {
    let mut buffer = String::new();

    for paragraph in split_paragraphs(content) {
        let paragraph_len = paragraph.chars().count();
        let buffer_len = buffer.chars().count();

        if !buffer.is_empty() && buffer_len + 2 + paragraph_len > config.chunk_size {
            buffer = emit_with_carry(&buffer, config, emitter);
        }

        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(&paragraph);

        if paragraph_len > config.chunk_size {
            buffer = split_oversized(buffer, config, emitter);
        }
    }

    if !buffer.trim().is_empty() {
        emitter.emit(ChunkType::Paragraph, None, &buffer, Map::new());
    }
}

/// Emit `text` and return the overlap that seeds the next buffer.
fn emit_with_carry(text: &str, config: &ChunkingConfig, emitter: &mut ChunkEmitter<'_>) -> String {
    emitter
        .emit(ChunkType::Paragraph, None, text, Map::new())
        .map(|stored| tail_chars(stored, config.chunk_overlap).to_string())
        .unwrap_or_default()
}

/// Emit `chunk_size` windows from the front of `buffer` until the rest fits.
///
/// Each cut lands after the first `chunk_overlap` characters, so the buffer
/// shrinks on every pass.
fn split_oversized(
    mut buffer: String,
    config: &ChunkingConfig,
    emitter: &mut ChunkEmitter<'_>,
) -> String {
    while buffer.chars().count() > config.chunk_size {
        let cut = break_point(&buffer, config.chunk_size, config.chunk_overlap);
        let mut next = emit_with_carry(&buffer[..cut], config, emitter);
        next.push_str(&buffer[cut..]);
        buffer = next;
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentInfo;

    fn run(content: &str, chunk_size: usize, overlap: usize) -> Vec<crate::document::Chunk> {
        let info = DocumentInfo::new("d", "notes.txt", "u");
        let config = ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
            ..ChunkingConfig::default()
        };
        let mut emitter = ChunkEmitter::new(&info, config.max_chunk_chars);
        chunk(content, &config, &mut emitter);
        emitter.finish()
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = run("First.\n\nSecond.", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "First.\n\nSecond.");
        assert_eq!(chunks[0].metadata.chunk_type, ChunkType::Paragraph);
    }

    #[test]
    fn overflow_starts_new_chunk_with_overlap() {
        let a = "a".repeat(60);
        let b = "b".repeat(60);
        let chunks = run(&format!("{a}\n\n{b}"), 100, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, a);
        assert_eq!(chunks[1].text, format!("{}\n\n{b}", "a".repeat(10)));
    }

    #[test]
    fn zero_overlap_carries_nothing() {
        let a = "a".repeat(60);
        let b = "b".repeat(60);
        let chunks = run(&format!("{a}\n\n{b}"), 100, 0);
        assert_eq!(chunks[1].text, b);
    }

    #[test]
    fn oversized_paragraph_is_cut_into_overlapping_windows() {
        let words: Vec<String> = (0..300).map(|i| format!("w{i:03}")).collect();
        let content = format!("{}\n\nClosing note.", words.join(" "));
        let chunks = run(&content, 100, 20);

        assert!(chunks.len() > 10);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0].text, 20);
            assert!(pair[1].text.starts_with(tail.trim_start()));
        }
        for word in &words {
            assert!(
                chunks.iter().any(|c| c.text.split_whitespace().any(|w| w == word)),
                "{word} was lost"
            );
        }
        assert!(chunks.last().is_some_and(|c| c.text.ends_with("Closing note.")));
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        assert!(run("  \n\n ", 100, 10).is_empty());
    }
}
