//! Char-boundary-safe text helpers shared by chunking and context rendering.

/// Return at most `max` characters from the start of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Return at most `max` characters from the end of `text`.
pub fn tail_chars(text: &str, max: usize) -> &str {
    if max == 0 {
        return "";
    }
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => text,
    }
}

/// Byte offset at which to cut `text` so the head holds at most `max`
/// characters.
///
/// Prefers the last whitespace found after the first `min` characters and
/// falls back to a hard cut at `max`. Returns `text.len()` when everything fits.
pub fn break_point(text: &str, max: usize, min: usize) -> usize {
    let mut last_space = None;
    for (position, (byte_idx, c)) in text.char_indices().enumerate() {
        if position == max {
            return last_space.unwrap_or(byte_idx);
        }
        if position > min && c.is_whitespace() {
            last_space = Some(byte_idx);
        }
    }
    text.len()
}

/// Split text into blank-line-delimited paragraphs, trimmed and non-empty.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n").trim().to_string());
    }

    paragraphs
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Average words per sentence, treating `.`, `!` and `?` as terminators.
pub fn average_words_per_sentence(text: &str) -> f64 {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.split_whitespace().next().is_some())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let words: usize = sentences.iter().map(|s| word_count(s)).sum();
    words as f64 / sentences.len() as f64
}

/// Keep at most `max` sentences of `text`.
pub fn first_sentences(text: &str, max: usize) -> &str {
    let mut seen = 0;
    for (idx, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let rest = &text[idx + c.len_utf8()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                seen += 1;
                if seen == max {
                    return &text[..idx + c.len_utf8()];
                }
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(tail_chars("héllo", 4), "éllo");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn breaks_on_whitespace_when_possible() {
        assert_eq!(break_point("short", 10, 2), 5);
        assert_eq!(break_point("alpha beta gamma", 12, 2), 10);
        assert_eq!(break_point("abcdefghij", 4, 1), 4);
        assert_eq!(break_point("ééééé", 2, 0), 4);
        // whitespace before `min` is ignored
        assert_eq!(break_point("a bcdefgh", 5, 2), 5);
    }

    #[test]
    fn splits_on_blank_lines() {
        let paragraphs = split_paragraphs("one\nstill one\n\n  \n two \n\n\nthree");
        assert_eq!(paragraphs, vec!["one\nstill one", "two", "three"]);
    }

    #[test]
    fn counts_sentences_and_words() {
        assert_eq!(word_count(" a  b\nc "), 3);
        let avg = average_words_per_sentence("One two three. Four five! Six?");
        assert!((avg - 2.0).abs() < f64::EPSILON);
        assert_eq!(average_words_per_sentence(""), 0.0);
    }

    #[test]
    fn keeps_leading_sentences() {
        let text = "First one. Second v1.2 here! Third?";
        assert_eq!(first_sentences(text, 2), "First one. Second v1.2 here!");
        assert_eq!(first_sentences("No terminator", 2), "No terminator");
    }
}
