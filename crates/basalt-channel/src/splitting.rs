//! Outbound message chunking.
//!
//! Telegram (and most chat platforms) reject messages past a fixed length.
//! `split_message` breaks text that exceeds `max_len` into pieces, preferring
//! a break on a blank line, then any newline, then a space, and only
//! hard-cutting mid-word as a last resort.

/// Split `text` into chunks no longer than `max_len` bytes.
///
/// Empty input produces an empty vec, never a vec with one empty string.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > max_len {
        let window = &rest[..max_len];

        let split_at = window
            .rfind("\n\n")
            .map(|i| i + 2)
            .or_else(|| window.rfind('\n').map(|i| i + 1))
            .or_else(|| window.rfind(' ').map(|i| i + 1))
            .unwrap_or(max_len);

        let split_at = floor_char_boundary(rest, split_at.max(1));

        chunks.push(rest[..split_at].trim_end_matches('\n').to_string());
        rest = rest[split_at..].trim_start_matches('\n');
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

/// Move `idx` back to the nearest char boundary so slicing `s` never panics
/// on a multi-byte UTF-8 codepoint split by a fixed byte offset.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split_message("hello", 100), vec!["hello".to_string()]);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(split_message("", 100).is_empty());
    }

    #[test]
    fn exact_boundary_does_not_overflow() {
        let text = "a".repeat(10);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn splits_on_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(5), "b".repeat(5));
        let chunks = split_message(&text, 8);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= 8));
    }

    #[test]
    fn splits_on_space_when_no_newline() {
        let text = "word ".repeat(20);
        let chunks = split_message(&text, 12);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 12, "chunk exceeded max_len: {c:?}");
        }
    }

    #[test]
    fn force_splits_unbroken_run() {
        let text = "x".repeat(50);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.join(""), text);
    }

    #[test]
    fn never_loses_content() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let chunks = split_message(text, 15);
        let rejoined: String = chunks.join(" ");
        let normalized: String = rejoined.split_whitespace().collect::<Vec<_>>().join(" ");
        let expected: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalized, expected);
    }

    #[test]
    fn respects_multibyte_boundaries() {
        let text = "café".repeat(30);
        let chunks = split_message(&text, 10);
        for c in &chunks {
            assert!(c.is_char_boundary(0));
        }
        assert_eq!(chunks.concat(), text);
    }
}
