/// Safe approximation of an input-token ceiling used before embedding
/// (§4.J step i): 24,000 characters, truncated at a char boundary so
/// multi-byte UTF-8 text is never sliced mid-codepoint.
pub const EMBEDDING_INPUT_CEILING_CHARS: usize = 24_000;

/// Truncates `text` to at most `max_chars` characters, never splitting a
/// UTF-8 codepoint.
pub fn truncate_for_embedding(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_for_embedding("hello", 24_000), "hello");
    }

    #[test]
    fn long_text_is_truncated_at_char_boundary() {
        let text = "a".repeat(30_000);
        let truncated = truncate_for_embedding(&text, EMBEDDING_INPUT_CEILING_CHARS);
        assert_eq!(truncated.len(), EMBEDDING_INPUT_CEILING_CHARS);
    }

    #[test]
    fn truncation_never_splits_a_multibyte_codepoint() {
        let text = "a".repeat(23_999) + "é€"; // 'é' starts at byte 23999, multi-byte
        let truncated = truncate_for_embedding(&text, EMBEDDING_INPUT_CEILING_CHARS);
        assert!(truncated.is_char_boundary(truncated.len()));
        assert!(text.starts_with(truncated));
    }
}
