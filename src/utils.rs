// src/utils.rs
// Small shared helpers

use sha2::{Digest, Sha256};

/// Whitespace word count. This is the token accounting the chat pipeline
/// uses; it is a documented approximation, not a real tokenizer.
pub fn word_count(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

/// Truncate to at most `max` codepoints, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}\u{2026}")
}

/// Hex SHA-256 of the input.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_splits_on_whitespace() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
    }

    #[test]
    fn truncate_respects_codepoints() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        let cut = truncate_chars("hello world", 6);
        assert_eq!(cut.chars().count(), 6);
        assert!(cut.ends_with('\u{2026}'));
    }

    #[test]
    fn sha256_is_deterministic() {
        assert_eq!(sha256_hex("abc"), sha256_hex("abc"));
        assert_ne!(sha256_hex("abc"), sha256_hex("abd"));
    }
}
