// src/chat/title.rs
// Auto-title generation from the first user message

const TITLE_MAX: usize = 50;

/// Synthesize a session title from the first user message: the message
/// itself when it's a short question, otherwise the first sentence cut at
/// 50 characters with an ellipsis.
pub fn generate_title(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        return "New Chat".to_string();
    }

    // Questions read well as titles; keep the trailing '?'
    if content.ends_with('?') && content.chars().count() <= TITLE_MAX {
        return content.to_string();
    }

    let first_sentence = content
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or(content)
        .trim_end_matches(['.', '!'])
        .trim();

    if first_sentence.chars().count() <= TITLE_MAX {
        first_sentence.to_string()
    } else {
        let cut: String = content.chars().take(TITLE_MAX - 3).collect();
        // Cut on a word boundary when we can
        let trimmed = match cut.rfind(' ') {
            Some(pos) if pos > TITLE_MAX / 2 => &cut[..pos],
            _ => cut.as_str(),
        };
        format!("{trimmed}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_question_keeps_trailing_question_mark() {
        let title = generate_title("How do I implement authentication in FastAPI?");
        assert_eq!(title, "How do I implement authentication in FastAPI?");
    }

    #[test]
    fn first_sentence_is_used_for_statements() {
        let title = generate_title("Sort this list. Then reverse it.");
        assert_eq!(title, "Sort this list");
    }

    #[test]
    fn long_content_is_cut_with_ellipsis() {
        let long = "explain the complete architecture of a distributed streaming platform in detail";
        let title = generate_title(long);
        assert!(title.chars().count() <= TITLE_MAX);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn empty_content_falls_back() {
        assert_eq!(generate_title("   "), "New Chat");
    }
}
