use std::sync::OnceLock;

use tiktoken_rs::{o200k_base, CoreBPE};

/// Counts tokens the way the chat models bill them. Falls back to a rough
/// chars/4 estimate if the encoder cannot be constructed.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => estimate_tokens(text),
    }
}

/// Quick estimate, roughly four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

fn encoder() -> Option<&'static CoreBPE> {
    static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

    ENCODER.get_or_init(|| o200k_base().ok()).as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens_empty() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_count_tokens_simple() {
        let count = count_tokens("Hello, world!");
        assert!(count > 0);
        assert!(count < 10);
    }

    #[test]
    fn test_estimate_tokens_tracks_length() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        let text = "This is a test sentence for the estimator.";
        let estimate = estimate_tokens(text);
        let actual = count_tokens(text);
        assert!(estimate <= actual * 2);
        assert!(estimate >= actual / 2);
    }
}
