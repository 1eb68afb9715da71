//! Deterministic token accounting.
//!
//! Prompt budgets and output limits are enforced against a fixed encoding
//! (`cl100k_base`), so the same text always yields the same count no matter
//! which model ends up serving the request.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

fn encoder() -> &'static CoreBPE {
    static BPE: OnceLock<CoreBPE> = OnceLock::new();
    BPE.get_or_init(|| {
        tiktoken_rs::cl100k_base().expect("embedded cl100k_base vocabulary loads")
    })
}

/// Count tokens in a text under the fixed encoding.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    encoder().encode_with_special_tokens(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_zero_tokens() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_counts_are_deterministic() {
        let text = "fn main() { println!(\"hello world\"); }";
        assert_eq!(count_tokens(text), count_tokens(text));
        assert!(count_tokens(text) > 0);
    }

    #[test]
    fn test_longer_text_counts_more() {
        let short = "summarize this file";
        let long = short.repeat(50);
        assert!(count_tokens(&long) > count_tokens(short));
    }
}
