//! Token counting for the chunker.
//!
//! Different model families count tokens differently, so the chunker asks a
//! `TokenCounter` chosen from a model name instead of counting characters.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{RagError, Result};

/// Model hint selecting whitespace word counting.
pub const WORDS: &str = "words";

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Counts whitespace-separated words.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Counts BPE tokens the way an OpenAI model would.
pub struct BpeCounter {
    bpe: CoreBPE,
}

impl BpeCounter {
    pub fn for_model(model: &str) -> Result<Self> {
        if uses_o200k(model) {
            let bpe = tiktoken_rs::o200k_base()
                .map_err(|e| RagError::ModelLoad(format!("Failed to load o200k_base tokenizer: {}", e)))?;
            return Ok(Self { bpe });
        }

        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(e) => {
                tracing::debug!(model, error = %e, "No tokenizer registered for model, using cl100k_base");
                tiktoken_rs::cl100k_base()
                    .map_err(|e| RagError::ModelLoad(format!("Failed to load cl100k_base tokenizer: {}", e)))?
            }
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for BpeCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// gpt-5 and the o-series share the o200k vocabulary.
fn uses_o200k(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    model.starts_with("gpt-5")
        || ["o1", "o3", "o4"]
            .iter()
            .any(|family| model == *family || model.starts_with(&format!("{}-", family)))
}

/// Pick the counting scheme for a model hint.
pub fn counter_for_model(model: &str) -> Result<Arc<dyn TokenCounter>> {
    let model = model.trim();
    if model.is_empty() || model.eq_ignore_ascii_case(WORDS) {
        return Ok(Arc::new(WordCounter));
    }
    Ok(Arc::new(BpeCounter::for_model(model)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_counter() {
        assert_eq!(WordCounter.count("  one two\nthree\t four "), 4);
        assert_eq!(WordCounter.count("   "), 0);
    }

    #[test]
    fn test_words_hint_selects_word_counter() {
        let counter = counter_for_model("words").unwrap();
        assert_eq!(counter.count("alpha beta gamma"), 3);
    }

    #[test]
    fn test_bpe_counts_tokens() {
        let counter = counter_for_model("gpt-4").unwrap();
        assert_eq!(counter.count(""), 0);
        assert!(counter.count("hello world") >= 2);
        // a long word is more than one BPE token but a single word
        assert!(counter.count("antidisestablishmentarianism") > 1);
    }

    #[test]
    fn test_gpt5_counts_with_o200k() {
        let o200k = tiktoken_rs::o200k_base().unwrap();
        let text = "Retrieval-augmented generation grounds answers in documents.";

        for hint in ["gpt-5", "gpt-5-mini", "o3-mini"] {
            let counter = counter_for_model(hint).unwrap();
            assert_eq!(counter.count(text), o200k.encode_with_special_tokens(text).len());
        }
        assert!(uses_o200k("O1"));
        assert!(!uses_o200k("open-llama"));
        assert!(!uses_o200k("gpt-4"));
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let counter = counter_for_model("some-local-model").unwrap();
        assert!(counter.count("hello world") > 0);
    }
}
