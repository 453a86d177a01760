//! Recursive, token-bounded text splitting.
//!
//! Text is split on the coarsest separator present (paragraph, line, sentence,
//! word, character). Fragments are greedily merged back up to `chunk_size`
//! tokens, and a fragment that is still too large is split again with the next
//! finer separator. Consecutive merged chunks share up to `chunk_overlap`
//! tokens.

use std::collections::VecDeque;
use std::sync::Arc;

use super::tokenizer::{counter_for_model, TokenCounter};
use super::{Chunk, Metadata, SourceDocument};
use crate::error::{RagError, Result};

pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Coarsest first; an empty separator splits into characters
    pub separators: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 50,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
    counter: Arc<dyn TokenCounter>,
}

impl Chunker {
    pub fn new(config: ChunkerConfig, counter: Arc<dyn TokenCounter>) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(RagError::Validation("chunk_size must be at least 1".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config, counter })
    }

    /// Build a chunker counting tokens the way `model` does.
    pub fn for_model(config: ChunkerConfig, model: &str) -> Result<Self> {
        Self::new(config, counter_for_model(model)?)
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split one document into chunks, page by page.
    ///
    /// Fails with `RagError::Input` when the document has no non-whitespace text.
    /// Blank pages inside an otherwise non-blank document are skipped.
    pub fn chunk_document(&self, document: &SourceDocument) -> Result<Vec<Chunk>> {
        if document.is_blank() {
            return Err(RagError::Input(format!(
                "Document '{}' contains no extractable text",
                document.path
            )));
        }

        let mut chunks = Vec::new();
        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }

            for text in self.split_text(&page.text) {
                let id = format!("chunk_{}", chunks.len());

                let mut metadata = Metadata::new();
                metadata.insert("source".to_string(), document.path.clone());
                metadata.insert("chunk_id".to_string(), id.clone());
                if let Some(page_number) = page.page_number {
                    metadata.insert("page_number".to_string(), page_number.to_string());
                }

                chunks.push(Chunk {
                    id,
                    text,
                    source: document.path.clone(),
                    page_number: page.page_number,
                    metadata,
                });
            }
        }

        tracing::debug!(source = %document.path, chunks = chunks.len(), "Document chunked");
        Ok(chunks)
    }

    /// Split raw text into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        if separators.is_empty() {
            return trimmed(text).into_iter().collect();
        }

        let index = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
            .unwrap_or(separators.len() - 1);
        let separator = &separators[index];
        let finer = &separators[index + 1..];

        let mut chunks = Vec::new();
        let mut fitting: Vec<(&str, usize)> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            let tokens = self.counter.count(piece);
            if tokens <= self.config.chunk_size {
                fitting.push((piece, tokens));
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if finer.is_empty() {
                // Indivisible unit larger than chunk_size
                chunks.extend(trimmed(piece));
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Greedily join fragments up to `chunk_size`, carrying an overlap tail.
    fn merge(&self, pieces: &[(&str, usize)]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut merged = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &(piece, tokens) in pieces {
            if total + tokens > size && !window.is_empty() {
                merged.extend(join(&window));

                while total > overlap || (total + tokens > size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, tokens));
            total += tokens;
        }

        merged.extend(join(&window));
        merged
    }
}

fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    text.split_inclusive(separator)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn join(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    trimmed(&joined)
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::tokenizer::WordCounter;
    use crate::rag::PageText;

    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn word_chunker(chunk_size: usize, chunk_overlap: usize) -> Chunker {
        Chunker::new(
            ChunkerConfig {
                chunk_size,
                chunk_overlap,
                ..ChunkerConfig::default()
            },
            Arc::new(WordCounter),
        )
        .unwrap()
    }

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_blank_document_is_an_input_error() {
        let chunker = word_chunker(10, 2);
        for text in ["", "   \n\t  "] {
            let result = chunker.chunk_document(&SourceDocument::from_text("empty.pdf", text));
            assert!(matches!(result, Err(RagError::Input(_))));
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ChunkerConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            ..ChunkerConfig::default()
        };
        assert!(matches!(
            Chunker::new(config, Arc::new(WordCounter)),
            Err(RagError::Validation(_))
        ));
    }

    #[test]
    fn test_chunks_respect_size_and_are_non_empty() {
        let chunker = word_chunker(10, 3);
        let chunks = chunker.split_text(&numbered_words(100));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
            assert!(WordCounter.count(chunk) <= 10, "oversized chunk: {}", chunk);
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let chunker = word_chunker(10, 3);
        let chunks = chunker.split_text(&numbered_words(100));

        for pair in chunks.windows(2) {
            let previous: Vec<&str> = pair[0].split_whitespace().collect();
            let next: Vec<&str> = pair[1].split_whitespace().collect();
            assert_eq!(&previous[previous.len() - 3..], &next[..3]);
        }
        // every word survives
        assert!(chunks.last().unwrap().ends_with("w99"));
        assert!(chunks[0].starts_with("w0 "));
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let chunker = word_chunker(6, 0);
        let text = "apple apple orchard notes\n\nbanana banana grove notes\n\ncherry cherry tree notes";
        let chunks = chunker.split_text(text);

        assert_eq!(
            chunks,
            vec![
                "apple apple orchard notes",
                "banana banana grove notes",
                "cherry cherry tree notes",
            ]
        );
    }

    #[test]
    fn test_falls_through_to_finer_separator() {
        let chunker = word_chunker(4, 0);
        let text = "one two three four five six\n\nseven";
        let chunks = chunker.split_text(text);

        assert_eq!(chunks, vec!["one two three four", "five six", "seven"]);
    }

    #[test]
    fn test_indivisible_unit_is_emitted_verbatim() {
        let config = ChunkerConfig {
            chunk_size: 10,
            chunk_overlap: 0,
            separators: vec!["\n\n".to_string(), " ".to_string()],
        };
        let chunker = Chunker::new(config, Arc::new(CharCounter)).unwrap();
        let chunks = chunker.split_text("tiny supercalifragilistic end");

        assert!(chunks.contains(&"supercalifragilistic".to_string()));
        for chunk in chunks.iter().filter(|c| c.as_str() != "supercalifragilistic") {
            assert!(chunk.chars().count() <= 10);
        }
    }

    #[test]
    fn test_character_level_split() {
        let config = ChunkerConfig {
            chunk_size: 4,
            chunk_overlap: 1,
            ..ChunkerConfig::default()
        };
        let chunker = Chunker::new(config, Arc::new(CharCounter)).unwrap();
        let chunks = chunker.split_text("abcdefghij");

        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_document_ids_and_metadata() {
        let chunker = word_chunker(5, 0);
        let document = SourceDocument::new(
            "data/pdf/report.pdf",
            vec![
                PageText {
                    page_number: Some(0),
                    text: "first page text".to_string(),
                },
                PageText {
                    page_number: Some(1),
                    text: "  ".to_string(),
                },
                PageText {
                    page_number: Some(2),
                    text: "third page has a little more text in it".to_string(),
                },
            ],
        );

        let chunks = chunker.chunk_document(&document).unwrap();

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["chunk_0", "chunk_1", "chunk_2"]);
        assert_eq!(chunks[0].page_number, Some(0));
        assert_eq!(chunks[1].page_number, Some(2));
        assert_eq!(chunks[1].metadata["source"], "data/pdf/report.pdf");
        assert_eq!(chunks[1].metadata["page_number"], "2");
        assert_eq!(chunks[2].metadata["chunk_id"], "chunk_2");
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let chunker = Chunker::for_model(
            ChunkerConfig {
                chunk_size: 30,
                chunk_overlap: 5,
                ..ChunkerConfig::default()
            },
            "gpt-4",
        )
        .unwrap();
        let text = "Integration architects design interfaces. They align systems.\n\n"
            .repeat(20);
        let document = SourceDocument::from_text("arch.pdf", text);

        let first = chunker.chunk_document(&document).unwrap();
        let second = chunker.chunk_document(&document).unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
