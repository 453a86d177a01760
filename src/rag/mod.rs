pub mod chunker;
pub mod documents;
pub mod embeddings;
pub mod ingest;
pub mod query;
pub mod reranker;
pub mod retriever;
pub mod synthesizer;
pub mod tokenizer;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod test_support;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, String>;

/// A bounded span of one document's text with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequential within one ingestion call: `chunk_0`, `chunk_1`, ...
    pub id: String,
    pub text: String,
    pub source: String,
    pub page_number: Option<u32>,
    pub metadata: Metadata,
}

/// One page of extracted document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// `None` when the source has no page structure
    pub page_number: Option<u32>,
    pub text: String,
}

/// A document ready for chunking, identified by its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub path: String,
    pub pages: Vec<PageText>,
}

impl SourceDocument {
    pub fn new(path: impl Into<String>, pages: Vec<PageText>) -> Self {
        Self {
            path: path.into(),
            pages,
        }
    }

    /// A document without page structure.
    pub fn from_text(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            path,
            vec![PageText {
                page_number: None,
                text: text.into(),
            }],
        )
    }

    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|page| page.text.trim().is_empty())
    }
}

/// Input to `VectorStore::add`.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// Generated when absent
    pub id: Option<String>,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    pub created_at: i64,
}

/// A record returned by a nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub record: IndexRecord,
    /// Cosine distance to the query vector
    pub distance: f32,
    /// 1-based position in ascending-distance order
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Distance reported by the index
    pub distance: f32,
    /// Position in the index's own result order
    pub rank: usize,
    /// Cosine similarity between the query and a fresh embedding of `text`
    pub similarity_score: f32,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub source: String,
    pub chunk_count: usize,
    pub record_ids: Vec<String>,
}
