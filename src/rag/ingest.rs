use std::path::Path;
use std::sync::Arc;

use super::chunker::Chunker;
use super::documents::load_document;
use super::embeddings::EmbeddingService;
use super::vector_store::VectorStore;
use super::{IngestReport, SourceDocument};
use crate::error::{RagError, Result};

/// Chunks, embeds and indexes one document per call.
pub struct IngestionOrchestrator {
    chunker: Chunker,
    embeddings: Arc<EmbeddingService>,
    vector_store: VectorStore,
}

impl IngestionOrchestrator {
    pub fn new(chunker: Chunker, embeddings: Arc<EmbeddingService>, vector_store: VectorStore) -> Self {
        Self {
            chunker,
            embeddings,
            vector_store,
        }
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    /// Index every chunk of `document` in a single batch.
    ///
    /// Nothing is written unless chunking and embedding both succeed.
    pub async fn ingest(&self, document: &SourceDocument) -> Result<IngestReport> {
        tracing::info!(source = %document.path, "Starting document ingestion");

        let chunks = self.chunker.chunk_document(document)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embeddings.embed(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Validation(format!(
                "Got {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let metadatas = chunks.into_iter().map(|c| c.metadata).collect();
        let record_ids = self.vector_store.add_texts(texts, vectors, metadatas)?;

        tracing::info!(
            source = %document.path,
            collection = %self.vector_store.collection(),
            chunks = record_ids.len(),
            "Document ingested"
        );

        Ok(IngestReport {
            source: document.path.clone(),
            chunk_count: record_ids.len(),
            record_ids,
        })
    }

    /// Load a file from disk and ingest it.
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        let document = load_document(path)?;
        self.ingest(&document).await
    }
}
