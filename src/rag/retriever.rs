use std::sync::Arc;

use super::embeddings::EmbeddingService;
use super::reranker::RerankerService;
use super::vector_store::VectorStore;
use super::RetrievedChunk;
use crate::error::Result;

pub struct RetrieverPipeline {
    embeddings: Arc<EmbeddingService>,
    vector_store: VectorStore,
    reranker: RerankerService,
}

impl RetrieverPipeline {
    pub fn new(embeddings: Arc<EmbeddingService>, vector_store: VectorStore) -> Self {
        Self {
            reranker: RerankerService::new(embeddings.clone()),
            embeddings,
            vector_store,
        }
    }

    /// The `top_k` chunks most relevant to `query`, most similar first.
    ///
    /// Never fails: embedding or index errors are logged and produce an empty
    /// result, which callers treat as "no grounding available".
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        tracing::info!(top_k, "Retrieving documents for query");

        match self.try_retrieve(query, top_k).await {
            Ok(chunks) => {
                tracing::debug!(retrieved = chunks.len(), "Retrieval finished");
                chunks
            }
            Err(e) => {
                tracing::error!(error = %e, "Error during retrieval");
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        // Step 1: Create query embedding
        let query_vector = self.embeddings.embed_one(query).await?;
        if query_vector.is_empty() {
            tracing::warn!("Failed to generate embedding for the query");
            return Ok(Vec::new());
        }

        // Step 2: Nearest neighbours in the index's own metric
        let hits = self.vector_store.query(&query_vector, top_k)?;

        // Step 3: Rescore against fresh embeddings of the candidates
        self.reranker.rerank(&query_vector, hits).await
    }
}
