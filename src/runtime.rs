use std::sync::Arc;

use crate::config::{RagConfig, DEFAULT_EMBEDDING_MODEL};
use crate::credentials::CredentialProvider;
use crate::error::Result;
use crate::rag::chunker::{Chunker, ChunkerConfig};
use crate::rag::embeddings::{EmbeddingProvider, EmbeddingService, OpenAiEmbeddingProvider};
use crate::rag::ingest::IngestionOrchestrator;
use crate::rag::query::QueryOrchestrator;
use crate::rag::retriever::RetrieverPipeline;
use crate::rag::synthesizer::{AnswerSynthesizer, CompletionService, OpenAiCompletionService};
use crate::rag::vector_store::VectorStore;

/// Process-wide wiring: one embedding service and one index shared by the
/// ingestion and query sides.
pub struct RagRuntime {
    pub config: RagConfig,
    pub embeddings: Arc<EmbeddingService>,
    pub vector_store: VectorStore,
    pub ingestion: IngestionOrchestrator,
    pub query: QueryOrchestrator,
}

impl RagRuntime {
    /// Wire the OpenAI-compatible services described by `config`.
    pub async fn from_config(config: RagConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let api_key = credentials.api_key().await;
        let embedding_provider = Arc::new(OpenAiEmbeddingProvider::new(&config.api_base, &api_key));
        let completion = Arc::new(OpenAiCompletionService::new(config.api_base.clone(), credentials));

        Self::with_services(config, embedding_provider, completion)
    }

    pub fn with_services(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self> {
        config.validate()?;

        let chunker = Chunker::for_model(
            ChunkerConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
                ..ChunkerConfig::default()
            },
            &config.tokenizer_model,
        )?;

        let embeddings = Arc::new(EmbeddingService::with_fallback(
            embedding_provider,
            config.embedding_model.clone(),
            DEFAULT_EMBEDDING_MODEL,
        ));
        let vector_store = VectorStore::open(&config.storage_dir, &config.collection)?;

        tracing::info!(
            storage_dir = %config.storage_dir.display(),
            collection = %config.collection,
            embedding_model = %config.embedding_model,
            records = vector_store.count(),
            "RAG runtime ready"
        );

        Ok(Self {
            ingestion: IngestionOrchestrator::new(chunker, embeddings.clone(), vector_store.clone()),
            query: QueryOrchestrator::new(
                RetrieverPipeline::new(embeddings.clone(), vector_store.clone()),
                AnswerSynthesizer::new(completion, config.completion_model.clone()),
            ),
            embeddings,
            vector_store,
            config,
        })
    }
}
