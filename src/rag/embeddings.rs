use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::{types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::DEFAULT_EMBEDDING_MODEL;
use crate::error::{RagError, Result};

/// A loaded embedding model.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this model produces.
    fn dimension(&self) -> usize;

    /// Encode all texts in one call, one vector per text, in input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Loads embedding models by name.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn load(&self, model_name: &str) -> Result<Arc<dyn EmbeddingModel>>;
}

/// Process-scoped embedding service.
///
/// The model is loaded on first use and then shared by every caller. If the
/// requested model cannot be loaded, the fallback model is tried once; if that
/// fails too the error is returned and the service stays unloaded.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    model_name: String,
    fallback_model: String,
    model: RwLock<Option<Arc<dyn EmbeddingModel>>>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, model_name: impl Into<String>) -> Self {
        Self::with_fallback(provider, model_name, DEFAULT_EMBEDDING_MODEL)
    }

    pub fn with_fallback(
        provider: Arc<dyn EmbeddingProvider>,
        model_name: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        let model_name = model_name.into();
        let fallback_model = fallback_model.into();
        Self {
            provider,
            // absent selector means the default
            model_name: if model_name.trim().is_empty() {
                fallback_model.clone()
            } else {
                model_name
            },
            fallback_model,
            model: RwLock::new(None),
        }
    }

    /// Name of the loaded model, if any.
    pub async fn loaded_model(&self) -> Option<String> {
        self.model.read().await.as_ref().map(|m| m.name().to_string())
    }

    /// Encode `texts` in one batch, one vector per text in input order.
    ///
    /// A failed encode drops the loaded model, reloads it and retries once.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut model = self.model().await?;
        let attempt = model.encode(texts).await;
        let embeddings = match attempt {
            Ok(embeddings) => embeddings,
            Err(e) => {
                tracing::warn!(model = model.name(), error = %e, "Embedding failed, reloading model");
                model = self.reload().await?;
                model.encode(texts).await?
            }
        };

        if embeddings.len() != texts.len() {
            return Err(RagError::Validation(format!(
                "Model {} returned {} embeddings for {} texts",
                model.name(),
                embeddings.len(),
                texts.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != model.dimension()) {
            return Err(RagError::Validation(format!(
                "Model {} returned a {}-dimensional embedding, expected {}",
                model.name(),
                bad.len(),
                model.dimension()
            )));
        }
        if embeddings.iter().flatten().any(|v| !v.is_finite()) {
            return Err(RagError::Validation(format!(
                "Model {} returned an embedding with non-finite values",
                model.name()
            )));
        }

        tracing::debug!(model = model.name(), count = embeddings.len(), "Created embeddings");
        Ok(embeddings)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Upstream("No embedding returned".to_string()))
    }

    /// Drop the loaded model and load it again.
    pub async fn reload(&self) -> Result<Arc<dyn EmbeddingModel>> {
        let mut slot = self.model.write().await;
        *slot = None;
        let model = self.load_with_fallback().await?;
        *slot = Some(model.clone());
        Ok(model)
    }

    async fn model(&self) -> Result<Arc<dyn EmbeddingModel>> {
        if let Some(model) = self.model.read().await.as_ref() {
            return Ok(model.clone());
        }

        let mut slot = self.model.write().await;
        // another task may have loaded it while we waited
        if let Some(model) = slot.as_ref() {
            return Ok(model.clone());
        }

        let model = self.load_with_fallback().await?;
        *slot = Some(model.clone());
        Ok(model)
    }

    async fn load_with_fallback(&self) -> Result<Arc<dyn EmbeddingModel>> {
        match self.provider.load(&self.model_name).await {
            Ok(model) => {
                tracing::info!(
                    model = model.name(),
                    dimension = model.dimension(),
                    "Embedding model loaded"
                );
                Ok(model)
            }
            Err(e) if self.model_name != self.fallback_model => {
                tracing::warn!(
                    model = %self.model_name,
                    fallback = %self.fallback_model,
                    error = %e,
                    "Failed to load embedding model, trying fallback"
                );
                let model = self.provider.load(&self.fallback_model).await.map_err(|e| {
                    RagError::ModelLoad(format!(
                        "Failed to load embedding models '{}' and '{}': {}",
                        self.model_name, self.fallback_model, e
                    ))
                })?;
                tracing::info!(model = model.name(), dimension = model.dimension(), "Fallback embedding model loaded");
                Ok(model)
            }
            Err(e) => Err(RagError::ModelLoad(format!(
                "Failed to load embedding model '{}': {}",
                self.model_name, e
            ))),
        }
    }
}

/// Embedding models served over the OpenAI embeddings API (OVMS, vLLM, OpenAI).
pub struct OpenAiEmbeddingProvider {
    config: OpenAIConfig,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        // local servers ignore the key but the client always sends one
        let api_key = if api_key.is_empty() { "unused" } else { api_key };
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self { config }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    /// Probes the model with one request to verify the name and learn the dimension.
    async fn load(&self, model_name: &str) -> Result<Arc<dyn EmbeddingModel>> {
        let client = Client::with_config(self.config.clone());
        let probe = request_embeddings(&client, model_name, &["dimension probe".to_string()])
            .await
            .map_err(|e| RagError::ModelLoad(e.to_string()))?;

        let dimension = probe.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(RagError::ModelLoad(format!(
                "Model {} returned an empty embedding",
                model_name
            )));
        }

        Ok(Arc::new(OpenAiEmbeddingModel {
            client,
            name: model_name.to_string(),
            dimension,
        }))
    }
}

pub struct OpenAiEmbeddingModel {
    client: Client<OpenAIConfig>,
    name: String,
    dimension: usize,
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddingModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        request_embeddings(&self.client, &self.name, texts).await
    }
}

async fn request_embeddings(
    client: &Client<OpenAIConfig>,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let request = CreateEmbeddingRequestArgs::default()
        .model(model)
        .input(texts.to_vec())
        .build()
        .map_err(|e| RagError::Upstream(format!("Failed to build embedding request: {}", e)))?;

    let response = client
        .embeddings()
        .create(request)
        .await
        .map_err(|e| RagError::Upstream(format!("Failed to create embeddings: {}", e)))?;

    // the API reports each vector's input position
    let mut data = response.data;
    data.sort_by_key(|item| item.index);

    Ok(data.into_iter().map(|item| item.embedding).collect())
}
