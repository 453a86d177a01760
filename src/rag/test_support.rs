//! Deterministic stand-ins for the embedding and completion services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::embeddings::{EmbeddingModel, EmbeddingProvider};
use super::synthesizer::{CompletionRequest, CompletionService};
use super::{Metadata, RetrievedChunk};
use crate::error::{RagError, Result};

pub const VOCABULARY: [&str; 8] = [
    "apple", "banana", "cherry", "engine", "planet", "river", "violin", "wheat",
];

/// One dimension per vocabulary word plus a constant bias, so no text maps
/// to the zero vector.
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; VOCABULARY.len() + 1];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        for (i, word) in VOCABULARY.iter().enumerate() {
            if token.starts_with(word) {
                vector[i] += 1.0;
            }
        }
    }
    vector[VOCABULARY.len()] = 0.1;
    vector
}

pub struct KeywordModel {
    name: String,
}

#[async_trait]
impl EmbeddingModel for KeywordModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

/// Counts every load attempt; rejects the names it was told to.
#[derive(Default)]
pub struct KeywordProvider {
    loads: AtomicUsize,
    rejected: Vec<String>,
    model: Option<Arc<dyn EmbeddingModel>>,
}

impl KeywordProvider {
    pub fn reject(mut self, model_name: &str) -> Self {
        self.rejected.push(model_name.to_string());
        self
    }

    pub fn with_model(mut self, model: impl EmbeddingModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    async fn load(&self, model_name: &str) -> Result<Arc<dyn EmbeddingModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.rejected.iter().any(|r| r == model_name) {
            return Err(RagError::ModelLoad(format!("unknown model {}", model_name)));
        }
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }
        Ok(Arc::new(KeywordModel {
            name: model_name.to_string(),
        }))
    }
}

enum FlakyMode {
    DropLast,
    FailAfter(usize),
    FailFirst(usize),
    NonFinite,
}

/// Keyword model that misbehaves on purpose.
pub struct FlakyModel {
    mode: FlakyMode,
    calls: AtomicUsize,
}

impl FlakyModel {
    pub fn dropping_last() -> Self {
        Self {
            mode: FlakyMode::DropLast,
            calls: AtomicUsize::new(0),
        }
    }

    /// Succeeds `calls` times, then every encode fails.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            mode: FlakyMode::FailAfter(calls),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails the first `calls` encodes, then recovers.
    pub fn failing_first(calls: usize) -> Self {
        Self {
            mode: FlakyMode::FailFirst(calls),
            calls: AtomicUsize::new(0),
        }
    }

    /// Puts a NaN in every vector.
    pub fn non_finite() -> Self {
        Self {
            mode: FlakyMode::NonFinite,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingModel for FlakyModel {
    fn name(&self) -> &str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| keyword_vector(t)).collect();
        match self.mode {
            FlakyMode::DropLast => {
                vectors.pop();
                Ok(vectors)
            }
            FlakyMode::FailAfter(limit) if call > limit => {
                Err(RagError::Upstream("embedding backend unavailable".to_string()))
            }
            FlakyMode::FailAfter(_) => Ok(vectors),
            FlakyMode::FailFirst(limit) if call <= limit => {
                Err(RagError::Upstream("embedding backend unavailable".to_string()))
            }
            FlakyMode::FailFirst(_) => Ok(vectors),
            FlakyMode::NonFinite => {
                for vector in &mut vectors {
                    vector[0] = f32::NAN;
                }
                Ok(vectors)
            }
        }
    }
}

/// Records every request and answers with a fixed reply or error.
pub struct FakeCompletion {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().map_err(RagError::Upstream)
    }
}

pub fn retrieved(text: &str, similarity_score: f32) -> RetrievedChunk {
    RetrievedChunk {
        id: uuid::Uuid::new_v4().to_string(),
        text: text.to_string(),
        metadata: Metadata::new(),
        distance: 1.0 - similarity_score,
        rank: 1,
        similarity_score,
    }
}
