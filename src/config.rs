use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

/// Embedding model loaded when the configured one is unavailable.
pub const DEFAULT_EMBEDDING_MODEL: &str = "bge-base-en-v1.5-int8-ov";

/// Local OVMS endpoint speaking the OpenAI REST dialect.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/v3";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Target chunk size, in tokens
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Model name selecting the token-counting scheme ("words" for whitespace words)
    pub tokenizer_model: String,
    pub embedding_model: String,
    /// Completion model; answering fails fast when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_model: Option<String>,
    /// Base URL of the OpenAI-compatible service used for embeddings and completions
    pub api_base: String,
    pub storage_dir: PathBuf,
    pub collection: String,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 50,
            tokenizer_model: "gpt-5".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            completion_model: None,
            api_base: DEFAULT_API_BASE.to_string(),
            storage_dir: PathBuf::from("data").join("vector_store"),
            collection: "pdf_documents".to_string(),
            top_k: 5,
        }
    }
}

impl RagConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| RagError::Validation(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::Validation(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// `~/.sparrow/rag_config.json`
    pub fn default_path() -> Result<PathBuf> {
        Ok(sparrow_home()?.join("rag_config.json"))
    }

    /// Overlay `SPARROW_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty("SPARROW_EMBEDDING_MODEL") {
            self.embedding_model = model;
        }
        if let Some(model) = non_empty("SPARROW_COMPLETION_MODEL") {
            self.completion_model = Some(model);
        }
        if let Some(base) = non_empty("SPARROW_API_BASE") {
            self.api_base = base;
        }
        if let Some(dir) = non_empty("SPARROW_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(collection) = non_empty("SPARROW_COLLECTION") {
            self.collection = collection;
        }
        if let Some(model) = non_empty("SPARROW_TOKENIZER_MODEL") {
            self.tokenizer_model = model;
        }
        if let Some(size) = non_empty("SPARROW_CHUNK_SIZE") {
            self.chunk_size = parse_count("SPARROW_CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = non_empty("SPARROW_CHUNK_OVERLAP") {
            self.chunk_overlap = parse_count("SPARROW_CHUNK_OVERLAP", &overlap)?;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Validation("chunk_size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Validation("collection name must not be empty".to_string()));
        }
        if self.top_k == 0 {
            return Err(RagError::Validation("top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// The `.sparrow` directory under the user's home.
pub fn sparrow_home() -> Result<PathBuf> {
    let home_dir = std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .map_err(|_| RagError::Input("Failed to get user home directory".to_string()))?;

    Ok(PathBuf::from(home_dir).join(".sparrow"))
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| RagError::Validation(format!("{} must be a non-negative integer, got '{}'", key, value)))
}
