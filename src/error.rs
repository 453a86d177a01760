//! Error types shared by every stage of the pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    /// Empty or otherwise unusable document or query.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Embedding or completion model could not be loaded or is not configured.
    #[error("Model unavailable: {0}")]
    ModelLoad(String),

    /// Mismatched counts, dimensions or duplicate ids.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Vector store unreachable or corrupt.
    #[error("Index error: {0}")]
    Index(String),

    /// The language-model or embedding service returned an error.
    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for RagError {
    fn from(e: sled::Error) -> Self {
        RagError::Index(e.to_string())
    }
}

impl From<bincode::Error> for RagError {
    fn from(e: bincode::Error) -> Self {
        RagError::Index(format!("Failed to (de)serialize record: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
