use serde::{Deserialize, Serialize};

use super::retriever::RetrieverPipeline;
use super::synthesizer::AnswerSynthesizer;
use super::RetrievedChunk;
use crate::error::{RagError, Result};

/// An answer together with the evidence it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Best similarity among the retrieved chunks, clamped to [0, 1]
    pub confidence_score: f32,
    /// Distinct `source` metadata values in retrieval order
    pub sources: Vec<String>,
}

pub struct QueryOrchestrator {
    retriever: RetrieverPipeline,
    synthesizer: AnswerSynthesizer,
}

impl QueryOrchestrator {
    pub fn new(retriever: RetrieverPipeline, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            retriever,
            synthesizer,
        }
    }

    pub async fn answer(&self, query: &str, top_k: usize) -> Result<String> {
        Ok(self.answer_with_sources(query, top_k).await?.answer)
    }

    pub async fn answer_with_sources(&self, query: &str, top_k: usize) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(RagError::Input("Query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(RagError::Input("top_k must be at least 1".to_string()));
        }

        let retrieved = self.retriever.retrieve(query, top_k).await;
        let answer = self.synthesizer.synthesize(query, &retrieved).await?;

        Ok(Answer {
            answer,
            confidence_score: confidence(&retrieved),
            sources: sources(&retrieved),
        })
    }
}

fn confidence(retrieved: &[RetrievedChunk]) -> f32 {
    retrieved
        .iter()
        .map(|chunk| chunk.similarity_score)
        .fold(0.0_f32, f32::max)
        .clamp(0.0, 1.0)
}

fn sources(retrieved: &[RetrievedChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for source in retrieved.iter().filter_map(|chunk| chunk.metadata.get("source")) {
        if !sources.contains(source) {
            sources.push(source.clone());
        }
    }
    sources
}
