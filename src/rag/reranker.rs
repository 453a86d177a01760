use std::sync::Arc;

use super::embeddings::EmbeddingService;
use super::vector_store::cosine_similarity;
use super::{IndexHit, RetrievedChunk};
use crate::error::Result;

/// Rescores index candidates with a freshly computed cosine similarity.
///
/// The score comes from re-embedding each candidate's stored text rather than
/// from the index distance, so ranking does not depend on which metric the
/// index backend uses.
pub struct RerankerService {
    embeddings: Arc<EmbeddingService>,
}

impl RerankerService {
    pub fn new(embeddings: Arc<EmbeddingService>) -> Self {
        Self { embeddings }
    }

    /// Score `hits` against `query_vector` and order them by similarity,
    /// highest first. Equal scores keep the index's order; `rank` keeps the
    /// index position either way.
    pub async fn rerank(&self, query_vector: &[f32], hits: Vec<IndexHit>) -> Result<Vec<RetrievedChunk>> {
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = hits.iter().map(|hit| hit.record.text.clone()).collect();
        let candidate_vectors = self.embeddings.embed(&texts).await?;

        let mut reranked: Vec<RetrievedChunk> = hits
            .into_iter()
            .zip(candidate_vectors)
            .map(|(hit, vector)| RetrievedChunk {
                similarity_score: cosine_similarity(query_vector, &vector),
                id: hit.record.id,
                text: hit.record.text,
                metadata: hit.record.metadata,
                distance: hit.distance,
                rank: hit.rank,
            })
            .collect();

        reranked.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));

        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::test_support::{keyword_vector, KeywordProvider};
    use crate::rag::{IndexRecord, Metadata};

    fn hit(text: &str, vector: Vec<f32>, rank: usize) -> IndexHit {
        IndexHit {
            record: IndexRecord {
                id: format!("id-{}", rank),
                text: text.to_string(),
                vector,
                metadata: Metadata::new(),
                created_at: 0,
            },
            distance: rank as f32 * 0.1,
            rank,
        }
    }

    fn reranker() -> RerankerService {
        RerankerService::new(Arc::new(EmbeddingService::new(
            Arc::new(KeywordProvider::default()),
            "keywords",
        )))
    }

    #[tokio::test]
    async fn test_scores_come_from_fresh_embeddings() {
        let query = keyword_vector("banana");
        // stored vectors are deliberately wrong; only the text matters
        let hits = vec![
            hit("apple notes", keyword_vector("banana"), 1),
            hit("banana notes", keyword_vector("apple"), 2),
        ];

        let reranked = reranker().rerank(&query, hits).await.unwrap();

        assert_eq!(reranked[0].text, "banana notes");
        assert_eq!(reranked[0].rank, 2);
        assert_eq!(reranked[1].rank, 1);
        assert!(reranked[0].similarity_score > reranked[1].similarity_score);
        assert!((reranked[1].distance - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ties_keep_index_order() {
        let query = keyword_vector("river");
        let hits = vec![
            hit("violin", vec![], 1),
            hit("wheat", vec![], 2),
            hit("engine", vec![], 3),
        ];

        let reranked = reranker().rerank(&query, hits).await.unwrap();

        let ranks: Vec<usize> = reranked.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_scores_are_bounded() {
        let query = keyword_vector("apple banana");
        let hits = vec![
            hit("apple apple apple", vec![], 1),
            hit("cherry", vec![], 2),
            hit("", vec![], 3),
        ];

        let reranked = reranker().rerank(&query, hits).await.unwrap();

        assert_eq!(reranked.len(), 3);
        for chunk in reranked {
            assert!((-1.0..=1.0).contains(&chunk.similarity_score));
        }
    }
}
