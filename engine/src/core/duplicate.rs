//! Embedding-based near-duplicate detection
//!
//! Ideas are compared by cosine similarity between fixed-dimension
//! embeddings of their canonical text. The detector is a thin comparison
//! layer: the embedding collaborator produces vectors and the store answers
//! nearest-neighbor queries, so no corpus is held or indexed here.

use crate::traits::{EmbeddingProvider, IdeaStore};
use shared::{CandidateIdea, DuplicateResult, EngineResult};
use std::sync::Arc;
use tracing::debug;

/// Cosine similarity between two vectors
///
/// Mathematically in [-1, 1]; natural-text embeddings land in (0, 1].
/// A zero-magnitude vector on either side yields 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // A single sqrt over the product keeps identical vectors at exactly
    // 1.0; sqrt(a)*sqrt(b) drifts below it in floating point
    dot / (norm_a * norm_b).sqrt()
}

/// Canonical embedding input for an idea
///
/// Deterministic so that re-embedding the same idea always compares equal
/// to its stored vector.
pub fn canonical_text(domain: &str, problem: &str, solution: &str) -> String {
    format!("{domain}\n{problem}\n{solution}")
}

/// Compares candidate ideas against the persisted corpus
pub struct DuplicateDetector {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn IdeaStore>,
    /// Similarity at or above which the candidate is a duplicate
    threshold: f64,
    /// Neighbors fetched per check
    nearest_limit: usize,
}

impl DuplicateDetector {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IdeaStore>,
        threshold: f64,
        nearest_limit: usize,
    ) -> Self {
        DuplicateDetector {
            embedder,
            store,
            // Exact matches (similarity 1.0) must always classify as
            // duplicate, so the threshold never exceeds 1.0
            threshold: threshold.min(1.0),
            nearest_limit,
        }
    }

    /// Embed a candidate's canonical text
    pub async fn embed_candidate(&self, candidate: &CandidateIdea) -> EngineResult<Vec<f32>> {
        let text = canonical_text(&candidate.domain, &candidate.problem, &candidate.solution);
        self.embedder.embed(&text).await
    }

    /// Compare an embedding against the corpus and return the best match
    ///
    /// The store picks the neighbor set; the detector re-scores each
    /// neighbor with exact cosine similarity and keeps the single highest.
    pub async fn check(&self, vector: &[f32]) -> EngineResult<DuplicateResult> {
        let neighbors = self.store.find_nearest_by_vector(vector, self.nearest_limit).await?;
        if neighbors.is_empty() {
            return Ok(DuplicateResult::no_match());
        }

        let mut best_id = None;
        let mut best_similarity = f64::NEG_INFINITY;
        for neighbor in &neighbors {
            if neighbor.vector.len() != vector.len() {
                debug!(
                    id = %neighbor.id,
                    "skipping neighbor with mismatched embedding dimension"
                );
                continue;
            }
            let similarity = cosine_similarity(vector, &neighbor.vector);
            if similarity > best_similarity {
                best_similarity = similarity;
                best_id = Some(neighbor.id.clone());
            }
        }

        let Some(match_id) = best_id else {
            return Ok(DuplicateResult::no_match());
        };

        Ok(DuplicateResult {
            is_duplicate: best_similarity >= self.threshold,
            match_id: Some(match_id),
            similarity: best_similarity,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockEmbeddingProvider, MockIdeaStore};
    use shared::NearestIdea;

    fn detector_with_corpus(
        corpus: Vec<NearestIdea>,
        threshold: f64,
    ) -> DuplicateDetector {
        let embedder = MockEmbeddingProvider::new();
        let mut store = MockIdeaStore::new();
        store
            .expect_find_nearest_by_vector()
            .returning(move |_, _| Ok(corpus.clone()));
        DuplicateDetector::new(Arc::new(embedder), Arc::new(store), threshold, 10)
    }

    #[test]
    fn test_cosine_identical_vectors_is_exactly_one() {
        // Exact equality matters: a threshold at the 1.0 ceiling must
        // still classify a self-comparison as duplicate
        let v = vec![0.5, 0.25, -0.1];
        assert_eq!(cosine_similarity(&v, &v), 1.0);
        assert_eq!(cosine_similarity(&[0.6, 0.8], &[0.6, 0.8]), 1.0);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let similarity = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(similarity.abs() < 1e-9);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let similarity = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((similarity + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_dimensions() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_canonical_text_is_deterministic() {
        let a = canonical_text("fintech", "slow settlement", "instant rails");
        let b = canonical_text("fintech", "slow settlement", "instant rails");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_identical_embedding_is_always_duplicate() {
        let vector = vec![0.6f32, 0.8];
        let corpus = vec![NearestIdea {
            id: "idea-1".to_string(),
            vector: vector.clone(),
        }];

        // Even with the threshold at its ceiling, similarity 1.0 classifies
        // as duplicate
        let detector = detector_with_corpus(corpus, 1.0);
        let result = detector.check(&vector).await.unwrap();
        assert!(result.is_duplicate);
        assert_eq!(result.match_id.as_deref(), Some("idea-1"));
        assert!((result.similarity - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_below_threshold_is_not_duplicate() {
        // cos(angle) = 0.8 between these two unit vectors
        let candidate = vec![1.0f32, 0.0];
        let corpus = vec![NearestIdea {
            id: "idea-2".to_string(),
            vector: vec![0.8, 0.6],
        }];

        let detector = detector_with_corpus(corpus, 0.92);
        let result = detector.check(&candidate).await.unwrap();
        assert!(!result.is_duplicate);
        assert!((result.similarity - 0.8).abs() < 1e-6);
        assert_eq!(result.match_id.as_deref(), Some("idea-2"));
    }

    #[tokio::test]
    async fn test_highest_similarity_match_wins() {
        let candidate = vec![1.0f32, 0.0];
        let corpus = vec![
            NearestIdea {
                id: "far".to_string(),
                vector: vec![0.0, 1.0],
            },
            NearestIdea {
                id: "near".to_string(),
                vector: vec![0.99, 0.14],
            },
            NearestIdea {
                id: "mid".to_string(),
                vector: vec![0.7, 0.71],
            },
        ];

        let detector = detector_with_corpus(corpus, 0.92);
        let result = detector.check(&candidate).await.unwrap();
        assert_eq!(result.match_id.as_deref(), Some("near"));
    }

    #[tokio::test]
    async fn test_empty_corpus_is_no_match() {
        let detector = detector_with_corpus(Vec::new(), 0.92);
        let result = detector.check(&[1.0, 0.0]).await.unwrap();
        assert_eq!(result, DuplicateResult::no_match());
    }

    #[tokio::test]
    async fn test_threshold_above_one_is_clamped() {
        let vector = vec![1.0f32, 0.0];
        let corpus = vec![NearestIdea {
            id: "twin".to_string(),
            vector: vector.clone(),
        }];

        let detector = detector_with_corpus(corpus, 1.5);
        assert_eq!(detector.threshold(), 1.0);
        let result = detector.check(&vector).await.unwrap();
        assert!(result.is_duplicate);
    }
}
