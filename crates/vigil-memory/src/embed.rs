//! The embedding seam.
//!
//! The vector store is generic over where embeddings come from. Real
//! deployments inject a model-backed implementation; the built-in
//! [`HashEmbedder`] maps token counts into a fixed number of hash
//! buckets, which is deterministic, dependency-free, and good enough for
//! near-duplicate detection and coarse relevance ranking.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use vigil_types::Result;

/// Produces embedding vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimensionality of the produced vectors.
    fn dimension(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic bag-of-tokens embedder.
///
/// Tokens (lowercased alphanumeric runs) and their in-text bigrams are
/// hashed into `dimension` buckets; the resulting count vector is
/// L2-normalized. Identical texts embed identically, token-overlapping
/// texts land close, unrelated texts land far.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            vector[self.bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[self.bucket(&bigram)] += 0.5;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine distance: `1 - similarity`, the metric the dedup threshold is
/// defined over.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_identical_embedding() {
        let e = HashEmbedder::default();
        let a = e.embed("the quick brown fox").await.unwrap();
        let b = e.embed("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
        assert!(cosine_distance(&a, &b) < 1e-6);
    }

    #[tokio::test]
    async fn embedding_is_normalized() {
        let e = HashEmbedder::default();
        let v = e.embed("some text to embed here").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[tokio::test]
    async fn similar_texts_are_closer_than_unrelated() {
        let e = HashEmbedder::default();
        let base = e.embed("budget status for openai provider").await.unwrap();
        let similar = e.embed("openai provider budget status check").await.unwrap();
        let unrelated = e.embed("quantum chromodynamics lattice simulation").await.unwrap();
        assert!(
            cosine_distance(&base, &similar) < cosine_distance(&base, &unrelated),
            "similar should be closer"
        );
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let e = HashEmbedder::default();
        let v = e.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn case_insensitive() {
        let e = HashEmbedder::default();
        let a = e.embed("Hello World").await.unwrap();
        let b = e.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dimension_floor() {
        assert_eq!(HashEmbedder::new(2).dimension(), 8);
        assert_eq!(HashEmbedder::new(256).dimension(), 256);
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) > 0.99);
    }
}
