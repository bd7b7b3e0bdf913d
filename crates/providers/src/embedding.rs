use crate::traits::EmbeddingEngine;
use ok_domain::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic stand-in for a real embedding model, used by tests and the
/// scripted demo harness. Not a semantic embedding: content that shares
/// tokens lands closer together only by coincidence of hashing, never by
/// meaning. The real embedding model is an external collaborator (see
/// `SPEC_FULL.md` §6) and has no implementation here.
pub struct HashEmbeddingEngine {
    dim: usize,
}

impl HashEmbeddingEngine {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashEmbeddingEngine {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait::async_trait]
impl EmbeddingEngine for HashEmbeddingEngine {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash as usize) % self.dim;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_content_embeds_identically() {
        let engine = HashEmbeddingEngine::default();
        let a = engine.embed("find the nearest coffee shop").await.unwrap();
        let b = engine.embed("find the nearest coffee shop").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn output_is_unit_length_when_nonzero() {
        let engine = HashEmbeddingEngine::default();
        let v = engine.embed("some content to embed").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let engine = HashEmbeddingEngine::default();
        let v = engine.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
