//! Default embedding provider

use super::{EmbeddingProvider, ExtractionError};
use sha2::{Digest, Sha256};

pub const DEFAULT_DIMENSION: usize = 256;

/// Deterministic feature-hashed bag-of-words embedding
///
/// Each lowercase token lands in a SHA-256-chosen bucket with a hash-chosen
/// sign; the vector is L2-normalized. Texts sharing vocabulary get nearby
/// vectors, which is all centroid maintenance needs.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ExtractionError> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket = u64::from_be_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(ExtractionError::Embedding(
                "text contains no tokens".to_string(),
            ));
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Revision of licence fees").unwrap();
        let b = embedder.embed("revision OF licence fees").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::default();
        let base = embedder.embed("licence fee revision for telecom operators").unwrap();
        let near = embedder.embed("licence fee revision for broadband operators").unwrap();
        let far = embedder.embed("annual sports day schedule announced").unwrap();
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }

    #[test]
    fn test_empty_text_fails() {
        assert!(HashingEmbedder::default().embed(" ... ").is_err());
    }
}
