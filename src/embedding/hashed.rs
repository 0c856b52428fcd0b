//! Deterministic hash-projection embedder.

use super::Embedder;
use crate::Result;
use sha2::{Digest, Sha256};

/// Token-hash embedder.
///
/// Each lowercased token (and each adjacent-token bigram, for a little word
/// order sensitivity) is hashed into a fixed number of buckets with a signed
/// contribution; the result is unit-normalized. Deterministic across
/// processes and platforms, which keeps retrieval reproducible in tests.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Default embedding dimensions.
    pub const DEFAULT_DIMENSIONS: usize = 256;

    /// Creates a new hash embedder with the default dimensions.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }

    /// Creates a hash embedder with explicit dimensions.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn accumulate(&self, token: &str, weight: f32, out: &mut [f32]) {
        let digest = Sha256::digest(token.as_bytes());
        let bucket = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) as usize
            % self.dimensions;
        // Second hash byte decides the sign so buckets cancel rather than
        // accumulate systematic positive bias.
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect();

        for token in &tokens {
            self.accumulate(token, 1.0, &mut vector);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&format!("{} {}", pair[0], pair[1]), 0.5, &mut vector);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crt::similarity;

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.encode("I work at Microsoft").unwrap();
        let b = embedder.encode("I work at Microsoft").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_normalized() {
        let embedder = HashEmbedder::new();
        let v = embedder.encode("my name is Sarah").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let embedder = HashEmbedder::new();
        let base = embedder.encode("I work at Microsoft as an engineer").unwrap();
        let close = embedder.encode("I work at Amazon as an engineer").unwrap();
        let far = embedder.encode("the quick brown fox jumps over the lazy dog").unwrap();
        assert!(similarity(&base, &close) > similarity(&base, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new();
        let v = embedder.encode("").unwrap();
        assert!(v.iter().all(|x| x.abs() < f32::EPSILON));
        assert_eq!(v.len(), HashEmbedder::DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_custom_dimensions() {
        let embedder = HashEmbedder::with_dimensions(64);
        assert_eq!(embedder.dimensions(), 64);
        assert_eq!(embedder.encode("hello world").unwrap().len(), 64);
    }
}
