//! Embedding generation.
//!
//! The engine is embedder-agnostic: anything implementing [`Embedder`] can
//! be plugged in. The in-crate [`HashEmbedder`] is a deterministic
//! token-hash projection good enough for tests and offline use.

// Hash-bucket index math truncates by design.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

mod hashed;

pub use hashed::HashEmbedder;

use crate::Result;

/// Trait for embedding generators.
///
/// Implementations must be deterministic and return unit-normalized vectors
/// of a fixed dimension.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}
