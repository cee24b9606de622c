//! Embedding provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// Embedding backend configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

/// A backend capable of turning text into vectors.
///
/// `embed_batch` must return one vector per input, in input order, and may
/// fail wholesale; callers never receive partial batches.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension.
    fn dimension(&self) -> usize;

    /// Get model name.
    fn model_name(&self) -> &str;

    /// Normalize text before embedding (optional).
    fn normalize_text(&self, text: &str) -> String {
        text.trim()
            .chars()
            .filter(|c| !c.is_control())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
