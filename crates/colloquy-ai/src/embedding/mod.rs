//! Embedding backends and the cache-aside layer.

mod cache;
mod ollama;
mod provider;

pub use cache::EmbeddingCache;
pub use ollama::OllamaEmbedding;
pub use provider::{EmbeddingConfig, EmbeddingProvider};
