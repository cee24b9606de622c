//! Cache-aside wrapper around an embedding backend.
//!
//! Vectors are keyed by content: identical text always maps to the same
//! stored vector, namespaced by embedding model so switching models never
//! serves stale entries. The cache is pure - nothing here invalidates
//! entries; that is the store owner's concern.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use colloquy_storage::KeyValueStore;

use crate::embedding::EmbeddingProvider;
use crate::error::{AiError, Result};

/// Embedding backend with a cache-aside store in front of it.
pub struct EmbeddingCache {
    inner: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl EmbeddingCache {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        let namespace = format!("ollama_embeddings_{}", inner.model_name());
        Self {
            inner,
            store,
            namespace,
        }
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update(b":");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn decode(bytes: &[u8]) -> Result<Vec<f32>> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Embed one text, serving from the store when possible.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.cache_key(text);
        if let Some(bytes) = self.store.get(&key).map_err(AiError::Storage)? {
            return Self::decode(&bytes);
        }

        let vector = self.inner.embed(text).await?;
        self.store
            .set(&key, &serde_json::to_vec(&vector)?)
            .map_err(AiError::Storage)?;
        tracing::debug!(model = %self.inner.model_name(), "Cached embedding on miss");
        Ok(vector)
    }

    /// Embed many texts with one store lookup, one backend batch for the
    /// misses (deduplicated by text), and one store write.
    ///
    /// The output preserves input order and length. If the backend batch
    /// fails, the whole call fails and nothing is written.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = texts.iter().map(|t| self.cache_key(t)).collect();
        let cached = self.store.mget(&keys).map_err(AiError::Storage)?;

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        for bytes in &cached {
            match bytes {
                Some(bytes) => vectors.push(Some(Self::decode(bytes)?)),
                None => vectors.push(None),
            }
        }

        // Dedupe misses by text so each distinct miss is computed once even
        // when the batch repeats it.
        let mut missing_texts: Vec<String> = Vec::new();
        let mut missing_slot: HashMap<&str, usize> = HashMap::new();
        for (position, vector) in vectors.iter().enumerate() {
            if vector.is_none() {
                let text = texts[position].as_str();
                if !missing_slot.contains_key(text) {
                    missing_slot.insert(text, missing_texts.len());
                    missing_texts.push(text.to_string());
                }
            }
        }

        if !missing_texts.is_empty() {
            let computed = self.inner.embed_batch(&missing_texts).await?;
            if computed.len() != missing_texts.len() {
                return Err(AiError::Backend(format!(
                    "Embedding batch mismatch: requested {}, received {}",
                    missing_texts.len(),
                    computed.len()
                )));
            }

            let mut entries = Vec::with_capacity(missing_texts.len());
            for (text, vector) in missing_texts.iter().zip(&computed) {
                entries.push((self.cache_key(text), serde_json::to_vec(vector)?));
            }
            self.store.mset(&entries).map_err(AiError::Storage)?;
            tracing::debug!(
                total = texts.len(),
                computed = missing_texts.len(),
                "Filled embedding cache misses"
            );

            for (position, slot) in vectors.iter_mut().enumerate() {
                if slot.is_none()
                    && let Some(&index) = missing_slot.get(texts[position].as_str())
                {
                    *slot = Some(computed[index].clone());
                }
            }
        }

        let mut output = Vec::with_capacity(texts.len());
        for (position, slot) in vectors.into_iter().enumerate() {
            let vector = slot.ok_or_else(|| {
                AiError::Backend(format!("Embedding batch did not cover input {position}"))
            })?;
            output.push(vector);
        }
        Ok(output)
    }
}
