//! Ollama embedding backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::{EmbeddingConfig, EmbeddingProvider};
use crate::error::{AiError, Result};

pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    config: EmbeddingConfig,
}

impl OllamaEmbedding {
    /// Create an embedding backend for `model` served at `base_url`.
    ///
    /// The hosted embedding model id is accepted and mapped to its local
    /// equivalent so historical callers keep working.
    pub fn new(base_url: impl Into<String>, model: Option<String>) -> Self {
        let model = match model.as_deref() {
            Some("text-embedding-ada-002") | None => "nomic-embed-text".to_string(),
            Some(other) => other.to_string(),
        };
        let dimension = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768,
        };

        Self {
            client: Client::new(),
            base_url: base_url.into(),
            config: EmbeddingConfig {
                model,
                dimension,
                timeout_secs: 30,
            },
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let normalized = self.normalize_text(text);
        let embeddings = self.embed_batch(&[normalized]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Backend("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
        };

        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AiError::Backend(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.base_url
                    ))
                } else {
                    AiError::Backend(format!("Embedding request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::Backend(format!(
                "Ollama embed API error ({status}): {error_text}"
            )));
        }

        let data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AiError::Backend(format!("Invalid embed response: {e}")))?;

        if data.embeddings.len() != texts.len() {
            return Err(AiError::Backend(format!(
                "Embedding count mismatch: sent {}, received {}",
                texts.len(),
                data.embeddings.len()
            )));
        }

        Ok(data.embeddings)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
