//! Model routing: logical model ids to live backend handles.
//!
//! Resolution is total. The alias table maps every recognized logical id to
//! a backend target, and anything else falls back to the canonical default,
//! so a request never fails just because it names a retired or misspelled
//! model. Several historical ids alias onto one consolidated backend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::CoreConfig;
use crate::llm::{LlmClient, OllamaClient};

/// Logical ids served by the consolidated chat backend.
const CANONICAL_ALIASES: &[&str] = &["azure-3.5", "gpt-3.5-turbo", "gpt-4", "mistral::1.5b"];

/// Physical model the canonical aliases resolve to.
const CANONICAL_MODEL: &str = "mistral";

/// Physical backend configuration a logical id resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendTarget {
    /// Model name passed to the backend.
    pub model: String,
    /// Sampling temperature for the serving path.
    pub temperature: f32,
    /// Whether the backend should stream its completion.
    pub streaming: bool,
}

impl BackendTarget {
    fn canonical() -> Self {
        Self {
            model: CANONICAL_MODEL.to_string(),
            temperature: 0.0,
            streaming: true,
        }
    }
}

/// Live handle for one resolved model.
///
/// Stateless beyond configuration; many requests share one handle and the
/// backend client behind it.
#[derive(Clone)]
pub struct ModelHandle {
    /// The logical id the caller asked for.
    pub logical_id: String,
    pub client: Arc<dyn LlmClient>,
    pub temperature: f32,
    pub streaming: bool,
}

/// Resolves logical model identifiers to backend handles.
///
/// Adding an alias is a data change (`with_alias`), not a code change.
/// Safe for concurrent use: the alias table is immutable after
/// construction and the client cache is lock-guarded.
pub struct ModelRouter {
    base_url: String,
    aliases: HashMap<String, BackendTarget>,
    default_target: BackendTarget,
    clients: RwLock<HashMap<String, Arc<dyn LlmClient>>>,
}

impl ModelRouter {
    /// Build the router with the canonical alias table.
    pub fn new(config: &CoreConfig) -> Self {
        let mut aliases = HashMap::new();
        for alias in CANONICAL_ALIASES {
            aliases.insert((*alias).to_string(), BackendTarget::canonical());
        }

        Self {
            base_url: config.base_url.clone(),
            aliases,
            default_target: BackendTarget::canonical(),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Register an additional logical id.
    pub fn with_alias(mut self, logical_id: impl Into<String>, target: BackendTarget) -> Self {
        self.aliases.insert(normalize_model_id(&logical_id.into()), target);
        self
    }

    /// All recognized logical ids, sorted.
    pub fn recognized_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.aliases.keys().cloned().collect();
        models.sort();
        models
    }

    /// Resolve a logical id to a live handle. Never fails: unrecognized or
    /// empty ids resolve to the canonical default and log a warning.
    pub fn resolve(&self, logical_id: &str, api_key: Option<&str>) -> ModelHandle {
        // Accepted for interface compatibility; the local backend has no
        // use for a credential.
        if api_key.is_some() {
            tracing::debug!(logical_id, "API key ignored by local backend");
        }

        let key = normalize_model_id(logical_id);
        let target = match self.aliases.get(&key) {
            Some(target) => {
                tracing::info!(logical_id, model = %target.model, "Routing to consolidated backend");
                target.clone()
            }
            None => {
                tracing::warn!(
                    logical_id,
                    default = %self.default_target.model,
                    "Model not found, using default"
                );
                self.default_target.clone()
            }
        };

        let client = self.client_for(&target);
        ModelHandle {
            logical_id: logical_id.to_string(),
            client,
            temperature: target.temperature,
            streaming: target.streaming,
        }
    }

    /// Fetch or lazily build the shared client for a backend target.
    fn client_for(&self, target: &BackendTarget) -> Arc<dyn LlmClient> {
        if let Some(client) = self.clients.read().get(&target.model) {
            return Arc::clone(client);
        }

        let mut clients = self.clients.write();
        // Another request may have built it between the locks.
        if let Some(client) = clients.get(&target.model) {
            return Arc::clone(client);
        }

        let client: Arc<dyn LlmClient> = Arc::new(
            OllamaClient::new(self.base_url.clone(), target.model.clone())
                .with_streaming(target.streaming),
        );
        clients.insert(target.model.clone(), Arc::clone(&client));
        client
    }
}

fn normalize_model_id(model: &str) -> String {
    model.trim().to_lowercase()
}
