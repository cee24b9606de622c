//! Configuration surface consumed by the serving core.
//!
//! File/env parsing is owned by the embedding application's config loader;
//! this struct only defines the knobs the core reads and their defaults.

use serde::Deserialize;

/// Default maximum reason/act rounds per agent run.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Default wall-clock ceiling per agent run, in seconds.
pub const DEFAULT_MAX_EXECUTION_SECS: u64 = 300;

/// Default token budget for a conversation's working context.
pub const DEFAULT_TOKEN_BUDGET: usize = 2048;

/// Serving core configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Base address of the model backend.
    pub base_url: String,
    /// Logical model id used when the caller does not pick one.
    pub default_model: String,
    /// Embedding model backing semantic lookups.
    pub embedding_model: String,
    /// Maximum reason/act rounds per run.
    pub max_iterations: usize,
    /// Wall-clock ceiling per run, in seconds.
    pub max_execution_secs: u64,
    /// Token budget for each conversation's working context.
    pub token_budget: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "mistral::1.5b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_execution_secs: DEFAULT_MAX_EXECUTION_SECS,
            token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}
