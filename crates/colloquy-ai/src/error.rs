//! Error types for the serving core

use thiserror::Error;

/// Serving core error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Backend unavailable: {0}")]
    Backend(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for serving core operations
pub type Result<T> = std::result::Result<T, AiError>;
