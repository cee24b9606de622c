//! Colloquy AI - conversational agent serving core
//!
//! This crate provides the request-serving path for a conversational agent:
//! - Model routing: logical model ids to live backend handles with a
//!   deterministic fallback
//! - Cache-aside embedding layer that deduplicates and persists vectors
//! - Token-bounded conversation memory with pair-atomic pruning
//! - Bounded reason/act execution loop with parse-error recovery
//!
//! The HTTP layer, tool business logic and the backing store are external
//! collaborators; this crate defines the traits they plug into.

pub mod agent;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod memory;
pub mod tools;

// Re-export commonly used types
pub use agent::{AgentExecutor, ExecutorConfig, ModelTurn, RunReport, RunState, RunStatus};
pub use config::CoreConfig;
pub use embedding::{EmbeddingCache, EmbeddingConfig, EmbeddingProvider, OllamaEmbedding};
pub use error::{AiError, Result};
pub use llm::{
    BackendTarget, CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message,
    MockLlmClient, MockStep, ModelHandle, ModelRouter, OllamaClient, Role, TokenUsage, ToolCall,
};
pub use memory::{
    CharRatioCounter, ConversationMemory, SessionManager, TokenCounter, Turn, TurnRole,
    WorkingContext,
};
pub use tools::{Tool, ToolOutput, ToolRegistry, ToolSchema};
