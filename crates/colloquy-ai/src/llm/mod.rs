//! LLM module - client abstraction, Ollama backend, model routing

mod client;
mod mock;
mod ollama;
mod router;

pub use client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role, TokenUsage,
    ToolCall,
};
pub use mock::{MockLlmClient, MockStep, MockStepKind};
pub use ollama::OllamaClient;
pub use router::{BackendTarget, ModelHandle, ModelRouter};
