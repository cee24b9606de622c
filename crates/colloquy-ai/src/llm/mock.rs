//! Deterministic mock LLM client for executor and memory tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{AiError, Result};

use super::{CompletionRequest, CompletionResponse, FinishReason, Message, Role, TokenUsage, ToolCall};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text(String),
    /// Return a structured tool call response.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// Return a backend error.
    Error(String),
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// With an empty script it echoes the latest user message, so loops always
/// terminate. Requests are captured for verification.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    call_count: Arc<AtomicUsize>,
    captured_requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            call_count: Arc::new(AtomicUsize::new(0)),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    /// Number of completed `complete` calls.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Message lists sent to the client, in call order.
    pub async fn captured_requests(&self) -> Vec<Vec<Message>> {
        self.captured_requests.lock().await.clone()
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn usage_for(content_len: usize) -> TokenUsage {
        let completion_tokens = content_len as u32;
        TokenUsage {
            prompt_tokens: 1,
            completion_tokens,
            total_tokens: 1 + completion_tokens,
        }
    }

    fn fallback_response(request: &CompletionRequest) -> CompletionResponse {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|msg| matches!(msg.role, Role::User))
            .map(|msg| format!("mock-echo: {}", msg.content))
            .unwrap_or_else(|| "mock-ok".to_string());

        CompletionResponse {
            usage: Some(Self::usage_for(text.len())),
            content: Some(text),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
        }
    }
}

#[async_trait]
impl super::LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.captured_requests
            .lock()
            .await
            .push(request.messages.clone());

        let step = self.next_step().await;
        let Some(step) = step else {
            return Ok(Self::fallback_response(&request));
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(content) => Ok(CompletionResponse {
                usage: Some(Self::usage_for(content.len())),
                content: Some(content),
                tool_calls: Vec::new(),
                finish_reason: FinishReason::Stop,
            }),
            MockStepKind::ToolCall {
                id,
                name,
                arguments,
            } => Ok(CompletionResponse {
                usage: Some(Self::usage_for(0)),
                content: None,
                tool_calls: vec![ToolCall {
                    id,
                    name,
                    arguments,
                }],
                finish_reason: FinishReason::ToolCalls,
            }),
            MockStepKind::Error(message) => Err(AiError::Backend(message)),
        }
    }
}
