//! Ollama LLM client
//!
//! Talks to a local Ollama server over `POST /api/chat`. Several logical
//! model ids alias onto one physical Ollama model (see the router), so this
//! client is typically constructed once and shared across requests.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AiError, Result};
use crate::llm::client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role, TokenUsage,
    ToolCall,
};

/// Client for a local Ollama chat backend.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    streaming: bool,
}

impl OllamaClient {
    /// Create a new client for `model` served at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            streaming: false,
        }
    }

    /// Ask the backend to stream the response. The completion is still
    /// consumed whole here; chunks are accumulated before returning.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                }
                .to_string(),
                content: m.content.clone(),
                tool_calls: m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|call| OllamaToolCall {
                            function: OllamaFunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect()
                }),
            })
            .collect()
    }

    fn accumulate_chunks(body: &str) -> Result<OllamaChatResponse> {
        let mut merged: Option<OllamaChatResponse> = None;

        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            let chunk: OllamaChatResponse = serde_json::from_str(line)
                .map_err(|e| AiError::Backend(format!("Invalid Ollama stream chunk: {e}")))?;

            match merged.as_mut() {
                Some(acc) => {
                    acc.message.content.push_str(&chunk.message.content);
                    acc.message.tool_calls.extend(chunk.message.tool_calls);
                    if chunk.done {
                        acc.done = true;
                        acc.prompt_eval_count = chunk.prompt_eval_count;
                        acc.eval_count = chunk.eval_count;
                    }
                }
                None => merged = Some(chunk),
            }
        }

        merged.ok_or_else(|| AiError::Backend("Empty Ollama stream response".to_string()))
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool>>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

#[derive(Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Serialize, Deserialize, Debug)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Serialize, Deserialize, Debug)]
struct OllamaFunctionCall {
    name: String,
    arguments: Value,
}

#[derive(Deserialize, Debug)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let messages = Self::convert_messages(&request.messages);
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OllamaTool {
                        r#type: "function".to_string(),
                        function: OllamaFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        let body = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: self.streaming,
            options: request.temperature.map(|temperature| OllamaOptions { temperature }),
            tools,
        };

        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            stream = self.streaming,
            "Sending Ollama chat request"
        );

        let url = format!("{}/api/chat", self.base_url);
        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                AiError::Backend(format!("Ollama request timed out: {e}"))
            } else if e.is_connect() {
                AiError::Backend(format!(
                    "Cannot connect to Ollama at {}. Is Ollama running?",
                    self.base_url
                ))
            } else {
                AiError::Backend(format!("Ollama request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::Backend(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let chat: OllamaChatResponse = if self.streaming {
            let text = response
                .text()
                .await
                .map_err(|e| AiError::Backend(format!("Failed to read Ollama stream: {e}")))?;
            Self::accumulate_chunks(&text)?
        } else {
            response
                .json()
                .await
                .map_err(|e| AiError::Backend(format!("Invalid Ollama response: {e}")))?
        };

        let tool_calls: Vec<ToolCall> = chat
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                // Ollama does not assign call ids; synthesize one so tool
                // results can be correlated in the transcript.
                id: format!("call_{}", uuid::Uuid::new_v4()),
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let usage = match (chat.prompt_eval_count, chat.eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt_tokens = prompt.unwrap_or(0);
                let completion_tokens = completion.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                })
            }
        };

        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };

        Ok(CompletionResponse {
            content: if chat.message.content.is_empty() {
                None
            } else {
                Some(chat.message.content)
            },
            tool_calls,
            finish_reason,
            usage,
        })
    }
}
