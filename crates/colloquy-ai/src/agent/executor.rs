//! Agent executor: the bounded reason/act loop.
//!
//! One run alternates model calls and tool invocations until the model
//! produces a final answer or a bound trips. Both bounds - iteration count
//! and wall clock - are checked before each model invocation; a single
//! in-flight backend or tool call is never preempted. Tool failures are
//! recovered conversationally (the error text becomes the next context
//! turn), and unparseable completions get a bounded number of corrective
//! re-prompts before the run fails with its own reason code.

use std::sync::Arc;
use std::time::Instant;

use crate::agent::config::{ExecutorConfig, RunReport};
use crate::agent::parse::{ModelTurn, parse_model_output};
use crate::agent::state::RunState;
use crate::error::{AiError, Result};
use crate::llm::{CompletionRequest, LlmClient, Message, ModelHandle};
use crate::memory::{TurnRole, WorkingContext};
use crate::tools::ToolRegistry;

/// Truncate a tool result at a char boundary so oversized outputs cannot
/// blow the context.
fn truncate_tool_result(content: &str, max_len: usize) -> String {
    if content.len() <= max_len {
        return content.to_string();
    }

    let mut end = max_len;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}... ({} chars truncated)",
        &content[..end],
        content.len() - end
    )
}

/// Drives one bounded execution against a resolved model handle and a
/// fixed tool set.
pub struct AgentExecutor {
    handle: ModelHandle,
    tools: Arc<ToolRegistry>,
}

impl AgentExecutor {
    pub fn new(handle: ModelHandle, tools: Arc<ToolRegistry>) -> Self {
        Self { handle, tools }
    }

    /// Run the loop for one user turn over the conversation's working
    /// context.
    ///
    /// Terminal outcomes (`Succeeded`, `FailedBound`, `FailedParse`) are
    /// returned as a structured [`RunReport`]; only backend unavailability
    /// surfaces as `Err`.
    pub async fn run(
        &self,
        user_message: impl Into<String>,
        context: &WorkingContext,
        config: ExecutorConfig,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let mut state = RunState::new(uuid::Uuid::new_v4().to_string());
        let mut total_tokens: u32 = 0;

        if let Some(prompt) = &config.system_prompt {
            state.add_message(Message::system(prompt));
        }
        if context.over_budget {
            tracing::warn!(
                run_id = %state.run_id,
                "Working context exceeds its token budget; proceeding anyway"
            );
        }
        for turn in &context.turns {
            state.add_message(match turn.role {
                TurnRole::User => Message::user(&turn.content),
                TurnRole::Assistant => Message::assistant(&turn.content),
            });
        }
        state.add_message(Message::user(user_message));

        tracing::debug!(
            run_id = %state.run_id,
            model = %self.handle.client.model(),
            tools = self.tools.list().len(),
            "Starting agent run"
        );

        while !state.is_terminal() {
            // Bounds are checked before each model invocation.
            if state.steps >= config.max_iterations {
                state.fail_bound(format!(
                    "Max iterations reached: {}",
                    config.max_iterations
                ));
                break;
            }
            if started.elapsed() >= config.max_execution_time {
                state.fail_bound(format!(
                    "Execution time limit reached: {}s",
                    config.max_execution_time.as_secs()
                ));
                break;
            }

            let request = CompletionRequest::new(state.messages.clone())
                .with_tools(self.tools.schemas())
                .with_temperature(self.handle.temperature);

            let response = self.handle.client.complete(request).await?;
            if let Some(usage) = &response.usage {
                total_tokens += usage.total_tokens;
            }

            match parse_model_output(&response) {
                Ok(ModelTurn::FinalAnswer(answer)) => {
                    state.add_message(Message::assistant(&answer));
                    state.succeed(answer);
                }
                Ok(ModelTurn::ToolCalls(calls)) => {
                    state.reset_parse_failures();
                    state.add_message(Message::assistant_with_tool_calls(
                        response.content.clone(),
                        calls.clone(),
                    ));
                    state.begin_tool_round(calls.clone());

                    // Calls run strictly sequentially: each model call's
                    // input depends on the previous step's output.
                    for call in &calls {
                        let result_text = match self
                            .tools
                            .execute(&call.name, call.arguments.clone())
                            .await
                        {
                            Ok(output) => output.into_transcript_text(),
                            // Tool failures feed back into the model as
                            // context; they are not fatal to the run.
                            Err(AiError::ToolNotFound(name)) => {
                                tracing::warn!(run_id = %state.run_id, tool = %name, "Unknown tool requested");
                                format!("Error: tool '{name}' is not available")
                            }
                            Err(error) => {
                                tracing::warn!(run_id = %state.run_id, tool = %call.name, %error, "Tool invocation failed");
                                format!("Error: {error}")
                            }
                        };

                        let result_text =
                            truncate_tool_result(&result_text, config.max_tool_result_length);
                        state.add_message(Message::tool_result(call.id.clone(), result_text));
                    }

                    state.complete_tool_round();
                    state.increment_step();
                }
                Err(AiError::Parse(reason)) => {
                    let failures = state.record_parse_failure();
                    if failures >= config.parse_retry_limit {
                        tracing::warn!(
                            run_id = %state.run_id,
                            failures,
                            "Parse retries exhausted"
                        );
                        state.fail_parse(reason);
                        break;
                    }

                    tracing::debug!(
                        run_id = %state.run_id,
                        failures,
                        %reason,
                        "Unparseable completion, re-prompting"
                    );
                    if let Some(content) = &response.content {
                        state.add_message(Message::assistant(content));
                    }
                    state.add_message(Message::system(format!(
                        "Your previous reply could not be interpreted: {reason}. \
                         Reply with either plain text as the final answer, or a single \
                         JSON object of the form {{\"tool\": \"<name>\", \"arguments\": {{...}}}}."
                    )));
                    state.increment_step();
                }
                Err(error) => return Err(error),
            }
        }

        let elapsed = started.elapsed();
        tracing::info!(
            run_id = %state.run_id,
            status = ?state.status,
            steps = state.steps,
            total_tokens,
            "Agent run finished"
        );

        Ok(RunReport::from_state(state, total_tokens, elapsed))
    }
}
