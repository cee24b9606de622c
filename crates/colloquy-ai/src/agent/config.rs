//! Executor configuration and run result types.

use std::time::Duration;

use crate::agent::state::{RunState, RunStatus};
use crate::config::CoreConfig;

/// Corrective re-prompts allowed before a run fails with `FailedParse`.
pub const DEFAULT_PARSE_RETRY_LIMIT: usize = 3;

/// Max length for tool results fed back into context.
pub const DEFAULT_MAX_TOOL_RESULT_LENGTH: usize = 4000;

/// Configuration for one agent execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum reason/act rounds (model invocations) per run.
    pub max_iterations: usize,
    /// Wall-clock ceiling for the whole run. Checked between steps; an
    /// in-flight backend call is never preempted.
    pub max_execution_time: Duration,
    /// Consecutive unparseable completions tolerated before failing.
    pub parse_retry_limit: usize,
    /// Optional system prompt prepended to the context.
    pub system_prompt: Option<String>,
    /// Tool results longer than this are truncated before entering context.
    pub max_tool_result_length: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            max_execution_time: Duration::from_secs(300),
            parse_retry_limit: DEFAULT_PARSE_RETRY_LIMIT,
            system_prompt: None,
            max_tool_result_length: DEFAULT_MAX_TOOL_RESULT_LENGTH,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the execution bounds from the core configuration.
    pub fn from_core(config: &CoreConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            max_execution_time: Duration::from_secs(config.max_execution_secs),
            ..Self::default()
        }
    }

    /// Set max iterations
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the wall-clock ceiling.
    pub fn with_max_execution_time(mut self, ceiling: Duration) -> Self {
        self.max_execution_time = ceiling;
        self
    }

    /// Set the parse-retry budget.
    pub fn with_parse_retry_limit(mut self, limit: usize) -> Self {
        self.parse_retry_limit = limit;
        self
    }

    /// Set custom system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tool result length
    pub fn with_max_tool_result_length(mut self, max: usize) -> Self {
        self.max_tool_result_length = max;
        self
    }
}

/// Result of one agent execution.
///
/// Terminal failures land here as structured status, not as errors; only
/// backend unavailability propagates as `Err` from the executor.
#[derive(Debug)]
pub struct RunReport {
    pub success: bool,
    pub answer: Option<String>,
    pub error: Option<String>,
    /// Completed reason/act rounds.
    pub iterations: usize,
    pub total_tokens: u32,
    pub elapsed: Duration,
    /// Final run state, including the full transcript for diagnostics.
    pub state: RunState,
}

impl RunReport {
    pub(crate) fn from_state(state: RunState, total_tokens: u32, elapsed: Duration) -> Self {
        let (success, answer, error) = match &state.status {
            RunStatus::Succeeded { answer } => (true, Some(answer.clone()), None),
            RunStatus::FailedBound { reason } => (false, None, Some(reason.clone())),
            RunStatus::FailedParse { reason } => (false, None, Some(reason.clone())),
            // Non-terminal statuses never reach a report.
            RunStatus::Running | RunStatus::AwaitingToolResult { .. } => (
                false,
                None,
                Some("Run ended in a non-terminal state".to_string()),
            ),
        };

        Self {
            success,
            answer,
            error,
            iterations: state.steps,
            total_tokens,
            elapsed,
            state,
        }
    }
}
