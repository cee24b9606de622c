//! Run state for one agent execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::{Message, ToolCall};

/// Execution status over one run.
///
/// `Succeeded`, `FailedBound` and `FailedParse` are terminal; no further
/// transitions happen from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    /// A tool-call request has been parsed and its invocations are in flight.
    AwaitingToolResult { tool: String },
    Succeeded { answer: String },
    /// Iteration or wall-clock ceiling reached.
    FailedBound { reason: String },
    /// Parse-retry budget exhausted.
    FailedParse { reason: String },
}

/// Ephemeral state for one execution - created at run start, discarded at
/// the end, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub status: RunStatus,
    /// Full message transcript of the run, kept for diagnostics on failure.
    pub messages: Vec<Message>,
    /// Completed reason/act rounds (one per model invocation).
    pub steps: usize,
    /// Consecutive parse failures; resets on the first parseable output.
    pub parse_failures: usize,
    /// Tool calls awaiting results in the current round.
    pub pending_tool_calls: Vec<ToolCall>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            messages: vec![],
            steps: 0,
            parse_failures: 0,
            pending_tool_calls: vec![],
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Enter the tool round for a parsed tool-call request.
    pub fn begin_tool_round(&mut self, calls: Vec<ToolCall>) {
        let tool = calls
            .first()
            .map(|call| call.name.clone())
            .unwrap_or_default();
        self.status = RunStatus::AwaitingToolResult { tool };
        self.pending_tool_calls = calls;
    }

    /// All pending tool results have been appended; back to `Running`.
    pub fn complete_tool_round(&mut self) {
        self.pending_tool_calls.clear();
        self.status = RunStatus::Running;
    }

    /// Count a completed model round.
    pub fn increment_step(&mut self) {
        self.steps += 1;
    }

    /// Count a consecutive parse failure, returning the new total.
    pub fn record_parse_failure(&mut self) -> usize {
        self.parse_failures += 1;
        self.parse_failures
    }

    pub fn reset_parse_failures(&mut self) {
        self.parse_failures = 0;
    }

    /// Complete with final answer
    pub fn succeed(&mut self, answer: impl Into<String>) {
        self.status = RunStatus::Succeeded {
            answer: answer.into(),
        };
        self.ended_at = Some(Utc::now());
    }

    /// Terminate on an iteration or wall-clock bound.
    pub fn fail_bound(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::FailedBound {
            reason: reason.into(),
        };
        self.ended_at = Some(Utc::now());
    }

    /// Terminate after exhausting parse retries.
    pub fn fail_parse(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::FailedParse {
            reason: reason.into(),
        };
        self.ended_at = Some(Utc::now());
    }

    /// Check if terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RunStatus::Succeeded { .. } | RunStatus::FailedBound { .. } | RunStatus::FailedParse { .. }
        )
    }
}
