//! Token-bounded conversation memory.
//!
//! Holds one conversation's transcript and keeps the in-context portion
//! under a token budget by evicting the oldest complete (user, assistant)
//! pairs. Pairs are never split, and an incomplete trailing pair is never
//! evicted - in that case the budget overflow is surfaced on the returned
//! working context instead of being silently ignored.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One immutable transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Pluggable token estimate for a model family.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Fixed-ratio approximation: one token per four characters, rounded down.
///
/// Not an exact tokenizer count - it undercounts for some scripts and
/// overcounts for others - but it is cheap and bounds context growth when
/// no exact tokenizer is available for the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioCounter;

impl TokenCounter for CharRatioCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count() / 4
    }
}

/// The in-budget transcript view handed to the executor.
#[derive(Debug, Clone)]
pub struct WorkingContext {
    pub turns: Vec<Turn>,
    /// True when pruning could not bring the transcript under budget
    /// because the remainder is unprunable.
    pub over_budget: bool,
}

/// Ordered transcript for one conversation with token-bounded pruning.
///
/// Owned exclusively per conversation id; appends for the same conversation
/// must be serialized by the caller (see `SessionManager`).
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    token_budget: usize,
    counter: Arc<dyn TokenCounter>,
    over_budget: bool,
}

impl ConversationMemory {
    /// Create an empty memory with the default token estimate.
    pub fn new(token_budget: usize) -> Self {
        Self::with_counter(token_budget, Arc::new(CharRatioCounter))
    }

    /// Create an empty memory with a model-family-specific token estimate.
    pub fn with_counter(token_budget: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            turns: VecDeque::new(),
            token_budget,
            counter,
            over_budget: false,
        }
    }

    /// Rebuild a memory from a flat historical transcript.
    ///
    /// Walks the history two turns at a time and keeps only contiguous
    /// (user, assistant) pairs, then prunes once at the end. A trailing
    /// turn still awaiting its reply is dropped from the rebuilt state.
    pub fn from_transcript(token_budget: usize, history: &[Turn]) -> Self {
        let mut memory = Self::new(token_budget);

        let mut index = 0;
        while index + 1 < history.len() {
            let (user, assistant) = (&history[index], &history[index + 1]);
            if user.role == TurnRole::User && assistant.role == TurnRole::Assistant {
                memory.turns.push_back(user.clone());
                memory.turns.push_back(assistant.clone());
            }
            index += 2;
        }

        memory.prune();
        memory
    }

    /// Append a turn to the transcript, then prune back under budget.
    pub fn append_turn(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        self.prune();
    }

    /// The current in-budget transcript; read-only.
    pub fn working_context(&self) -> WorkingContext {
        WorkingContext {
            turns: self.turns.iter().cloned().collect(),
            over_budget: self.over_budget,
        }
    }

    /// Estimated token size of the current transcript.
    pub fn token_count(&self) -> usize {
        self.turns
            .iter()
            .map(|turn| self.counter.count(&turn.content))
            .sum()
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Evict oldest complete (user, assistant) pairs until the estimate
    /// fits the budget or nothing prunable remains.
    pub fn prune(&mut self) {
        while self.token_count() > self.token_budget {
            let head_is_complete_pair = self.turns.len() >= 2
                && self.turns[0].role == TurnRole::User
                && self.turns[1].role == TurnRole::Assistant;

            if !head_is_complete_pair {
                break;
            }

            self.turns.pop_front();
            self.turns.pop_front();
            tracing::debug!(
                remaining = self.turns.len(),
                "Evicted oldest conversation pair"
            );
        }

        self.over_budget = self.token_count() > self.token_budget;
        if self.over_budget {
            tracing::warn!(
                tokens = self.token_count(),
                budget = self.token_budget,
                "Conversation exceeds token budget with no prunable pair"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 80 chars => 20 estimated tokens per turn, 40 per pair.
    fn pair(memory: &mut ConversationMemory) {
        memory.append_turn(Turn::user("u".repeat(80)));
        memory.append_turn(Turn::assistant("a".repeat(80)));
    }

    #[test]
    fn char_ratio_counter_rounds_down() {
        let counter = CharRatioCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abc"), 0);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count(&"x".repeat(23)), 5);
    }

    #[test]
    fn char_ratio_counter_counts_characters_not_bytes() {
        // Four 3-byte characters: one estimated token.
        assert_eq!(CharRatioCounter.count("日本語文"), 1);
    }

    #[test]
    fn third_pair_evicts_exactly_the_oldest_pair() {
        let mut memory = ConversationMemory::new(100);

        pair(&mut memory); // 40 tokens
        pair(&mut memory); // 80 tokens
        assert_eq!(memory.len(), 4);

        pair(&mut memory); // 120 tokens -> oldest pair evicted
        let context = memory.working_context();

        assert_eq!(context.turns.len(), 4);
        assert_eq!(memory.token_count(), 80);
        assert!(!context.over_budget);
    }

    #[test]
    fn context_stays_under_budget_after_many_appends() {
        let mut memory = ConversationMemory::new(100);

        for _ in 0..20 {
            pair(&mut memory);
        }

        assert!(memory.token_count() <= 100);
    }

    #[test]
    fn pruning_never_splits_a_pair() {
        let mut memory = ConversationMemory::new(50);

        for _ in 0..5 {
            pair(&mut memory);
        }

        let context = memory.working_context();
        // Whatever survives must start with a user turn and alternate.
        assert_eq!(context.turns.len() % 2, 0);
        for chunk in context.turns.chunks(2) {
            assert_eq!(chunk[0].role, TurnRole::User);
            assert_eq!(chunk[1].role, TurnRole::Assistant);
        }
    }

    #[test]
    fn oversized_trailing_user_turn_is_kept_and_flagged() {
        let mut memory = ConversationMemory::new(10);

        memory.append_turn(Turn::user("q".repeat(400)));

        let context = memory.working_context();
        assert_eq!(context.turns.len(), 1);
        assert!(context.over_budget);
    }

    #[test]
    fn over_budget_flag_clears_once_a_pair_becomes_prunable() {
        let mut memory = ConversationMemory::new(25);

        memory.append_turn(Turn::user("q".repeat(200))); // 50 tokens, unprunable
        assert!(memory.working_context().over_budget);

        // Completing the pair makes it prunable; the next append evicts it.
        memory.append_turn(Turn::assistant("a".repeat(200)));
        memory.append_turn(Turn::user("ok"));

        let context = memory.working_context();
        assert_eq!(context.turns.len(), 1);
        assert_eq!(context.turns[0].content, "ok");
        assert!(!context.over_budget);
    }

    #[test]
    fn from_transcript_keeps_only_contiguous_pairs() {
        let history = vec![
            Turn::user("q1"),
            Turn::assistant("a1"),
            Turn::assistant("stray reply"),
            Turn::user("ignored partner"),
            Turn::user("q2"),
            Turn::assistant("a2"),
            Turn::user("awaiting reply"),
        ];

        let memory = ConversationMemory::from_transcript(1000, &history);
        let context = memory.working_context();

        assert_eq!(context.turns.len(), 4);
        assert_eq!(context.turns[0].content, "q1");
        assert_eq!(context.turns[2].content, "q2");
    }

    #[test]
    fn from_transcript_prunes_oversized_history() {
        let mut history = Vec::new();
        for i in 0..10 {
            history.push(Turn::user(format!("{i}{}", "u".repeat(79))));
            history.push(Turn::assistant(format!("{i}{}", "a".repeat(79))));
        }

        let memory = ConversationMemory::from_transcript(100, &history);

        assert!(memory.token_count() <= 100);
        // Most recent pairs survive.
        let context = memory.working_context();
        assert!(context.turns.last().unwrap().content.starts_with('9'));
    }

    #[test]
    fn custom_counter_changes_pruning_behavior() {
        struct WordCounter;
        impl TokenCounter for WordCounter {
            fn count(&self, text: &str) -> usize {
                text.split_whitespace().count()
            }
        }

        let mut memory = ConversationMemory::with_counter(3, Arc::new(WordCounter));
        memory.append_turn(Turn::user("one two"));
        memory.append_turn(Turn::assistant("three four"));
        assert!(memory.working_context().over_budget);
    }
}
