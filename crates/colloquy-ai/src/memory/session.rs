//! Per-conversation session registry.
//!
//! A conversation processes at most one request at a time: each id maps to
//! one `ConversationMemory` behind an async mutex, so appends for the same
//! conversation are serialized while distinct conversations proceed in
//! parallel. Expiry of stale conversations is owned by the caller.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::memory::ConversationMemory;

/// Registry of live conversation memories keyed by opaque conversation id.
pub struct SessionManager {
    token_budget: usize,
    sessions: DashMap<String, Arc<Mutex<ConversationMemory>>>,
}

impl SessionManager {
    pub fn new(token_budget: usize) -> Self {
        Self {
            token_budget,
            sessions: DashMap::new(),
        }
    }

    /// Fetch the memory for a conversation, creating it on first access.
    pub fn memory(&self, conversation_id: &str) -> Arc<Mutex<ConversationMemory>> {
        self.sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(conversation_id, "Creating conversation memory");
                Arc::new(Mutex::new(ConversationMemory::new(self.token_budget)))
            })
            .clone()
    }

    /// Drop a conversation's memory. Returns true if it existed.
    pub fn remove(&self, conversation_id: &str) -> bool {
        self.sessions.remove(conversation_id).is_some()
    }

    /// Number of live conversations.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
