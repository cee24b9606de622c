//! Memory system for conversations
//!
//! - **ConversationMemory**: token-bounded transcript with pair-atomic
//!   pruning of the oldest turns
//! - **SessionManager**: per-conversation registry that serializes appends
//!   for one conversation id

mod conversation;
mod session;

pub use conversation::{
    CharRatioCounter, ConversationMemory, TokenCounter, Turn, TurnRole, WorkingContext,
};
pub use session::SessionManager;
