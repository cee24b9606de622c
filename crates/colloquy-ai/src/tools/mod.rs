//! Tool abstraction consumed by the agent loop.
//!
//! Tool implementations are owned by the embedding application; this core
//! only defines the contract (name, schema, invoke) and the registry the
//! executor dispatches through.

mod registry;
mod traits;

pub use registry::ToolRegistry;
pub use traits::{Tool, ToolOutput, ToolSchema};
