//! Colloquy Storage - Key-value persistence layer
//!
//! This crate provides the store capability consumed by the serving core,
//! using redb as the embedded database. It exposes a byte-level API so the
//! core's cache and memory layers stay decoupled from on-disk encoding.
//!
//! Two implementations are provided:
//!
//! - [`RedbKvStore`] - durable store backed by a redb table; batched reads
//!   and writes run in a single transaction
//! - [`MemoryKvStore`] - in-process store for tests and local development

mod kv_store;
mod memory_store;

pub use kv_store::RedbKvStore;
pub use memory_store::MemoryKvStore;

use anyhow::Result;

/// Byte-level key-value store with single and batched access.
///
/// Implementations must be safe for concurrent use by many in-flight
/// requests; per-key get/set atomicity is the only guarantee callers rely
/// on. Batched calls exist to cut round trips, not to add transactional
/// semantics across keys.
pub trait KeyValueStore: Send + Sync {
    /// Fetch a single value, `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a single value, overwriting any existing entry.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch many values in one call, preserving input order.
    ///
    /// The result has the same length as `keys`; missing keys yield `None`
    /// at their position.
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Store many entries in one call.
    fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}
