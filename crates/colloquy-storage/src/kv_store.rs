//! Durable key-value store backed by redb.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::KeyValueStore;

const TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("kv_store");

/// Key-value store persisted in a redb table.
///
/// The database handle is shared; many stores and many requests may hold
/// clones of it. redb serializes writers internally, so no external locking
/// is needed for the per-key atomicity callers expect.
#[derive(Debug, Clone)]
pub struct RedbKvStore {
    db: Arc<Database>,
}

impl RedbKvStore {
    /// Create a store over an existing database handle, ensuring the table
    /// exists.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Open (or create) a database file at `path` and build a store on it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::create(path)?;
        tracing::debug!(path = %path.display(), "Opened kv store");
        Self::new(Arc::new(db))
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> Result<usize> {
        use redb::ReadableTableMetadata;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE)?;
        Ok(table.len()? as usize)
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for RedbKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE)?;

        if let Some(value) = table.get(key)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE)?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            match table.get(key.as_str())? {
                Some(value) => values.push(Some(value.value().to_vec())),
                None => values.push(None),
            }
        }

        Ok(values)
    }

    fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            for (key, value) in entries {
                table.insert(key.as_str(), value.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}
