//! Consensus namespace and per-header write overlay

use crate::db::{cf, Database};
use crate::error::StorageResult;
use crate::traits::{KvOp, KvStore};
use std::collections::BTreeMap;

/// [`KvStore`] view of the RocksDB consensus column family
#[derive(Clone)]
pub struct ConsensusDb {
    db: Database,
}

impl ConsensusDb {
    /// Create a new consensus database view
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl KvStore for ConsensusDb {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.db.get(cf::CONSENSUS, key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.db.put(cf::CONSENSUS, key, value)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.db.delete(cf::CONSENSUS, key)
    }

    fn write_batch(&self, ops: Vec<KvOp>) -> StorageResult<()> {
        self.db.write_batch(cf::CONSENSUS, ops)
    }
}

/// Write overlay scoping one header application.
///
/// Reads see pending writes first. Nothing reaches the backing store until
/// [`ConsensusTx::commit`], which writes everything as one batch; dropping the
/// overlay discards it.
pub struct ConsensusTx<'a, K: KvStore + ?Sized> {
    store: &'a K,
    /// Pending writes (None = deleted)
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, K: KvStore + ?Sized> ConsensusTx<'a, K> {
    /// Begin an overlay on top of `store`
    pub fn new(store: &'a K) -> Self {
        Self {
            store,
            pending: BTreeMap::new(),
        }
    }

    /// Read a key, preferring pending writes
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        match self.pending.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.store.get(key),
        }
    }

    /// Stage a write
    pub fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.pending.insert(key.to_vec(), Some(value));
    }

    /// Stage a deletion
    pub fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }

    /// Number of staged keys
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Check if any write is staged
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Write all staged changes atomically, returning how many keys changed.
    pub fn commit(self) -> StorageResult<usize> {
        let ops: Vec<KvOp> = self
            .pending
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => KvOp::Put { key, value },
                None => KvOp::Delete { key },
            })
            .collect();
        let count = ops.len();
        if count > 0 {
            self.store.write_batch(ops)?;
        }
        tracing::trace!(keys = count, "committed consensus overlay");
        Ok(count)
    }
}
