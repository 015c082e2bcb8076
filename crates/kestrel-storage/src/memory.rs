//! In-memory key-value store

use crate::error::StorageResult;
use crate::traits::{KvOp, KvStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory [`KvStore`]; clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryDb {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Remove every key
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl KvStore for MemoryDb {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.inner.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.inner.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, ops: Vec<KvOp>) -> StorageResult<()> {
        // single write guard keeps the batch atomic for readers
        let mut map = self.inner.write();
        for op in ops {
            match op {
                KvOp::Put { key, value } => {
                    map.insert(key, value);
                }
                KvOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}
