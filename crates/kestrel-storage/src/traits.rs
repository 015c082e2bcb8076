//! Key-value store abstraction

use crate::error::StorageResult;

/// A single write in an atomic batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KvOp {
    /// Insert or overwrite a key
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Remove a key
    Delete {
        /// Key
        key: Vec<u8>,
    },
}

/// Flat key-value namespace.
///
/// Implementations use interior mutability so one handle can be shared by
/// concurrent readers; writers are serialized by the caller.
pub trait KvStore {
    /// Get a value
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a value
    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a value
    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Apply all operations atomically
    fn write_batch(&self, ops: Vec<KvOp>) -> StorageResult<()>;

    /// Check if a key exists
    fn contains(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
