//! RocksDB wrapper

use crate::error::{StorageError, StorageResult};
use crate::traits::KvOp;
use parking_lot::RwLock;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options, WriteBatch,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column family names
pub mod cf {
    /// Consensus state (finalized height, voting ledger)
    pub const CONSENSUS: &str = "consensus";
    /// Metadata
    pub const META: &str = "meta";
}

/// All column family names
pub const ALL_CFS: &[&str] = &[cf::CONSENSUS, cf::META];

type RocksDB = DBWithThreadMode<MultiThreaded>;

/// Shared handle to the finality database.
///
/// Clones share one underlying RocksDB instance, so closing through any
/// handle closes it for all of them.
#[derive(Clone)]
pub struct Database {
    db: Arc<RwLock<Option<RocksDB>>>,
    path: PathBuf,
}

impl Database {
    /// Create a handle for `path`; nothing is opened yet
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            db: Arc::new(RwLock::new(None)),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Open the database, creating it and any missing column family
    pub fn open(&self) -> StorageResult<()> {
        let mut db_guard = self.db.write();
        if db_guard.is_some() {
            return Err(StorageError::AlreadyOpen);
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = RocksDB::open_cf_descriptors(&opts, &self.path, descriptors)?;
        tracing::debug!(path = %self.path.display(), "opened consensus database");
        *db_guard = Some(db);
        Ok(())
    }

    /// Close the database
    pub fn close(&self) {
        *self.db.write() = None;
    }

    /// Check if database is open
    pub fn is_open(&self) -> bool {
        self.db.read().is_some()
    }

    /// Get a value from a column family
    pub fn get(&self, cf_name: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.with_cf(cf_name, |db, cf| Ok(db.get_cf(cf, key)?))
    }

    /// Put a value to a column family
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.with_cf(cf_name, |db, cf| Ok(db.put_cf(cf, key, value)?))
    }

    /// Delete a value from a column family
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> StorageResult<()> {
        self.with_cf(cf_name, |db, cf| Ok(db.delete_cf(cf, key)?))
    }

    /// Apply `ops` to one column family in a single atomic write
    pub fn write_batch(&self, cf_name: &str, ops: Vec<KvOp>) -> StorageResult<()> {
        self.with_cf(cf_name, |db, cf| {
            let mut batch = WriteBatch::default();
            for op in ops {
                match op {
                    KvOp::Put { key, value } => batch.put_cf(cf, key, value),
                    KvOp::Delete { key } => batch.delete_cf(cf, key),
                }
            }
            Ok(db.write(batch)?)
        })
    }

    fn with_cf<T>(
        &self,
        cf_name: &str,
        f: impl FnOnce(&RocksDB, &Arc<BoundColumnFamily<'_>>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf_name.to_string()))?;
        f(db, &cf)
    }
}
