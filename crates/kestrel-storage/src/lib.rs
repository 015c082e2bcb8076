//! # kestrel-storage
//!
//! Storage layer for the Kestrel finality core.
//!
//! This crate provides:
//! - Key-value store abstraction ([`KvStore`])
//! - RocksDB backend with a dedicated consensus column family
//! - In-memory backend for tests and light clients
//! - Per-header write overlay ([`ConsensusTx`]) committed as one atomic batch

#![warn(missing_docs)]
#![warn(clippy::all)]

mod consensus;
mod db;
mod error;
mod memory;
mod traits;

pub use consensus::{ConsensusDb, ConsensusTx};
pub use db::{cf, Database, ALL_CFS};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDb;
pub use traits::{KvOp, KvStore};
