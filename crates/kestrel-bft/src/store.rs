//! Collaborator interfaces the finality core reads and writes through

use crate::error::BftResult;
use crate::header::BlockHeader;
use kestrel_primitives::PublicKey;
use kestrel_storage::{ConsensusTx, KvStore};

/// Read access to the window of recently accepted headers
pub trait HeaderHistory {
    /// Number of headers in the window
    fn len(&self) -> usize;

    /// Check if the window is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header at an exact height
    fn header_at(&self, height: u32) -> Option<&BlockHeader>;

    /// Highest header, optionally restricted to one generator and/or to
    /// heights at or below `max_height`
    fn recent_header(
        &self,
        generator: Option<&PublicKey>,
        max_height: Option<u32>,
    ) -> Option<&BlockHeader>;
}

/// Consensus-scoped key-value state plus the recent header window.
///
/// One instance scopes exactly one header application.
pub trait StateStore {
    /// Read a consensus key
    fn get(&self, key: &[u8]) -> BftResult<Option<Vec<u8>>>;

    /// Write a consensus key
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> BftResult<()>;

    /// Headers accepted before the one being processed
    fn last_block_headers(&self) -> &dyn HeaderHistory;
}

/// [`StateStore`] over a [`KvStore`] and a header window.
///
/// Writes stay in a [`ConsensusTx`] overlay until [`ChainStateStore::commit`].
pub struct ChainStateStore<'a, K: KvStore + ?Sized> {
    consensus: ConsensusTx<'a, K>,
    headers: &'a dyn HeaderHistory,
}

impl<'a, K: KvStore + ?Sized> ChainStateStore<'a, K> {
    /// Open a store scope
    pub fn new(store: &'a K, headers: &'a dyn HeaderHistory) -> Self {
        Self {
            consensus: ConsensusTx::new(store),
            headers,
        }
    }

    /// Check if anything was written
    pub fn is_dirty(&self) -> bool {
        self.consensus.is_dirty()
    }

    /// Persist every write atomically
    pub fn commit(self) -> BftResult<usize> {
        Ok(self.consensus.commit()?)
    }
}

impl<'a, K: KvStore + ?Sized> StateStore for ChainStateStore<'a, K> {
    fn get(&self, key: &[u8]) -> BftResult<Option<Vec<u8>>> {
        Ok(self.consensus.get(key)?)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> BftResult<()> {
        self.consensus.set(key, value);
        Ok(())
    }

    fn last_block_headers(&self) -> &dyn HeaderHistory {
        self.headers
    }
}
