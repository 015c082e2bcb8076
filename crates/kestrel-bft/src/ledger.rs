//! Voting ledger and its persisted encoding.
//!
//! Both blobs use a fixed little-endian layout so every node writes the same
//! bytes for the same state:
//!
//! ```text
//! finalizedHeight: u32
//! votingLedger:    u32 n, n × (address[20] | u32 maxPreVoteHeight | u32 maxPreCommitHeight),
//!                  u32 m, m × (u32 height | u32 prevotes | u32 precommits)
//! ```

use crate::error::{BftError, BftResult};
use kestrel_primitives::Address;
use std::collections::BTreeMap;

/// Consensus key of the finalized height
pub const FINALIZED_HEIGHT_KEY: &[u8] = b"bft:finalizedHeight";

/// Consensus key of the voting ledger
pub const VOTING_LEDGER_KEY: &[u8] = b"bft:votingLedger";

/// Highest heights a validator has prevoted and precommitted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidatorVoteState {
    /// Highest prevoted height
    pub max_pre_vote_height: u32,
    /// Highest precommitted height
    pub max_pre_commit_height: u32,
}

/// Vote tally for one height
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Prevotes received
    pub prevotes: u32,
    /// Precommits received
    pub precommits: u32,
}

/// Per-validator vote state and per-height tallies
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VotingLedger {
    /// Vote state by validator address
    pub validators: BTreeMap<Address, ValidatorVoteState>,
    /// Tallies by height
    pub ledger: BTreeMap<u32, LedgerEntry>,
}

impl VotingLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally at `height` (zero if absent)
    pub fn entry(&self, height: u32) -> LedgerEntry {
        self.ledger.get(&height).copied().unwrap_or_default()
    }

    /// Mutable tally at `height`, created on first access
    pub fn entry_mut(&mut self, height: u32) -> &mut LedgerEntry {
        self.ledger.entry(height).or_default()
    }

    /// Vote state of a validator (zero if it never voted)
    pub fn validator_state(&self, address: &Address) -> ValidatorVoteState {
        self.validators.get(address).copied().unwrap_or_default()
    }

    /// Store the vote state of a validator
    pub fn set_validator_state(&mut self, address: Address, state: ValidatorVoteState) {
        self.validators.insert(address, state);
    }

    /// Highest height with at least `threshold` prevotes
    pub fn highest_prevoted(&self, threshold: u32) -> Option<u32> {
        self.ledger
            .iter()
            .rev()
            .find(|(_, entry)| entry.prevotes >= threshold)
            .map(|(height, _)| *height)
    }

    /// Highest height with at least `threshold` precommits
    pub fn highest_precommitted(&self, threshold: u32) -> Option<u32> {
        self.ledger
            .iter()
            .rev()
            .find(|(_, entry)| entry.precommits >= threshold)
            .map(|(height, _)| *height)
    }

    /// Keep only the `max_heights` highest tallies; returns how many were dropped.
    pub fn prune(&mut self, max_heights: usize) -> usize {
        let mut dropped = 0;
        while self.ledger.len() > max_heights {
            self.ledger.pop_first();
            dropped += 1;
        }
        dropped
    }

    /// Encode to the persisted layout
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.validators.len() * 28 + self.ledger.len() * 12);
        buf.extend_from_slice(&(self.validators.len() as u32).to_le_bytes());
        for (address, state) in &self.validators {
            buf.extend_from_slice(address.as_bytes());                    // 20
            buf.extend_from_slice(&state.max_pre_vote_height.to_le_bytes()); // 4
            buf.extend_from_slice(&state.max_pre_commit_height.to_le_bytes()); // 4
        }
        buf.extend_from_slice(&(self.ledger.len() as u32).to_le_bytes());
        for (height, entry) in &self.ledger {
            buf.extend_from_slice(&height.to_le_bytes());
            buf.extend_from_slice(&entry.prevotes.to_le_bytes());
            buf.extend_from_slice(&entry.precommits.to_le_bytes());
        }
        buf
    }

    /// Decode from the persisted layout
    pub fn decode(bytes: &[u8]) -> BftResult<Self> {
        let mut reader = Reader::new(bytes);
        let mut ledger = VotingLedger::new();

        let validator_count = reader.u32()?;
        for _ in 0..validator_count {
            let address = Address::from_slice(reader.take(Address::LEN)?)
                .map_err(|e| BftError::Codec(e.to_string()))?;
            let state = ValidatorVoteState {
                max_pre_vote_height: reader.u32()?,
                max_pre_commit_height: reader.u32()?,
            };
            if matches!(ledger.validators.last_key_value(), Some((last, _)) if *last >= address) {
                return Err(BftError::Codec(format!("validator {} out of order", address)));
            }
            ledger.validators.insert(address, state);
        }

        let entry_count = reader.u32()?;
        for _ in 0..entry_count {
            let height = reader.u32()?;
            let entry = LedgerEntry {
                prevotes: reader.u32()?,
                precommits: reader.u32()?,
            };
            if matches!(ledger.ledger.last_key_value(), Some((last, _)) if *last >= height) {
                return Err(BftError::Codec(format!("height {} out of order", height)));
            }
            ledger.ledger.insert(height, entry);
        }

        reader.finish()?;
        Ok(ledger)
    }
}

/// Encode the finalized height blob
pub fn encode_finalized_height(height: u32) -> Vec<u8> {
    height.to_le_bytes().to_vec()
}

/// Decode the finalized height blob
pub fn decode_finalized_height(bytes: &[u8]) -> BftResult<u32> {
    let mut reader = Reader::new(bytes);
    let height = reader.u32()?;
    reader.finish()?;
    Ok(height)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> BftResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                BftError::Codec(format!(
                    "truncated: need {} bytes at offset {}, have {}",
                    len,
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> BftResult<u32> {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(arr))
    }

    fn finish(&self) -> BftResult<()> {
        if self.pos != self.bytes.len() {
            return Err(BftError::Codec(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
