//! Forging slot arithmetic

use crate::error::{BftError, BftResult};

/// Maps timestamps to forging slots of fixed length counted from genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slots {
    genesis_timestamp: u32,
    block_time: u32,
}

impl Slots {
    /// Create slots; `block_time` is the slot length in seconds.
    pub fn new(genesis_timestamp: u32, block_time: u32) -> BftResult<Self> {
        if block_time == 0 {
            return Err(BftError::Config("block time must be positive".into()));
        }
        Ok(Self {
            genesis_timestamp,
            block_time,
        })
    }

    /// Genesis block timestamp
    pub fn genesis_timestamp(&self) -> u32 {
        self.genesis_timestamp
    }

    /// Slot length in seconds
    pub fn block_time(&self) -> u32 {
        self.block_time
    }

    /// Slot containing an absolute timestamp. Timestamps before genesis map to slot 0.
    pub fn slot_number(&self, timestamp: u32) -> u32 {
        self.elapsed_slot_number(timestamp.saturating_sub(self.genesis_timestamp))
    }

    /// Slot containing a time measured in seconds since genesis
    pub fn elapsed_slot_number(&self, elapsed: u32) -> u32 {
        elapsed / self.block_time
    }

    /// Absolute timestamp at which a slot starts
    pub fn slot_time(&self, slot: u32) -> u32 {
        self.genesis_timestamp
            .saturating_add(slot.saturating_mul(self.block_time))
    }

    /// Seconds elapsed since genesis at Unix time `now`
    pub fn time_since_genesis(&self, now: u64) -> u32 {
        let elapsed = now.saturating_sub(u64::from(self.genesis_timestamp));
        u32::try_from(elapsed).unwrap_or(u32::MAX)
    }

    /// True if a block stamped `timestamp` arrived (`received_at`, seconds
    /// since genesis) during its own forging slot.
    pub fn is_received_in_slot(&self, timestamp: u32, received_at: u32) -> bool {
        self.slot_number(timestamp) == self.elapsed_slot_number(received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_block_time_rejected() {
        assert!(matches!(Slots::new(0, 0), Err(BftError::Config(_))));
    }

    #[test]
    fn test_slot_number() {
        let slots = Slots::new(1000, 10).unwrap();
        assert_eq!(slots.slot_number(1000), 0);
        assert_eq!(slots.slot_number(1009), 0);
        assert_eq!(slots.slot_number(1010), 1);
        assert_eq!(slots.slot_number(999), 0);
        assert_eq!(slots.slot_time(3), 1030);
    }

    #[test]
    fn test_time_since_genesis() {
        let slots = Slots::new(1000, 10).unwrap();
        assert_eq!(slots.time_since_genesis(1_025), 25);
        assert_eq!(slots.time_since_genesis(500), 0);
    }

    #[test]
    fn test_received_in_slot() {
        let slots = Slots::new(1000, 10).unwrap();
        // block for slot 2 (timestamp 1020), received 25s after genesis
        assert!(slots.is_received_in_slot(1020, 25));
        assert!(!slots.is_received_in_slot(1020, 30));
        assert!(!slots.is_received_in_slot(1020, 19));
    }
}
