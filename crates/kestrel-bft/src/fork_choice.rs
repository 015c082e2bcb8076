//! Fork choice between the current tip and a received header

use crate::header::BlockHeader;
use crate::slots::Slots;
use std::fmt;

/// Outcome of comparing a received header against the last applied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ForkStatus {
    /// Same block as the tip
    IdenticalBlock = 1,
    /// Extends the tip
    ValidBlock = 2,
    /// Same generator forged a competing block at the same height
    DoubleForging = 3,
    /// Competing block at the same height that should replace the tip
    TieBreak = 4,
    /// Belongs to a chain that should be synced
    DifferentChain = 5,
    /// Ignore
    Discard = 6,
}

impl ForkStatus {
    /// Stable numeric code
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ForkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForkStatus::IdenticalBlock => "IDENTICAL_BLOCK",
            ForkStatus::ValidBlock => "VALID_BLOCK",
            ForkStatus::DoubleForging => "DOUBLE_FORGING",
            ForkStatus::TieBreak => "TIE_BREAK",
            ForkStatus::DifferentChain => "DIFFERENT_CHAIN",
            ForkStatus::Discard => "DISCARD",
        };
        f.write_str(name)
    }
}

fn is_valid_block(last: &BlockHeader, received: &BlockHeader) -> bool {
    last.height.checked_add(1) == Some(received.height) && received.previous_block_id == last.id
}

fn is_identical_block(last: &BlockHeader, received: &BlockHeader) -> bool {
    received.id == last.id
}

fn is_duplicate_block(last: &BlockHeader, received: &BlockHeader) -> bool {
    last.height == received.height
        && last.asset.max_height_prevoted == received.asset.max_height_prevoted
        && last.previous_block_id == received.previous_block_id
}

fn is_double_forging(last: &BlockHeader, received: &BlockHeader) -> bool {
    is_duplicate_block(last, received) && last.generator_public_key == received.generator_public_key
}

fn received_in_slot(slots: &Slots, header: &BlockHeader) -> bool {
    match header.received_at {
        Some(received_at) => slots.is_received_in_slot(header.timestamp, received_at),
        None => false,
    }
}

fn is_tie_break(slots: &Slots, last: &BlockHeader, received: &BlockHeader) -> bool {
    // a tip without arrival time was forged or synced locally: treat as on time
    let last_in_slot = last.received_at.is_none() || received_in_slot(slots, last);

    is_duplicate_block(last, received)
        && slots.slot_number(last.timestamp) < slots.slot_number(received.timestamp)
        && !last_in_slot
        && received_in_slot(slots, received)
}

fn is_different_chain(last: &BlockHeader, received: &BlockHeader) -> bool {
    last.asset.max_height_prevoted < received.asset.max_height_prevoted
        || (last.height < received.height
            && last.asset.max_height_prevoted == received.asset.max_height_prevoted)
}

/// Classify `received` against the last applied header.
///
/// Rules are checked in a fixed order and the first match wins. Pure; the
/// caller stamps `received.received_at` beforehand.
pub fn fork_choice(last: &BlockHeader, received: &BlockHeader, slots: &Slots) -> ForkStatus {
    if is_valid_block(last, received) {
        ForkStatus::ValidBlock
    } else if is_identical_block(last, received) {
        ForkStatus::IdenticalBlock
    } else if is_double_forging(last, received) {
        ForkStatus::DoubleForging
    } else if is_tie_break(slots, last, received) {
        ForkStatus::TieBreak
    } else if is_different_chain(last, received) {
        ForkStatus::DifferentChain
    } else {
        ForkStatus::Discard
    }
}
