//! BFT error types

use crate::contradiction::ContradictionKind;
use kestrel_primitives::Address;
use kestrel_storage::StorageError;
use thiserror::Error;

/// Errors raised while verifying or applying block headers.
///
/// Every error aborts the header application it came from.
#[derive(Debug, Error)]
pub enum BftError {
    /// Header claims a maxHeightPrevoted different from the local ledger
    #[error("invalid maxHeightPrevoted at height {height}: claimed {claimed}, expected {expected}")]
    InvalidAttribute {
        /// Header height
        height: u32,
        /// Value carried by the header
        claimed: u32,
        /// Value computed from the voting ledger
        expected: u32,
    },

    /// Header contradicts an earlier header from the same generator
    #[error("contradicting headers from {generator} at heights {previous_height} and {height}: {kind}")]
    Contradiction {
        /// Which contradiction condition was hit
        kind: ContradictionKind,
        /// Generator address
        generator: Address,
        /// Height of the header being verified
        height: u32,
        /// Height of the earlier header it contradicts
        previous_height: u32,
    },

    /// Generator is absent from the validator set supplied for its round
    #[error("generator {generator} is not in the validator set at height {height}")]
    UnknownGenerator {
        /// Generator address
        generator: Address,
        /// Header height
        height: u32,
    },

    /// A referenced header is not in the recent header window
    #[error("header at height {height} is missing from the recent header window")]
    MissingHeader {
        /// Height that was looked up
        height: u32,
    },

    /// Reward does not match the reward schedule
    #[error("invalid block reward at height {height}: got {actual}, expected {expected}")]
    InvalidReward {
        /// Header height
        height: u32,
        /// Reward carried by the header
        actual: u64,
        /// Reward required by the schedule
        expected: u64,
    },

    /// Header cannot extend the header window at either end
    #[error("header at height {height} cannot be added to window [{first}, {last}]")]
    NonContiguousHeader {
        /// Offered height
        height: u32,
        /// Lowest height in the window
        first: u32,
        /// Highest height in the window
        last: u32,
    },

    /// Persisted consensus blob is malformed
    #[error("codec error: {0}")]
    Codec(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Facade used before init or after reset
    #[error("finality manager not initialized")]
    NotInitialized,

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BftError {
    /// True when the error is evidence of validator misbehavior
    pub fn is_misbehavior(&self) -> bool {
        matches!(self, BftError::Contradiction { .. })
    }

    /// True when the caller handed in inconsistent inputs
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            BftError::UnknownGenerator { .. } | BftError::MissingHeader { .. }
        )
    }
}

/// Result type for BFT operations
pub type BftResult<T> = Result<T, BftError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    #[test]
    fn test_error_display_invalid_attribute() {
        let err = BftError::InvalidAttribute { height: 12, claimed: 4, expected: 7 };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("claimed 4"));
        assert!(msg.contains("expected 7"));
    }

    #[test]
    fn test_error_display_contradiction() {
        let err = BftError::Contradiction {
            kind: ContradictionKind::ChainDisjoint,
            generator: test_address(1),
            height: 9,
            previous_height: 5,
        };
        assert!(err.to_string().contains("chain disjoint"));
        assert!(err.is_misbehavior());
        assert!(!err.is_data_integrity());
    }

    #[test]
    fn test_error_display_unknown_generator() {
        let err = BftError::UnknownGenerator { generator: test_address(2), height: 3 };
        assert!(err.to_string().contains("not in the validator set"));
        assert!(err.is_data_integrity());
    }

    #[test]
    fn test_error_display_invalid_reward() {
        let err = BftError::InvalidReward { height: 1, actual: 10, expected: 2 };
        let msg = err.to_string();
        assert!(msg.contains("got 10"));
        assert!(msg.contains("expected 2"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: BftError = StorageError::NotOpen.into();
        assert!(err.to_string().contains("database not open"));
    }
}
