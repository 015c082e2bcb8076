//! Block header view consumed by the finality core

use kestrel_primitives::{Address, BlockId, PublicKey};

/// BFT properties a generator attaches to every header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockHeaderAsset {
    /// Height of the previous block forged by the same generator
    pub max_height_previously_forged: u32,
    /// Highest height the generator saw cross the prevote threshold
    pub max_height_prevoted: u32,
}

impl BlockHeaderAsset {
    /// Create a new asset
    pub fn new(max_height_previously_forged: u32, max_height_prevoted: u32) -> Self {
        Self {
            max_height_previously_forged,
            max_height_prevoted,
        }
    }
}

/// Block header as seen by the finality core. Owned by the chain layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block id
    pub id: BlockId,
    /// Block height
    pub height: u32,
    /// Id of the parent block
    pub previous_block_id: BlockId,
    /// Key of the validator that forged the block
    pub generator_public_key: PublicKey,
    /// Block reward
    pub reward: u64,
    /// Block timestamp (Unix seconds)
    pub timestamp: u32,
    /// BFT properties
    pub asset: BlockHeaderAsset,
    /// Seconds since genesis when the block arrived; None for blocks forged
    /// or synced locally
    pub received_at: Option<u32>,
}

impl BlockHeader {
    /// Create a header with zeroed reward, timestamp and asset
    pub fn new(
        id: BlockId,
        height: u32,
        previous_block_id: BlockId,
        generator_public_key: PublicKey,
    ) -> Self {
        Self {
            id,
            height,
            previous_block_id,
            generator_public_key,
            reward: 0,
            timestamp: 0,
            asset: BlockHeaderAsset::default(),
            received_at: None,
        }
    }

    /// Set BFT properties
    pub fn with_asset(mut self, max_height_previously_forged: u32, max_height_prevoted: u32) -> Self {
        self.asset = BlockHeaderAsset::new(max_height_previously_forged, max_height_prevoted);
        self
    }

    /// Set reward
    pub fn with_reward(mut self, reward: u64) -> Self {
        self.reward = reward;
        self
    }

    /// Set timestamp
    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set arrival time (seconds since genesis)
    pub fn with_received_at(mut self, received_at: u32) -> Self {
        self.received_at = Some(received_at);
        self
    }

    /// Address of the generator
    pub fn generator_address(&self) -> Address {
        self.generator_public_key.to_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_primitives::H256;

    #[test]
    fn test_header_builder() {
        let key = PublicKey::from_bytes([7u8; 32]);
        let header = BlockHeader::new(H256::from_bytes([2u8; 32]), 2, H256::from_bytes([1u8; 32]), key)
            .with_asset(1, 0)
            .with_reward(500)
            .with_timestamp(20)
            .with_received_at(21);

        assert_eq!(header.height, 2);
        assert_eq!(header.asset.max_height_previously_forged, 1);
        assert_eq!(header.asset.max_height_prevoted, 0);
        assert_eq!(header.reward, 500);
        assert_eq!(header.timestamp, 20);
        assert_eq!(header.received_at, Some(21));
        assert_eq!(header.generator_address(), key.to_address());
    }

    #[test]
    fn test_new_header_has_no_arrival_time() {
        let header = BlockHeader::new(H256::ZERO, 1, H256::ZERO, PublicKey::default());
        assert!(header.received_at.is_none());
        assert_eq!(header.asset, BlockHeaderAsset::default());
    }
}
