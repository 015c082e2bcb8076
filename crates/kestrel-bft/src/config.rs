//! Configuration for the finality core

use crate::error::{BftError, BftResult};
use crate::reward::MilestoneRewards;
use crate::slots::Slots;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Finality configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BftConfig {
    /// Prevote/precommit threshold; derived from the validator count when unset
    #[serde(default)]
    pub threshold: Option<u32>,
    /// Height of the genesis block, the initial finalized height
    #[serde(default)]
    pub genesis_height: u32,
    /// Number of active validators per round
    #[serde(default = "default_num_active_validators")]
    pub num_active_validators: u32,
    /// Slot configuration
    #[serde(default)]
    pub slots: SlotsConfig,
    /// Block reward schedule
    #[serde(default)]
    pub rewards: MilestoneRewards,
}

fn default_num_active_validators() -> u32 {
    101
}

impl Default for BftConfig {
    fn default() -> Self {
        Self {
            threshold: None,
            genesis_height: 0,
            num_active_validators: default_num_active_validators(),
            slots: SlotsConfig::default(),
            rewards: MilestoneRewards::default(),
        }
    }
}

/// Slot configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotsConfig {
    /// Genesis block timestamp (Unix seconds)
    #[serde(default)]
    pub genesis_timestamp: u32,
    /// Slot length in seconds
    #[serde(default = "default_block_time")]
    pub block_time: u32,
}

fn default_block_time() -> u32 {
    10
}

impl Default for SlotsConfig {
    fn default() -> Self {
        Self {
            genesis_timestamp: 0,
            block_time: default_block_time(),
        }
    }
}

impl SlotsConfig {
    /// Build slot arithmetic from this configuration
    pub fn to_slots(&self) -> BftResult<Slots> {
        Slots::new(self.genesis_timestamp, self.block_time)
    }
}

impl BftConfig {
    /// Threshold for `n` validators: more than two thirds
    pub fn default_threshold(n: u32) -> u32 {
        // Never above `n` once n >= 1, so the narrowing is lossless.
        (u64::from(n) * 2 / 3 + 1) as u32
    }

    /// Parse configuration from JSON
    pub fn from_json_str(json: &str) -> BftResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BftError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> BftResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BftError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Threshold in effect
    pub fn effective_threshold(&self) -> u32 {
        self.threshold
            .unwrap_or_else(|| Self::default_threshold(self.num_active_validators))
    }

    /// Check value ranges
    pub fn validate(&self) -> BftResult<()> {
        if self.num_active_validators == 0 {
            return Err(BftError::Config("num_active_validators must be positive".into()));
        }
        let threshold = self.effective_threshold();
        if threshold == 0 || threshold > self.num_active_validators {
            return Err(BftError::Config(format!(
                "threshold {} out of range 1..={}",
                threshold, self.num_active_validators
            )));
        }
        if self.slots.block_time == 0 {
            return Err(BftError::Config("block_time must be positive".into()));
        }
        if self.rewards.distance == 0 {
            return Err(BftError::Config("reward distance must be positive".into()));
        }
        Ok(())
    }
}
