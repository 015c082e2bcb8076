//! Block reward schedule

use serde::{Deserialize, Serialize};

/// Full block reward owed at a height
pub trait RewardSchedule: Send + Sync {
    /// Reward for a BFT-compliant block at `height`
    fn block_reward(&self, height: u32) -> u64;
}

/// Same reward at every height
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedReward(pub u64);

impl RewardSchedule for FixedReward {
    fn block_reward(&self, _height: u32) -> u64 {
        self.0
    }
}

/// Stepwise schedule: nothing before `offset`, then one milestone per
/// `distance` heights, holding the last milestone forever.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestoneRewards {
    /// First rewarded height
    pub offset: u32,
    /// Heights per milestone
    pub distance: u32,
    /// Reward per milestone
    pub milestones: Vec<u64>,
}

impl Default for MilestoneRewards {
    fn default() -> Self {
        Self {
            offset: 2160,
            distance: 3_000_000,
            milestones: vec![
                500_000_000,
                400_000_000,
                300_000_000,
                200_000_000,
                100_000_000,
            ],
        }
    }
}

impl MilestoneRewards {
    /// Index of the milestone in effect at `height`
    pub fn milestone_index(&self, height: u32) -> Option<usize> {
        if height < self.offset || self.milestones.is_empty() || self.distance == 0 {
            return None;
        }
        let step = ((height - self.offset) / self.distance) as usize;
        Some(step.min(self.milestones.len() - 1))
    }
}

impl RewardSchedule for MilestoneRewards {
    fn block_reward(&self, height: u32) -> u64 {
        self.milestone_index(height)
            .map(|i| self.milestones[i])
            .unwrap_or(0)
    }
}
