//! BFT facade used by block processing

use crate::config::BftConfig;
use crate::error::{BftError, BftResult};
use crate::finality::{load_finalized_height, FinalityEvent, FinalityManager, BFT_ROUND_THRESHOLD};
use crate::fork_choice::{fork_choice, ForkStatus};
use crate::header::BlockHeader;
use crate::ledger::{encode_finalized_height, FINALIZED_HEIGHT_KEY};
use crate::metrics::BftMetrics;
use crate::reward::RewardSchedule;
use crate::slots::Slots;
use crate::store::StateStore;
use crate::validators::ValidatorProvider;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Entry point for block processing: fork choice, header verification and
/// header application.
///
/// Must be initialized with [`Bft::init`] before headers are verified or
/// applied.
pub struct Bft {
    config: BftConfig,
    slots: Slots,
    validators: Arc<dyn ValidatorProvider>,
    rewards: Arc<dyn RewardSchedule>,
    metrics: Arc<BftMetrics>,
    finality_manager: Option<FinalityManager>,
}

impl Bft {
    /// Create an uninitialized facade
    pub fn new(
        config: BftConfig,
        validators: Arc<dyn ValidatorProvider>,
        rewards: Arc<dyn RewardSchedule>,
    ) -> BftResult<Self> {
        config.validate()?;
        let slots = config.slots.to_slots()?;
        Ok(Self {
            config,
            slots,
            validators,
            rewards,
            metrics: Arc::new(BftMetrics::new()),
            finality_manager: None,
        })
    }

    /// Create a facade paying rewards from the configured milestone schedule
    pub fn from_config(config: BftConfig, validators: Arc<dyn ValidatorProvider>) -> BftResult<Self> {
        let rewards = Arc::new(config.rewards.clone());
        Self::new(config, validators, rewards)
    }

    /// Load the persisted finalized height and build the finality manager.
    pub fn init(&mut self, store: &dyn StateStore) -> BftResult<()> {
        let finalized_height =
            load_finalized_height(store)?.unwrap_or(self.config.genesis_height);
        let manager = FinalityManager::new(
            self.config.effective_threshold(),
            finalized_height,
            self.config.num_active_validators,
            self.validators.clone(),
            self.metrics.clone(),
        )?;
        info!(
            finalized_height,
            threshold = manager.pre_vote_threshold(),
            num_active_validators = manager.num_active_validators(),
            "bft initialized"
        );
        self.finality_manager = Some(manager);
        Ok(())
    }

    /// Drop in-memory state; [`Bft::init`] must run again afterwards.
    pub fn reset(&mut self) {
        if self.finality_manager.take().is_some() {
            info!("bft reset");
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &BftConfig {
        &self.config
    }

    /// Slot arithmetic in use
    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Shared counters
    pub fn metrics(&self) -> &Arc<BftMetrics> {
        &self.metrics
    }

    /// Finality manager, once initialized
    pub fn finality_manager(&self) -> Option<&FinalityManager> {
        self.finality_manager.as_ref()
    }

    /// Current finalized height, once initialized
    pub fn finalized_height(&self) -> Option<u32> {
        self.finality_manager.as_ref().map(|m| m.finalized_height())
    }

    fn manager(&self) -> BftResult<&FinalityManager> {
        self.finality_manager.as_ref().ok_or(BftError::NotInitialized)
    }

    fn manager_mut(&mut self) -> BftResult<&mut FinalityManager> {
        self.finality_manager.as_mut().ok_or(BftError::NotInitialized)
    }

    /// Record the votes of an accepted header and persist the finalized height.
    pub fn apply_block_header(
        &mut self,
        header: &BlockHeader,
        store: &mut dyn StateStore,
    ) -> BftResult<Option<FinalityEvent>> {
        let manager = self.manager_mut()?;
        let event = manager.add_block_header(header, store)?;
        let finalized_height = manager.finalized_height();
        store.set(FINALIZED_HEIGHT_KEY, encode_finalized_height(finalized_height))?;

        self.metrics.inc_headers_applied();
        debug!(height = header.height, finalized_height, "header applied");
        Ok(event)
    }

    /// Check the header's reward against its BFT compliance, then its BFT
    /// properties.
    ///
    /// A non-compliant generator is paid a quarter of the block reward.
    pub fn verify_block_header(&self, header: &BlockHeader, store: &dyn StateStore) -> BftResult<()> {
        let manager = self.manager()?;

        let reward = self.rewards.block_reward(header.height);
        let expected = if self.is_bft_protocol_compliant(header, store)? {
            reward
        } else {
            reward / 4
        };
        if header.reward != expected {
            self.metrics.inc_invalid_rewards();
            warn!(
                height = header.height,
                actual = header.reward,
                expected,
                "invalid block reward"
            );
            return Err(BftError::InvalidReward {
                height: header.height,
                actual: header.reward,
                expected,
            });
        }

        manager.verify_block_headers(header, store)
    }

    /// Stamp the arrival time of `header` and classify it against `last`.
    pub fn fork_choice(&self, header: &mut BlockHeader, last: &BlockHeader) -> ForkStatus {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.fork_choice_at(header, last, now)
    }

    /// [`Bft::fork_choice`] with an explicit Unix time
    pub fn fork_choice_at(&self, header: &mut BlockHeader, last: &BlockHeader, now: u64) -> ForkStatus {
        header.received_at = Some(self.slots.time_since_genesis(now));
        let status = fork_choice(last, header, &self.slots);
        debug!(
            height = header.height,
            last_height = last.height,
            %status,
            "fork choice"
        );
        status
    }

    /// True if the generator's previous block is on the same chain as `header`.
    ///
    /// Generators without a previous block, or whose previous block is older
    /// than the BFT rounds window, are compliant.
    pub fn is_bft_protocol_compliant(
        &self,
        header: &BlockHeader,
        store: &dyn StateStore,
    ) -> BftResult<bool> {
        let forged = header.asset.max_height_previously_forged;
        if forged == 0 {
            return Ok(true);
        }
        if header.height <= forged {
            return Ok(false);
        }
        let window = self
            .config
            .num_active_validators
            .saturating_mul(BFT_ROUND_THRESHOLD);
        if header.height - forged > window {
            return Ok(true);
        }

        let previous = store
            .last_block_headers()
            .header_at(forged)
            .ok_or_else(|| {
                warn!(height = header.height, missing = forged, "previously forged header not in window");
                BftError::MissingHeader { height: forged }
            })?;
        Ok(previous.generator_public_key == header.generator_public_key)
    }

    /// Highest height with enough prevotes, or the finalized height if none
    pub fn max_height_prevoted(&self, store: &dyn StateStore) -> BftResult<u32> {
        self.manager()?.max_height_prevoted(store)
    }
}
