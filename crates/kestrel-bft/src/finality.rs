//! Prevote/precommit accumulation and finalized height
//!
//! Every accepted header is an implicit vote by its generator: it prevotes
//! the heights since the generator's previous block and precommits the
//! heights below it that already crossed the prevote threshold. The highest
//! height with enough precommits is final.

use crate::contradiction::contradiction;
use crate::error::{BftError, BftResult};
use crate::header::BlockHeader;
use crate::ledger::{
    decode_finalized_height, VotingLedger, FINALIZED_HEIGHT_KEY, VOTING_LEDGER_KEY,
};
use crate::metrics::BftMetrics;
use crate::store::{HeaderHistory, StateStore};
use crate::validators::ValidatorProvider;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rounds of block production covered by the processing window
pub const BFT_ROUND_THRESHOLD: u32 = 3;

/// Notification produced by header application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalityEvent {
    /// The finalized height advanced
    FinalizedHeightChanged {
        /// Height before the header was applied
        previous: u32,
        /// Height after the header was applied
        current: u32,
    },
}

/// Owns the voting thresholds and the finalized height; the voting ledger
/// itself lives in the [`StateStore`] passed to each call.
pub struct FinalityManager {
    pre_vote_threshold: u32,
    pre_commit_threshold: u32,
    processing_threshold: u32,
    max_headers: u32,
    num_active_validators: u32,
    finalized_height: u32,
    validators: Arc<dyn ValidatorProvider>,
    metrics: Arc<BftMetrics>,
}

impl FinalityManager {
    /// Create a manager for `num_active_validators` validators per round.
    pub fn new(
        threshold: u32,
        finalized_height: u32,
        num_active_validators: u32,
        validators: Arc<dyn ValidatorProvider>,
        metrics: Arc<BftMetrics>,
    ) -> BftResult<Self> {
        if num_active_validators == 0 {
            return Err(BftError::Config("num_active_validators must be positive".into()));
        }
        if threshold == 0 {
            return Err(BftError::Config("threshold must be positive".into()));
        }
        metrics.set_finalized_height(finalized_height);
        Ok(Self {
            pre_vote_threshold: threshold,
            pre_commit_threshold: threshold,
            processing_threshold: num_active_validators
                .saturating_mul(BFT_ROUND_THRESHOLD)
                .saturating_sub(1),
            max_headers: num_active_validators.saturating_mul(5),
            num_active_validators,
            finalized_height,
            validators,
            metrics,
        })
    }

    /// Prevotes needed before a height can be precommitted
    pub fn pre_vote_threshold(&self) -> u32 {
        self.pre_vote_threshold
    }

    /// Precommits needed to finalize a height
    pub fn pre_commit_threshold(&self) -> u32 {
        self.pre_commit_threshold
    }

    /// Width of the vote window behind each header
    pub fn processing_threshold(&self) -> u32 {
        self.processing_threshold
    }

    /// Heights retained in the voting ledger
    pub fn max_headers(&self) -> u32 {
        self.max_headers
    }

    /// Validators per round
    pub fn num_active_validators(&self) -> u32 {
        self.num_active_validators
    }

    /// Current finalized height
    pub fn finalized_height(&self) -> u32 {
        self.finalized_height
    }

    /// Drop in-memory state after a chain rollback
    pub fn reset(&mut self, finalized_height: u32) {
        debug!(finalized_height, "finality manager reset");
        self.finalized_height = finalized_height;
        self.metrics.set_finalized_height(finalized_height);
    }

    /// Verify a header, record its votes and recompute the finalized height.
    pub fn add_block_header(
        &mut self,
        header: &BlockHeader,
        store: &mut dyn StateStore,
    ) -> BftResult<Option<FinalityEvent>> {
        self.verify_block_headers(header, &*store)?;
        self.update_prevotes_precommits(header, store)?;
        self.update_finalized_height(&*store)
    }

    /// Record the votes implied by `header`.
    ///
    /// Returns false when the header carries no votes: its generator is on
    /// another chain or is not a consensus participant.
    pub fn update_prevotes_precommits(
        &self,
        header: &BlockHeader,
        store: &mut dyn StateStore,
    ) -> BftResult<bool> {
        let forged = header.asset.max_height_previously_forged;
        if forged >= header.height {
            debug!(
                height = header.height,
                max_height_previously_forged = forged,
                "header skipped, generator on another chain"
            );
            self.metrics.inc_votes_skipped();
            return Ok(false);
        }

        let address = header.generator_address();
        let validator = self
            .validators
            .validators_at(header.height)?
            .into_iter()
            .find(|v| v.address == address)
            .ok_or(BftError::UnknownGenerator {
                generator: address,
                height: header.height,
            })?;
        if !validator.is_consensus_participant {
            self.metrics.inc_votes_skipped();
            return Ok(false);
        }

        let mut ledger = self.voting_ledger(&*store)?;
        let mut state = ledger.validator_state(&address);
        let min_valid = self.min_valid_height_to_pre_commit(header, store.last_block_headers());

        let height = i64::from(header.height);
        let window_start = height - i64::from(self.processing_threshold);

        // lower bound is at least 1 through maxPreCommitHeight + 1
        let pre_commit_from = window_start
            .max(i64::from(validator.min_active_height))
            .max(i64::from(min_valid))
            .max(i64::from(state.max_pre_commit_height) + 1);
        let mut precommits = 0u64;
        for h in pre_commit_from..height {
            let h = h as u32;
            if ledger.entry(h).prevotes >= self.pre_vote_threshold {
                ledger.entry_mut(h).precommits += 1;
                state.max_pre_commit_height = h;
                precommits += 1;
            }
        }

        // No check for heights this validator already prevoted from an
        // earlier header: a generator that reuses maxHeightPreviouslyForged
        // prevotes the same heights again.
        let pre_vote_from = i64::from(validator.min_active_height)
            .max(i64::from(forged) + 1)
            .max(window_start);
        let mut prevotes = 0u64;
        for h in pre_vote_from..=height {
            ledger.entry_mut(h as u32).prevotes += 1;
            prevotes += 1;
        }

        state.max_pre_vote_height = header.height;
        ledger.set_validator_state(address, state);

        let pruned = ledger.prune(self.max_headers as usize);
        store.set(VOTING_LEDGER_KEY, ledger.encode())?;

        self.metrics.add_prevotes(prevotes);
        self.metrics.add_precommits(precommits);
        debug!(
            height = header.height,
            generator = %address,
            prevotes,
            precommits,
            pruned,
            "votes recorded"
        );
        Ok(true)
    }

    /// Lowest height the generator of `header` may precommit.
    ///
    /// Follows the generator's chain of previously forged headers back
    /// through the processing window. Returns 0 when a referenced header is
    /// not in `history`.
    fn min_valid_height_to_pre_commit(
        &self,
        header: &BlockHeader,
        history: &dyn HeaderHistory,
    ) -> u32 {
        let height = i64::from(header.height);
        let window_start = height - i64::from(self.processing_threshold);
        let floor = window_start.max(1);

        let mut previously_forged = i64::from(header.asset.max_height_previously_forged);
        let mut needle = previously_forged.max(window_start);

        while needle >= floor {
            if needle != previously_forged {
                needle -= 1;
                continue;
            }

            let previous = if needle == height {
                Some(header)
            } else {
                history.header_at(needle as u32)
            };
            let Some(previous) = previous else {
                debug!(height = header.height, missing = needle, "previously forged header not in window");
                return 0;
            };

            let previous_forged = i64::from(previous.asset.max_height_previously_forged);
            if previous.generator_public_key != header.generator_public_key
                || previous_forged >= needle
            {
                return (needle + 1) as u32;
            }
            previously_forged = previous_forged;
            needle = previous_forged;
        }

        (needle + 1).max(floor) as u32
    }

    /// Advance the finalized height to the highest precommitted height.
    pub fn update_finalized_height(
        &mut self,
        store: &dyn StateStore,
    ) -> BftResult<Option<FinalityEvent>> {
        let ledger = self.voting_ledger(store)?;
        let Some(height) = ledger.highest_precommitted(self.pre_commit_threshold) else {
            return Ok(None);
        };
        if height <= self.finalized_height {
            return Ok(None);
        }

        let previous = self.finalized_height;
        self.finalized_height = height;
        self.metrics.set_finalized_height(height);
        info!(previous, finalized_height = height, "finalized height changed");
        Ok(Some(FinalityEvent::FinalizedHeightChanged {
            previous,
            current: height,
        }))
    }

    /// Check the header's claimed maxHeightPrevoted and that it does not
    /// contradict the generator's most recent header.
    pub fn verify_block_headers(
        &self,
        header: &BlockHeader,
        store: &dyn StateStore,
    ) -> BftResult<()> {
        let history = store.last_block_headers();
        let expected = self.chain_max_height_prevoted(store)?;
        let claimed = header.asset.max_height_prevoted;

        if history.len() >= self.processing_threshold as usize && claimed != expected {
            warn!(height = header.height, claimed, expected, "invalid maxHeightPrevoted");
            return Err(BftError::InvalidAttribute {
                height: header.height,
                claimed,
                expected,
            });
        }

        let Some(previous) = history.recent_header(Some(&header.generator_public_key), None) else {
            return Ok(());
        };
        if let Some(kind) = contradiction(previous, header) {
            self.metrics.inc_contradictions();
            let generator = header.generator_address();
            warn!(
                %generator,
                height = header.height,
                previous_height = previous.height,
                %kind,
                "contradicting headers"
            );
            return Err(BftError::Contradiction {
                kind,
                generator,
                height: header.height,
                previous_height: previous.height,
            });
        }
        Ok(())
    }

    /// Highest height with enough prevotes, or the finalized height if none.
    pub fn max_height_prevoted(&self, store: &dyn StateStore) -> BftResult<u32> {
        self.chain_max_height_prevoted(store)
    }

    fn chain_max_height_prevoted(&self, store: &dyn StateStore) -> BftResult<u32> {
        Ok(self
            .voting_ledger(store)?
            .highest_prevoted(self.pre_vote_threshold)
            .unwrap_or(self.finalized_height))
    }

    /// Decode the persisted voting ledger; empty when never written.
    pub fn voting_ledger(&self, store: &dyn StateStore) -> BftResult<VotingLedger> {
        match store.get(VOTING_LEDGER_KEY)? {
            Some(bytes) => VotingLedger::decode(&bytes),
            None => Ok(VotingLedger::new()),
        }
    }
}

/// Persisted finalized height, if any
pub(crate) fn load_finalized_height(store: &dyn StateStore) -> BftResult<Option<u32>> {
    store
        .get(FINALIZED_HEIGHT_KEY)?
        .map(|bytes| decode_finalized_height(&bytes))
        .transpose()
}
