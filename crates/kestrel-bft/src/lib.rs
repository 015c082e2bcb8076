//! # kestrel-bft
//!
//! BFT finality gadget for a delegated-proof-of-stake chain.
//!
//! This crate provides:
//! - Prevote/precommit voting ledger and finalized height ([`FinalityManager`])
//! - Deterministic fork choice between competing tips ([`fork_choice`])
//! - Detection of contradicting headers from one generator ([`contradicts`])
//! - Bounded, height-contiguous window of recent headers ([`HeadersList`])
//! - The [`Bft`] facade used by block processing
//!
//! Callers serialize header application per chain; nothing here locks.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bft;
mod config;
mod contradiction;
mod error;
mod finality;
mod fork_choice;
mod header;
mod headers_list;
mod ledger;
mod metrics;
mod reward;
mod slots;
mod store;
mod validators;

pub use bft::Bft;
pub use config::{BftConfig, SlotsConfig};
pub use contradiction::{contradicts, contradiction, ContradictionKind};
pub use error::{BftError, BftResult};
pub use finality::{FinalityEvent, FinalityManager, BFT_ROUND_THRESHOLD};
pub use fork_choice::{fork_choice, ForkStatus};
pub use header::{BlockHeader, BlockHeaderAsset};
pub use headers_list::HeadersList;
pub use ledger::{
    decode_finalized_height, encode_finalized_height, LedgerEntry, ValidatorVoteState,
    VotingLedger, FINALIZED_HEIGHT_KEY, VOTING_LEDGER_KEY,
};
pub use metrics::{BftMetrics, MetricsSnapshot};
pub use reward::{FixedReward, MilestoneRewards, RewardSchedule};
pub use slots::Slots;
pub use store::{ChainStateStore, HeaderHistory, StateStore};
pub use validators::{ActiveValidator, ValidatorProvider, ValidatorSet};
