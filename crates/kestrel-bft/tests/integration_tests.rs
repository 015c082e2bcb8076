//! Integration tests for kestrel-bft driven through the `Bft` facade

use kestrel_bft::{
    ActiveValidator, Bft, BftConfig, BftError, BlockHeader, ChainStateStore, ContradictionKind,
    FinalityEvent, FixedReward, ForkStatus, HeadersList, SlotsConfig, StateStore, ValidatorSet,
    VotingLedger, FINALIZED_HEIGHT_KEY, VOTING_LEDGER_KEY,
};
use kestrel_primitives::{PublicKey, H256};
use kestrel_storage::{ConsensusDb, Database, KvStore, MemoryDb};
use std::collections::HashMap;
use std::sync::Arc;

const GENESIS_TIMESTAMP: u32 = 1_600_000_000;
const BLOCK_TIME: u32 = 10;
const REWARD: u64 = 500;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn key(n: u8) -> PublicKey {
    PublicKey::from_bytes([n; 32])
}

fn block_id(height: u32, generator: u8) -> H256 {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&height.to_le_bytes());
    bytes[4] = generator;
    H256::from_bytes(bytes)
}

fn config() -> BftConfig {
    BftConfig {
        threshold: Some(3),
        genesis_height: 0,
        num_active_validators: 4,
        slots: SlotsConfig {
            genesis_timestamp: GENESIS_TIMESTAMP,
            block_time: BLOCK_TIME,
        },
        ..BftConfig::default()
    }
}

fn validators() -> Arc<ValidatorSet> {
    Arc::new(ValidatorSet::from_validators(
        (1..=4)
            .map(|g| ActiveValidator::new(key(g).to_address(), 1))
            .collect(),
    ))
}

/// Block processing loop over a key-value store and a header window.
struct Node<K: KvStore> {
    bft: Bft,
    db: K,
    headers: HeadersList,
    last_forged: HashMap<u8, u32>,
}

impl<K: KvStore> Node<K> {
    fn new(db: K) -> Self {
        let mut bft = Bft::new(config(), validators(), Arc::new(FixedReward(REWARD))).unwrap();
        let headers = HeadersList::new(20);
        bft.init(&ChainStateStore::new(&db, &headers)).unwrap();
        Self {
            bft,
            db,
            headers,
            last_forged: HashMap::new(),
        }
    }

    fn tip(&self) -> Option<&BlockHeader> {
        self.headers.last()
    }

    /// Header forged by `generator` on top of the current tip
    fn forge(&self, generator: u8) -> BlockHeader {
        let store = ChainStateStore::new(&self.db, &self.headers);
        let height = self.tip().map_or(1, |h| h.height + 1);
        let previous = self.tip().map_or(H256::ZERO, |h| h.id);
        let mhp = self.bft.max_height_prevoted(&store).unwrap();
        let mhpf = self.last_forged.get(&generator).copied().unwrap_or(0);

        BlockHeader::new(block_id(height, generator), height, previous, key(generator))
            .with_asset(mhpf, mhp)
            .with_reward(REWARD)
            .with_timestamp(GENESIS_TIMESTAMP + height * BLOCK_TIME)
    }

    /// Run a received header through fork choice, verification and application.
    fn receive(&mut self, mut header: BlockHeader) -> Result<Option<FinalityEvent>, BftError> {
        if let Some(tip) = self.tip() {
            let now = u64::from(header.timestamp) + 1;
            let status = self.bft.fork_choice_at(&mut header, tip, now);
            assert_eq!(status, ForkStatus::ValidBlock);
        }

        let mut store = ChainStateStore::new(&self.db, &self.headers);
        self.bft.verify_block_header(&header, &store)?;
        let event = self.bft.apply_block_header(&header, &mut store)?;
        store.commit()?;

        self.last_forged
            .insert(header.generator_public_key.as_bytes()[0], header.height);
        self.headers.add(header)?;
        Ok(event)
    }

    fn forge_and_receive(&mut self, generator: u8) -> Option<FinalityEvent> {
        let header = self.forge(generator);
        self.receive(header).unwrap()
    }

    fn ledger(&self) -> VotingLedger {
        let bytes = self.db.get(VOTING_LEDGER_KEY).unwrap().unwrap_or_default();
        if bytes.is_empty() {
            return VotingLedger::new();
        }
        VotingLedger::decode(&bytes).unwrap()
    }
}

// =============================================================================
// Finality
// =============================================================================

#[test]
fn test_three_of_four_prevote_then_finalize() {
    init_tracing();
    let mut node = Node::new(MemoryDb::new());

    for generator in [1, 2, 3] {
        assert_eq!(node.forge_and_receive(generator), None);
    }
    assert_eq!(node.ledger().entry(1).prevotes, 3);

    assert_eq!(node.forge_and_receive(4), None);
    assert_eq!(node.ledger().entry(1).precommits, 1);
    assert_eq!(node.forge_and_receive(1), None);

    let event = node.forge_and_receive(2);
    assert_eq!(
        event,
        Some(FinalityEvent::FinalizedHeightChanged { previous: 0, current: 1 })
    );
    assert_eq!(node.bft.finalized_height(), Some(1));
    assert_eq!(
        node.db.get(FINALIZED_HEIGHT_KEY).unwrap(),
        Some(1u32.to_le_bytes().to_vec())
    );
}

#[test]
fn test_finality_follows_round_robin() {
    init_tracing();
    let mut node = Node::new(MemoryDb::new());

    let mut finalized = Vec::new();
    for i in 0..40u8 {
        if let Some(FinalityEvent::FinalizedHeightChanged { current, .. }) =
            node.forge_and_receive(i % 4 + 1)
        {
            finalized.push(current);
        }
    }

    assert!(finalized.windows(2).all(|w| w[0] < w[1]));
    // finality trails the tip by a bounded number of blocks
    let finalized_height = node.bft.finalized_height().unwrap();
    assert!(finalized_height >= 40 - 8, "finalized {}", finalized_height);

    let snapshot = node.bft.metrics().snapshot();
    assert_eq!(snapshot.headers_applied, 40);
    assert_eq!(snapshot.finalized_height, u64::from(finalized_height));
    assert_eq!(snapshot.contradictions, 0);
    assert!(node.ledger().ledger.len() <= 20);
}

#[test]
fn test_standby_validator_does_not_vote() {
    let mut set = ValidatorSet::from_validators(
        (1..=3)
            .map(|g| ActiveValidator::new(key(g).to_address(), 1))
            .collect(),
    );
    set.add(ActiveValidator::standby(key(4).to_address(), 1));

    let db = MemoryDb::new();
    let headers = HeadersList::new(20);
    let mut bft = Bft::new(config(), Arc::new(set), Arc::new(FixedReward(REWARD))).unwrap();
    bft.init(&ChainStateStore::new(&db, &headers)).unwrap();

    let header = BlockHeader::new(block_id(1, 4), 1, H256::ZERO, key(4)).with_reward(REWARD);
    let mut store = ChainStateStore::new(&db, &headers);
    bft.apply_block_header(&header, &mut store).unwrap();

    assert!(store.get(VOTING_LEDGER_KEY).unwrap().is_none());
    assert_eq!(bft.metrics().snapshot().votes_skipped, 1);
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_contradicting_header_is_not_applied() {
    init_tracing();
    let mut node = Node::new(MemoryDb::new());
    node.forge_and_receive(1);
    node.forge_and_receive(2);
    let before = node.ledger();

    // generator 1 pretends it never forged height 1
    let mut double = node.forge(1);
    double.asset.max_height_previously_forged = 0;

    let err = node.receive(double).unwrap_err();
    assert!(matches!(
        err,
        BftError::Contradiction {
            kind: ContradictionKind::ChainDisjoint,
            previous_height: 1,
            ..
        }
    ));
    assert_eq!(node.ledger(), before);
    assert_eq!(node.headers.len(), 2);
}

#[test]
fn test_wrong_reward_is_rejected() {
    let mut node = Node::new(MemoryDb::new());
    node.forge_and_receive(1);

    let header = node.forge(2).with_reward(REWARD / 4);
    let err = node.receive(header).unwrap_err();
    assert!(matches!(
        err,
        BftError::InvalidReward { height: 2, actual: 125, expected: 500 }
    ));
}

#[test]
fn test_wrong_max_height_prevoted_is_rejected() {
    let mut node = Node::new(MemoryDb::new());
    for i in 0..12u8 {
        node.forge_and_receive(i % 4 + 1);
    }

    let mut header = node.forge(1);
    header.asset.max_height_prevoted = 0;
    let err = node.receive(header).unwrap_err();
    assert!(matches!(err, BftError::InvalidAttribute { height: 13, claimed: 0, .. }));
}

// =============================================================================
// Fork choice
// =============================================================================

#[test]
fn test_fork_choice_outcomes() {
    let node = Node::new(MemoryDb::new());
    let last = BlockHeader::new(block_id(5, 1), 5, block_id(4, 4), key(1))
        .with_asset(1, 3)
        .with_timestamp(GENESIS_TIMESTAMP + 50);
    let now = u64::from(GENESIS_TIMESTAMP + 51);

    let mut next = BlockHeader::new(block_id(6, 2), 6, last.id, key(2));
    assert_eq!(node.bft.fork_choice_at(&mut next, &last, now), ForkStatus::ValidBlock);

    let mut double = BlockHeader::new(block_id(5, 9), 5, block_id(4, 4), key(1))
        .with_asset(1, 3)
        .with_timestamp(GENESIS_TIMESTAMP + 50);
    assert_eq!(node.bft.fork_choice_at(&mut double, &last, now), ForkStatus::DoubleForging);

    let mut higher = BlockHeader::new(block_id(5, 3), 5, block_id(4, 7), key(3)).with_asset(0, 4);
    assert_eq!(node.bft.fork_choice_at(&mut higher, &last, now), ForkStatus::DifferentChain);

    let mut lower = BlockHeader::new(block_id(4, 3), 4, block_id(3, 7), key(3)).with_asset(0, 3);
    assert_eq!(node.bft.fork_choice_at(&mut lower, &last, now), ForkStatus::Discard);
}

#[test]
fn test_tie_break_prefers_on_time_block() {
    let node = Node::new(MemoryDb::new());
    // last arrived two slots late
    let last = BlockHeader::new(block_id(5, 1), 5, block_id(4, 4), key(1))
        .with_timestamp(GENESIS_TIMESTAMP + 50)
        .with_received_at(70);

    let mut received = BlockHeader::new(block_id(5, 2), 5, block_id(4, 4), key(2))
        .with_timestamp(GENESIS_TIMESTAMP + 60);
    let now = u64::from(GENESIS_TIMESTAMP + 62);
    assert_eq!(node.bft.fork_choice_at(&mut received, &last, now), ForkStatus::TieBreak);
    assert_eq!(received.received_at, Some(62));
}

// =============================================================================
// Persistence and rollback
// =============================================================================

#[test]
fn test_restart_from_rocksdb() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let (finalized, ledger) = {
        let database = Database::new(dir.path());
        database.open().unwrap();
        let mut node = Node::new(ConsensusDb::new(database.clone()));
        for i in 0..12u8 {
            node.forge_and_receive(i % 4 + 1);
        }
        let finalized = node.bft.finalized_height().unwrap();
        let ledger = node.ledger();
        database.close();
        (finalized, ledger)
    };
    assert!(finalized > 0);

    let database = Database::new(dir.path());
    database.open().unwrap();
    let node = Node::new(ConsensusDb::new(database));
    assert_eq!(node.bft.finalized_height(), Some(finalized));
    assert_eq!(node.ledger(), ledger);
}

#[test]
fn test_rollback_and_reinit() {
    let mut node = Node::new(MemoryDb::new());
    for i in 0..8u8 {
        node.forge_and_receive(i % 4 + 1);
    }
    let finalized = node.bft.finalized_height().unwrap();

    let removed = node.headers.remove(Some(4));
    assert_eq!(removed.len(), 4);
    assert_eq!(node.tip().map(|h| h.height), Some(4));

    node.bft.reset();
    assert_eq!(node.bft.finalized_height(), None);

    node.bft
        .init(&ChainStateStore::new(&node.db, &node.headers))
        .unwrap();
    assert_eq!(node.bft.finalized_height(), Some(finalized));
}

#[test]
fn test_config_from_json_drives_facade() {
    let config = BftConfig::from_json_str(
        r#"{
            "num_active_validators": 4,
            "genesis_height": 2,
            "slots": { "genesis_timestamp": 1600000000, "block_time": 10 },
            "rewards": { "offset": 1, "distance": 10, "milestones": [300, 200] }
        }"#,
    )
    .unwrap();
    assert_eq!(config.effective_threshold(), 3);

    let mut bft = Bft::from_config(config, validators()).unwrap();
    let db = MemoryDb::new();
    let headers = HeadersList::new(20);
    let store = ChainStateStore::new(&db, &headers);
    bft.init(&store).unwrap();
    assert_eq!(bft.finalized_height(), Some(2));

    let header = BlockHeader::new(block_id(11, 1), 11, H256::ZERO, key(1)).with_reward(200);
    bft.verify_block_header(&header, &store).unwrap();

    let json = bft.metrics().snapshot().to_json();
    assert_eq!(json["finalized_height"], 2);
}
