//! Finality counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters updated while processing headers
#[derive(Debug, Default)]
pub struct BftMetrics {
    headers_applied: AtomicU64,
    votes_skipped: AtomicU64,
    prevotes_added: AtomicU64,
    precommits_added: AtomicU64,
    contradictions: AtomicU64,
    invalid_rewards: AtomicU64,
    finalized_height: AtomicU64,
}

impl BftMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_headers_applied(&self) {
        self.headers_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_votes_skipped(&self) {
        self.votes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_prevotes(&self, n: u64) {
        self.prevotes_added.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_precommits(&self, n: u64) {
        self.precommits_added.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_contradictions(&self) {
        self.contradictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_invalid_rewards(&self) {
        self.invalid_rewards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_finalized_height(&self, height: u32) {
        self.finalized_height.store(height as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of all values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            headers_applied: self.headers_applied.load(Ordering::Relaxed),
            votes_skipped: self.votes_skipped.load(Ordering::Relaxed),
            prevotes_added: self.prevotes_added.load(Ordering::Relaxed),
            precommits_added: self.precommits_added.load(Ordering::Relaxed),
            contradictions: self.contradictions.load(Ordering::Relaxed),
            invalid_rewards: self.invalid_rewards.load(Ordering::Relaxed),
            finalized_height: self.finalized_height.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`BftMetrics`] values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Headers applied through the facade
    pub headers_applied: u64,
    /// Headers that carried no votes
    pub votes_skipped: u64,
    /// Prevotes recorded
    pub prevotes_added: u64,
    /// Precommits recorded
    pub precommits_added: u64,
    /// Contradicting headers rejected
    pub contradictions: u64,
    /// Headers rejected for a wrong reward
    pub invalid_rewards: u64,
    /// Current finalized height
    pub finalized_height: u64,
}

impl MetricsSnapshot {
    /// Export as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let m = BftMetrics::new();
        m.inc_headers_applied();
        m.inc_headers_applied();
        m.add_prevotes(5);
        m.add_precommits(2);
        m.inc_contradictions();
        m.set_finalized_height(9);
        m.set_finalized_height(12);

        let s = m.snapshot();
        assert_eq!(s.headers_applied, 2);
        assert_eq!(s.prevotes_added, 5);
        assert_eq!(s.precommits_added, 2);
        assert_eq!(s.contradictions, 1);
        assert_eq!(s.votes_skipped, 0);
        assert_eq!(s.finalized_height, 12);
    }

    #[test]
    fn test_json_export() {
        let m = BftMetrics::new();
        m.inc_invalid_rewards();
        let json = m.snapshot().to_json();
        assert_eq!(json["invalid_rewards"], 1);
        assert_eq!(json["finalized_height"], 0);
    }
}
