//! # Quorum Lifecycle Tracker
//!
//! Keeps, per LLMQ type, every quorum ever formed in an append-only arena and
//! the bounded active list used for new signing requests.
//!
//! ## Historical lookup
//!
//! Quorum base blocks are aligned to `dkg_interval`. The set that was active
//! at height `H` is reconstructed by aligning `H` down to the interval and
//! walking back through formation heights until `signing_active_quorum_count`
//! quorums are collected:
//!
//! ```text
//! height:   0     24     48     72     96    120
//! formed:   q0    q1     q2     q3     q4    q5
//!                               ^ H = 80 aligns to 72
//! quorums_near(80) with count 4 = [q0, q1, q2, q3]
//! ```
//!
//! Eviction from the active list never removes a quorum from the arena, so
//! explicit-hash and height-pinned lookups keep working after rotation.

use super::quorum::Quorum;
use super::types::{short_hex, Hash, LlmqParams, LlmqType};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-type tracker state.
#[derive(Default)]
struct TypeState {
    /// Every quorum formed, in formation order
    arena: Vec<Arc<Quorum>>,
    /// quorum hash -> arena slot
    by_hash: HashMap<Hash, usize>,
    /// base block height -> arena slots
    by_height: BTreeMap<u64, Vec<usize>>,
    /// Arena slots of the active list, oldest first
    active: VecDeque<usize>,
}

/// Ordered active-quorum lists plus historical index, per LLMQ type.
pub struct QuorumTracker {
    params: HashMap<LlmqType, LlmqParams>,
    state: RwLock<HashMap<LlmqType, TypeState>>,
}

impl QuorumTracker {
    pub fn new(params: impl IntoIterator<Item = LlmqParams>) -> Self {
        Self {
            params: params.into_iter().map(|p| (p.llmq_type, p)).collect(),
            state: RwLock::new(HashMap::new()),
        }
    }

    pub fn params(&self, llmq_type: LlmqType) -> Option<&LlmqParams> {
        self.params.get(&llmq_type)
    }

    /// Record a newly formed quorum.
    ///
    /// Returns `false` if the type is unknown, the threshold cannot be met
    /// by the member list, or the quorum was already recorded.
    pub fn on_quorum_formed(&self, quorum: Quorum) -> bool {
        let Some(params) = self.params.get(&quorum.llmq_type) else {
            debug!(
                "[qc-18] Ignoring quorum {} of unconfigured type {}",
                short_hex(&quorum.quorum_hash),
                quorum.llmq_type
            );
            return false;
        };
        if quorum.threshold == 0 || quorum.threshold > quorum.size() {
            warn!(
                "[qc-18] Rejecting quorum {}: threshold {} with {} members",
                short_hex(&quorum.quorum_hash),
                quorum.threshold,
                quorum.size()
            );
            return false;
        }

        let mut state = self.state.write();
        let type_state = state.entry(quorum.llmq_type).or_default();
        if type_state.by_hash.contains_key(&quorum.quorum_hash) {
            return false;
        }

        let slot = type_state.arena.len();
        type_state.by_hash.insert(quorum.quorum_hash, slot);
        type_state
            .by_height
            .entry(quorum.height)
            .or_default()
            .push(slot);
        type_state.active.push_back(slot);

        while type_state.active.len() > params.signing_active_quorum_count {
            if let Some(evicted) = type_state.active.pop_front() {
                debug!(
                    "[qc-18] Quorum {} rotated out of the active {} set",
                    short_hex(&type_state.arena[evicted].quorum_hash),
                    quorum.llmq_type
                );
            }
        }

        info!(
            "[qc-18] Quorum formed: type={} hash={} height={} members={} threshold={}",
            quorum.llmq_type,
            short_hex(&quorum.quorum_hash),
            quorum.height,
            quorum.size(),
            quorum.threshold
        );
        type_state.arena.push(Arc::new(quorum));
        true
    }

    /// Active quorums of `llmq_type`, most recent last.
    pub fn active_quorums(&self, llmq_type: LlmqType) -> Vec<Arc<Quorum>> {
        let state = self.state.read();
        state
            .get(&llmq_type)
            .map(|s| s.active.iter().map(|&i| Arc::clone(&s.arena[i])).collect())
            .unwrap_or_default()
    }

    /// Any known quorum of `llmq_type`, active or historical.
    pub fn quorum_by_hash(&self, llmq_type: LlmqType, quorum_hash: &Hash) -> Option<Arc<Quorum>> {
        let state = self.state.read();
        let type_state = state.get(&llmq_type)?;
        type_state
            .by_hash
            .get(quorum_hash)
            .map(|&i| Arc::clone(&type_state.arena[i]))
    }

    /// The quorums that were active for `llmq_type` at `height`, most recent
    /// last.
    pub fn quorums_near(&self, llmq_type: LlmqType, height: u64) -> Vec<Arc<Quorum>> {
        let Some(params) = self.params.get(&llmq_type) else {
            return Vec::new();
        };
        let interval = params.dkg_interval.max(1);
        let aligned = height - height % interval;

        let state = self.state.read();
        let Some(type_state) = state.get(&llmq_type) else {
            return Vec::new();
        };

        let mut found: Vec<Arc<Quorum>> = type_state
            .by_height
            .range(..=aligned)
            .rev()
            .flat_map(|(_, slots)| slots.iter().rev())
            .take(params.signing_active_quorum_count)
            .map(|&i| Arc::clone(&type_state.arena[i]))
            .collect();
        found.reverse();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::BlsPublicKey;
    use crate::domain::quorum::QuorumMember;

    fn quorum(n: u8, height: u64) -> Quorum {
        Quorum {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [n; 32],
            height,
            members: (0..3u8)
                .map(|i| QuorumMember {
                    pro_tx_hash: [i + 1; 32],
                    public_key_share: BlsPublicKey::default(),
                    valid: true,
                })
                .collect(),
            quorum_public_key: BlsPublicKey::default(),
            threshold: 2,
        }
    }

    fn tracker() -> QuorumTracker {
        QuorumTracker::new([LlmqType::LlmqTest.default_params()])
    }

    fn hashes(quorums: &[Arc<Quorum>]) -> Vec<u8> {
        quorums.iter().map(|q| q.quorum_hash[0]).collect()
    }

    #[test]
    fn test_active_list_evicts_oldest() {
        let tracker = tracker();
        for n in 0..6u8 {
            assert!(tracker.on_quorum_formed(quorum(n, n as u64 * 24)));
        }

        assert_eq!(hashes(&tracker.active_quorums(LlmqType::LlmqTest)), vec![2, 3, 4, 5]);
        assert!(tracker.quorum_by_hash(LlmqType::LlmqTest, &[0u8; 32]).is_some());
    }

    #[test]
    fn test_evicted_quorum_still_resolvable_by_hash() {
        let tracker = tracker();
        for n in 0..6u8 {
            tracker.on_quorum_formed(quorum(n, n as u64 * 24));
        }

        assert!(tracker.quorum_by_hash(LlmqType::LlmqTest, &[0u8; 32]).is_some());
        assert!(tracker.quorum_by_hash(LlmqType::LlmqTest, &[9u8; 32]).is_none());
        assert!(tracker.quorum_by_hash(LlmqType::Llmq400_60, &[0u8; 32]).is_none());
    }

    #[test]
    fn test_duplicate_formation_ignored() {
        let tracker = tracker();
        assert!(tracker.on_quorum_formed(quorum(1, 24)));
        assert!(!tracker.on_quorum_formed(quorum(1, 24)));
        assert_eq!(tracker.active_quorums(LlmqType::LlmqTest).len(), 1);
    }

    #[test]
    fn test_unreachable_threshold_rejected() {
        let tracker = tracker();

        let mut zero = quorum(1, 24);
        zero.threshold = 0;
        assert!(!tracker.on_quorum_formed(zero));

        let mut too_high = quorum(2, 48);
        too_high.threshold = 4;
        assert!(!tracker.on_quorum_formed(too_high));

        let mut empty = quorum(3, 72);
        empty.members.clear();
        assert!(!tracker.on_quorum_formed(empty));

        assert!(tracker.active_quorums(LlmqType::LlmqTest).is_empty());
        assert!(tracker.on_quorum_formed(quorum(4, 96)));
    }

    #[test]
    fn test_unconfigured_type_ignored() {
        let tracker = tracker();
        let mut q = quorum(1, 288);
        q.llmq_type = LlmqType::Llmq400_60;
        assert!(!tracker.on_quorum_formed(q));
    }

    #[test]
    fn test_quorums_near_reconstructs_history() {
        let tracker = tracker();
        for n in 0..6u8 {
            tracker.on_quorum_formed(quorum(n, n as u64 * 24));
        }

        assert_eq!(hashes(&tracker.quorums_near(LlmqType::LlmqTest, 80)), vec![0, 1, 2, 3]);
        assert_eq!(hashes(&tracker.quorums_near(LlmqType::LlmqTest, 30)), vec![0, 1]);
        assert_eq!(hashes(&tracker.quorums_near(LlmqType::LlmqTest, 500)), vec![2, 3, 4, 5]);
        assert!(tracker.quorums_near(LlmqType::Llmq400_60, 500).is_empty());
    }

    #[test]
    fn test_quorums_near_skips_missed_rounds() {
        let tracker = tracker();
        tracker.on_quorum_formed(quorum(0, 0));
        tracker.on_quorum_formed(quorum(1, 24));
        // no quorum formed at 48
        tracker.on_quorum_formed(quorum(3, 72));

        assert_eq!(hashes(&tracker.quorums_near(LlmqType::LlmqTest, 72)), vec![0, 1, 3]);
    }
}
