//! Deterministic quorum and recovery-member selection
//!
//! Every honest node with the same active-quorum view must pick the same
//! quorum for a request id without coordinating. Both choices are driven by a
//! pluggable [`QuorumScorer`]; lowest score wins.

use super::quorum::Quorum;
use super::quorum_tracker::QuorumTracker;
use super::types::{sha256d, Hash, LlmqType, MemberIndex};
use crate::error::{SigningError, SigningResult};
use std::sync::Arc;

/// Deterministic scoring used for selection.
pub trait QuorumScorer: Send + Sync {
    /// Score of a quorum for a request id.
    fn quorum_score(&self, quorum_hash: &Hash, id: &Hash) -> Hash;

    /// Rank of a member as a recovery candidate for a request id.
    fn member_score(&self, quorum_hash: &Hash, id: &Hash, member: MemberIndex) -> Hash;
}

/// Double-SHA256 keyed distance.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256dScorer;

impl QuorumScorer for Sha256dScorer {
    fn quorum_score(&self, quorum_hash: &Hash, id: &Hash) -> Hash {
        sha256d(&[quorum_hash, id])
    }

    fn member_score(&self, quorum_hash: &Hash, id: &Hash, member: MemberIndex) -> Hash {
        sha256d(&[id, quorum_hash, &member.to_le_bytes()])
    }
}

/// Maps request ids to quorums and recovery members.
pub struct QuorumSelector {
    tracker: Arc<QuorumTracker>,
    scorer: Arc<dyn QuorumScorer>,
}

impl QuorumSelector {
    pub fn new(tracker: Arc<QuorumTracker>) -> Self {
        Self::with_scorer(tracker, Arc::new(Sha256dScorer))
    }

    pub fn with_scorer(tracker: Arc<QuorumTracker>, scorer: Arc<dyn QuorumScorer>) -> Self {
        Self { tracker, scorer }
    }

    /// Resolve the quorum responsible for `id`.
    ///
    /// An explicit hash must name a known quorum of `llmq_type`, active or
    /// historical. Otherwise the lowest-scoring active quorum is chosen.
    pub fn select(
        &self,
        llmq_type: LlmqType,
        id: &Hash,
        explicit_quorum_hash: Option<&Hash>,
    ) -> SigningResult<Arc<Quorum>> {
        if self.tracker.params(llmq_type).is_none() {
            return Err(SigningError::UnknownLlmqType { llmq_type });
        }

        if let Some(quorum_hash) = explicit_quorum_hash {
            return self
                .tracker
                .quorum_by_hash(llmq_type, quorum_hash)
                .ok_or(SigningError::QuorumNotFound {
                    quorum_hash: *quorum_hash,
                });
        }

        self.select_from(&self.tracker.active_quorums(llmq_type), id)
            .ok_or(SigningError::NoActiveQuorums { llmq_type })
    }

    /// Pick the lowest-scoring quorum of `candidates` for `id`.
    ///
    /// Equal scores fall back to the quorum hash so the result never depends
    /// on candidate order.
    pub fn select_from(&self, candidates: &[Arc<Quorum>], id: &Hash) -> Option<Arc<Quorum>> {
        candidates
            .iter()
            .min_by_key(|q| (self.scorer.quorum_score(&q.quorum_hash, id), q.quorum_hash))
            .cloned()
    }

    /// Selection restricted to the quorums active at `height`.
    pub fn select_at_height(&self, llmq_type: LlmqType, id: &Hash, height: u64) -> Option<Arc<Quorum>> {
        self.select_from(&self.tracker.quorums_near(llmq_type, height), id)
    }

    /// Valid members designated to aggregate for `id`, best-ranked first.
    pub fn recovery_members(&self, quorum: &Quorum, id: &Hash) -> Vec<MemberIndex> {
        let count = self
            .tracker
            .params(quorum.llmq_type)
            .map(|p| p.recovery_members)
            .unwrap_or(quorum.size());

        let mut ranked: Vec<(Hash, MemberIndex)> = quorum
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.valid)
            .map(|(i, _)| {
                let index = i as MemberIndex;
                (self.scorer.member_score(&quorum.quorum_hash, id, index), index)
            })
            .collect();
        ranked.sort();
        ranked.into_iter().take(count).map(|(_, i)| i).collect()
    }
}
