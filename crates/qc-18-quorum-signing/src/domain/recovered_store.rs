//! # Recovered Signature Store
//!
//! Content-addressed cache of recovered signatures with a conflict index and
//! retention-based expiry, plus the node's own signing votes.
//!
//! ## Conflict semantics
//!
//! `(id, msg_hash)` is conflicting iff a recovered signature exists for `id`
//! under some other message hash. Whether `(id, msg_hash)` itself recovered
//! does not matter. Both entries are retained; the flag clears once the other
//! entries expire.
//!
//! ## Expiry
//!
//! An entry is removed once `now - first_seen > retention`. Sweeps run on a
//! fixed cadence driven by the service, never inside `store`.

use super::recovered::RecoveredSignature;
use super::types::Hash;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Outcome of [`RecoveredSignatureStore::store`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// First entry for `(id, msg_hash)`. `conflicting` is true if another
    /// message hash already recovered for the same id.
    Accepted { conflicting: bool },
    /// An entry for `(id, msg_hash)` already existed; nothing changed
    Duplicate,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<(Hash, Hash), RecoveredSignature>,
    /// id -> message hashes recovered under it
    conflicts: HashMap<Hash, BTreeSet<Hash>>,
    /// content hash -> (id, msg_hash)
    by_content: HashMap<Hash, (Hash, Hash)>,
}

impl StoreInner {
    fn remove(&mut self, key: &(Hash, Hash)) -> Option<RecoveredSignature> {
        let sig = self.entries.remove(key)?;
        self.by_content.remove(&sig.content_hash());
        if let Some(set) = self.conflicts.get_mut(&key.0) {
            set.remove(&key.1);
            if set.is_empty() {
                self.conflicts.remove(&key.0);
            }
        }
        Some(sig)
    }
}

/// Recovered signatures keyed by `(id, msg_hash)`.
pub struct RecoveredSignatureStore {
    retention_secs: u64,
    inner: RwLock<StoreInner>,
}

impl RecoveredSignatureStore {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            retention_secs,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Insert-or-keep-existing, atomic with respect to `(id, msg_hash)`.
    pub fn store(&self, sig: RecoveredSignature) -> StoreOutcome {
        let key = (sig.id, sig.msg_hash);
        let mut inner = self.inner.write();
        if inner.entries.contains_key(&key) {
            return StoreOutcome::Duplicate;
        }

        let recovered_ids = inner.conflicts.entry(sig.id).or_default();
        let conflicting = !recovered_ids.is_empty();
        recovered_ids.insert(sig.msg_hash);

        inner.by_content.insert(sig.content_hash(), key);
        inner.entries.insert(key, sig);
        StoreOutcome::Accepted { conflicting }
    }

    pub fn get(&self, id: &Hash, msg_hash: &Hash) -> Option<RecoveredSignature> {
        self.inner.read().entries.get(&(*id, *msg_hash)).cloned()
    }

    pub fn get_by_content_hash(&self, content_hash: &Hash) -> Option<RecoveredSignature> {
        let inner = self.inner.read();
        let key = inner.by_content.get(content_hash)?;
        inner.entries.get(key).cloned()
    }

    pub fn has(&self, id: &Hash, msg_hash: &Hash) -> bool {
        self.inner.read().entries.contains_key(&(*id, *msg_hash))
    }

    /// Whether anything recovered for `id`, under any message hash.
    pub fn has_for_id(&self, id: &Hash) -> bool {
        self.inner.read().conflicts.contains_key(id)
    }

    pub fn is_conflicting(&self, id: &Hash, msg_hash: &Hash) -> bool {
        self.inner
            .read()
            .conflicts
            .get(id)
            .is_some_and(|set| set.iter().any(|m| m != msg_hash))
    }

    /// Every message hash recovered for `id`.
    pub fn msg_hashes_for_id(&self, id: &Hash) -> Vec<Hash> {
        self.inner
            .read()
            .conflicts
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry older than the retention window.
    pub fn sweep_expired(&self, now: u64) -> Vec<RecoveredSignature> {
        let mut inner = self.inner.write();
        let expired: Vec<(Hash, Hash)> = inner
            .entries
            .iter()
            .filter(|(_, sig)| now.saturating_sub(sig.first_seen) > self.retention_secs)
            .map(|(key, _)| *key)
            .collect();

        expired.iter().filter_map(|key| inner.remove(key)).collect()
    }
}

/// A vote this node cast for a request id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vote {
    pub msg_hash: Hash,
    pub first_seen: u64,
}

/// Outcome of [`VoteLedger::vote`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote for the id
    Recorded,
    /// Same message hash as the existing vote
    AlreadyCast,
    /// The id was already voted for a different message hash
    Conflicting { prev_msg_hash: Hash },
}

/// The request ids this node has signed, one message hash each.
pub struct VoteLedger {
    retention_secs: u64,
    votes: RwLock<HashMap<Hash, Vote>>,
}

impl VoteLedger {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            retention_secs,
            votes: RwLock::new(HashMap::new()),
        }
    }

    /// Record a vote unless a different message hash was already voted.
    pub fn vote(&self, id: Hash, msg_hash: Hash, now: u64) -> VoteOutcome {
        let mut votes = self.votes.write();
        match votes.get(&id) {
            Some(prev) if prev.msg_hash == msg_hash => VoteOutcome::AlreadyCast,
            Some(prev) => VoteOutcome::Conflicting {
                prev_msg_hash: prev.msg_hash,
            },
            None => {
                votes.insert(
                    id,
                    Vote {
                        msg_hash,
                        first_seen: now,
                    },
                );
                VoteOutcome::Recorded
            }
        }
    }

    pub fn has_voted(&self, id: &Hash) -> bool {
        self.votes.read().contains_key(id)
    }

    pub fn get_vote(&self, id: &Hash) -> Option<Hash> {
        self.votes.read().get(id).map(|v| v.msg_hash)
    }

    pub fn sweep_expired(&self, now: u64) -> usize {
        let mut votes = self.votes.write();
        let before = votes.len();
        votes.retain(|_, v| now.saturating_sub(v.first_seen) <= self.retention_secs);
        before - votes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::BlsSignature;
    use crate::domain::types::LlmqType;

    fn recovered(id: u8, msg: u8, first_seen: u64) -> RecoveredSignature {
        RecoveredSignature {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [1u8; 32],
            id: [id; 32],
            msg_hash: [msg; 32],
            signature: BlsSignature::new(vec![msg; 48]),
            first_seen,
        }
    }

    #[test]
    fn test_store_and_duplicate() {
        let store = RecoveredSignatureStore::new(100);

        assert_eq!(
            store.store(recovered(1, 0xa, 0)),
            StoreOutcome::Accepted { conflicting: false }
        );
        assert_eq!(store.store(recovered(1, 0xa, 5)), StoreOutcome::Duplicate);
        assert_eq!(store.get(&[1u8; 32], &[0xa; 32]).unwrap().first_seen, 0);
        assert!(store.has(&[1u8; 32], &[0xa; 32]));
        assert!(!store.has(&[1u8; 32], &[0xb; 32]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_conflict_flags_both_message_hashes() {
        let store = RecoveredSignatureStore::new(100);
        let (id, a, b, c) = ([1u8; 32], [0xa; 32], [0xb; 32], [0xc; 32]);

        store.store(recovered(1, 0xa, 0));
        assert!(!store.is_conflicting(&id, &a));
        // an unrecovered msg hash already conflicts with the recovered one
        assert!(store.is_conflicting(&id, &c));

        assert_eq!(
            store.store(recovered(1, 0xb, 1)),
            StoreOutcome::Accepted { conflicting: true }
        );
        assert!(store.is_conflicting(&id, &a));
        assert!(store.is_conflicting(&id, &b));
        assert!(store.get(&id, &a).is_some());
        assert!(store.get(&id, &b).is_some());
        assert_eq!(store.msg_hashes_for_id(&id), vec![a, b]);
    }

    #[test]
    fn test_sweep_clears_entries_and_conflicts() {
        let store = RecoveredSignatureStore::new(100);
        let (id, a, b) = ([1u8; 32], [0xa; 32], [0xb; 32]);
        store.store(recovered(1, 0xa, 0));
        store.store(recovered(1, 0xb, 50));

        assert!(store.sweep_expired(100).is_empty());

        let removed = store.sweep_expired(101);
        assert_eq!(removed.len(), 1);
        assert!(!store.has(&id, &a));
        assert!(!store.is_conflicting(&id, &b));
        assert!(store.has_for_id(&id));

        store.sweep_expired(151);
        assert!(!store.has_for_id(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_lookup_by_content_hash() {
        let store = RecoveredSignatureStore::new(100);
        let sig = recovered(3, 0xa, 7);
        let content = sig.content_hash();
        store.store(sig.clone());

        assert_eq!(store.get_by_content_hash(&content), Some(sig));
        store.sweep_expired(1_000);
        assert!(store.get_by_content_hash(&content).is_none());
    }

    #[test]
    fn test_vote_ledger_refuses_conflicting_vote() {
        let ledger = VoteLedger::new(100);
        let id = [1u8; 32];

        assert_eq!(ledger.vote(id, [0xa; 32], 0), VoteOutcome::Recorded);
        assert_eq!(ledger.vote(id, [0xa; 32], 1), VoteOutcome::AlreadyCast);
        assert_eq!(
            ledger.vote(id, [0xb; 32], 2),
            VoteOutcome::Conflicting {
                prev_msg_hash: [0xa; 32]
            }
        );
        assert!(ledger.has_voted(&id));
        assert_eq!(ledger.get_vote(&id), Some([0xa; 32]));
    }

    #[test]
    fn test_vote_ledger_sweep() {
        let ledger = VoteLedger::new(100);
        ledger.vote([1u8; 32], [0xa; 32], 0);
        ledger.vote([2u8; 32], [0xa; 32], 80);

        assert_eq!(ledger.sweep_expired(101), 1);
        assert!(!ledger.has_voted(&[1u8; 32]));
        assert!(ledger.has_voted(&[2u8; 32]));
    }
}
