//! Signing session state machine
//!
//! ```text
//! [Collecting] ──|shares| >= threshold──→ [Recovered]
//!      │
//!      └──────────idle timeout─────────→ [Expired]
//! ```
//!
//! No transition leaves `Recovered` or `Expired`; such sessions are deleted.
//! Shares are keyed by member index, so arrival order never matters and
//! duplicates cannot inflate the count.

use super::keys::BlsSignature;
use super::sig_share::{SessionKey, SigShare};
use super::types::MemberIndex;
use std::collections::BTreeMap;

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Collecting,
    Recovered,
    Expired,
}

/// Outcome of offering a (pre-verified) share to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareInsert {
    /// New member share recorded
    Inserted { collected: usize },
    /// Same member, same content
    Duplicate,
    /// Same member, different content; the first share is kept
    Equivocation { existing: BlsSignature },
    /// Session no longer collecting
    Closed(SessionStatus),
}

/// Per-request share accumulator.
#[derive(Debug)]
pub struct SigningSession {
    key: SessionKey,
    threshold: usize,
    status: SessionStatus,
    /// Ordered by member index so the recovery subset is deterministic
    shares: BTreeMap<MemberIndex, SigShare>,
    created_at: u64,
    last_activity: u64,
}

impl SigningSession {
    pub fn new(key: SessionKey, threshold: usize, now: u64) -> Self {
        Self {
            key,
            threshold,
            status: SessionStatus::Collecting,
            shares: BTreeMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn collected(&self) -> usize {
        self.shares.len()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Record a share that already passed signature verification.
    ///
    /// First-seen wins on equivocation.
    pub fn add_share(&mut self, share: SigShare, now: u64) -> ShareInsert {
        if self.status != SessionStatus::Collecting {
            return ShareInsert::Closed(self.status);
        }

        if let Some(existing) = self.shares.get(&share.quorum_member) {
            if existing.signature == share.signature {
                return ShareInsert::Duplicate;
            }
            return ShareInsert::Equivocation {
                existing: existing.signature.clone(),
            };
        }

        self.shares.insert(share.quorum_member, share);
        self.last_activity = now;
        ShareInsert::Inserted {
            collected: self.shares.len(),
        }
    }

    pub fn has_threshold(&self) -> bool {
        self.shares.len() >= self.threshold
    }

    /// The threshold-sized subset with the smallest member indices.
    ///
    /// `None` until the threshold is reached.
    pub fn recovery_set(&self) -> Option<Vec<SigShare>> {
        if !self.has_threshold() {
            return None;
        }
        Some(self.shares.values().take(self.threshold).cloned().collect())
    }

    pub fn mark_recovered(&mut self) {
        if self.status == SessionStatus::Collecting {
            self.status = SessionStatus::Recovered;
        }
    }

    /// Expire the session if it has been idle longer than `timeout_secs`.
    pub fn expire_if_idle(&mut self, now: u64, timeout_secs: u64) -> bool {
        if self.status == SessionStatus::Collecting
            && now.saturating_sub(self.last_activity) > timeout_secs
        {
            self.status = SessionStatus::Expired;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LlmqType;

    fn key() -> SessionKey {
        SessionKey {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [1u8; 32],
            id: [2u8; 32],
            msg_hash: [3u8; 32],
        }
    }

    fn share(member: MemberIndex, tag: u8) -> SigShare {
        let key = key();
        SigShare {
            llmq_type: key.llmq_type,
            quorum_hash: key.quorum_hash,
            quorum_member: member,
            id: key.id,
            msg_hash: key.msg_hash,
            signature: BlsSignature::new(vec![tag; 8]),
        }
    }

    #[test]
    fn test_duplicates_do_not_count() {
        let mut session = SigningSession::new(key(), 3, 0);

        assert_eq!(
            session.add_share(share(0, 1), 1),
            ShareInsert::Inserted { collected: 1 }
        );
        assert_eq!(session.add_share(share(0, 1), 2), ShareInsert::Duplicate);
        assert_eq!(session.collected(), 1);
        assert!(!session.has_threshold());
    }

    #[test]
    fn test_equivocation_keeps_first_share() {
        let mut session = SigningSession::new(key(), 3, 0);
        session.add_share(share(2, 1), 1);

        let outcome = session.add_share(share(2, 7), 2);
        assert_eq!(
            outcome,
            ShareInsert::Equivocation {
                existing: BlsSignature::new(vec![1; 8])
            }
        );
        assert_eq!(session.collected(), 1);

        session.add_share(share(0, 5), 3);
        session.add_share(share(1, 5), 4);
        let set = session.recovery_set().unwrap();
        assert_eq!(set[2].quorum_member, 2);
        assert_eq!(set[2].signature, BlsSignature::new(vec![1; 8]));
    }

    #[test]
    fn test_recovery_set_uses_smallest_indices() {
        let mut session = SigningSession::new(key(), 3, 0);
        for member in [4, 1, 3, 0] {
            session.add_share(share(member, member as u8), 1);
        }

        let set = session.recovery_set().unwrap();
        let members: Vec<MemberIndex> = set.iter().map(|s| s.quorum_member).collect();
        assert_eq!(members, vec![0, 1, 3]);
    }

    #[test]
    fn test_recovery_set_independent_of_arrival_order() {
        let mut a = SigningSession::new(key(), 2, 0);
        let mut b = SigningSession::new(key(), 2, 0);
        for member in [0, 1, 2] {
            a.add_share(share(member, 10 + member as u8), 1);
        }
        for member in [2, 1, 0] {
            b.add_share(share(member, 10 + member as u8), 1);
        }
        assert_eq!(a.recovery_set(), b.recovery_set());
    }

    #[test]
    fn test_closed_after_recovery() {
        let mut session = SigningSession::new(key(), 1, 0);
        session.add_share(share(0, 1), 1);
        session.mark_recovered();

        assert_eq!(session.status(), SessionStatus::Recovered);
        assert_eq!(
            session.add_share(share(1, 1), 2),
            ShareInsert::Closed(SessionStatus::Recovered)
        );
        assert!(!session.expire_if_idle(1_000, 10));
    }

    #[test]
    fn test_idle_expiry() {
        let mut session = SigningSession::new(key(), 3, 100);
        session.add_share(share(0, 1), 105);

        assert!(!session.expire_if_idle(160, 60));
        assert!(session.expire_if_idle(166, 60));
        assert_eq!(session.status(), SessionStatus::Expired);
    }
}
