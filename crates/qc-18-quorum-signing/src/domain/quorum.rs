//! Quorum entity
//!
//! A quorum is created once by the DKG and is read-only afterwards. It is
//! identified by the hash of its base block, whose height is aligned to the
//! type's `dkg_interval`.

use super::keys::BlsPublicKey;
use super::types::{Hash, LlmqType, MemberIndex};
use serde::{Deserialize, Serialize};

/// One member of a quorum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumMember {
    /// Masternode registration hash identifying the operator
    pub pro_tx_hash: Hash,
    /// Verification key for this member's sig shares
    pub public_key_share: BlsPublicKey,
    /// False if the member failed the DKG (may not sign)
    pub valid: bool,
}

/// A committed quorum holding shares of one threshold key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    pub llmq_type: LlmqType,
    /// Hash of the quorum base block
    pub quorum_hash: Hash,
    /// Height of the quorum base block
    pub height: u64,
    /// Ordered member list; a member's position is its `MemberIndex`
    pub members: Vec<QuorumMember>,
    /// Aggregate public key of the whole quorum
    pub quorum_public_key: BlsPublicKey,
    /// Minimum number of distinct shares needed to recover
    pub threshold: usize,
}

impl Quorum {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, index: MemberIndex) -> Option<&QuorumMember> {
        self.members.get(index as usize)
    }

    /// Position of a member by its registration hash.
    pub fn member_index(&self, pro_tx_hash: &Hash) -> Option<MemberIndex> {
        self.members
            .iter()
            .position(|m| &m.pro_tx_hash == pro_tx_hash)
            .map(|i| i as MemberIndex)
    }

    pub fn is_member(&self, pro_tx_hash: &Hash) -> bool {
        self.member_index(pro_tx_hash).is_some()
    }

    /// Members that passed the DKG and may contribute shares.
    pub fn is_valid_member(&self, pro_tx_hash: &Hash) -> bool {
        self.members
            .iter()
            .any(|m| &m.pro_tx_hash == pro_tx_hash && m.valid)
    }

    pub fn valid_member_count(&self) -> usize {
        self.members.iter().filter(|m| m.valid).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(n: u8, valid: bool) -> QuorumMember {
        QuorumMember {
            pro_tx_hash: [n; 32],
            public_key_share: BlsPublicKey::new(vec![n; 4]),
            valid,
        }
    }

    #[test]
    fn test_member_lookup() {
        let quorum = Quorum {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [7u8; 32],
            height: 24,
            members: vec![member(1, true), member(2, false), member(3, true)],
            quorum_public_key: BlsPublicKey::default(),
            threshold: 2,
        };

        assert_eq!(quorum.size(), 3);
        assert_eq!(quorum.member_index(&[3u8; 32]), Some(2));
        assert_eq!(quorum.member_index(&[9u8; 32]), None);
        assert!(quorum.is_member(&[2u8; 32]));
        assert!(!quorum.is_valid_member(&[2u8; 32]));
        assert_eq!(quorum.valid_member_count(), 2);
        assert!(quorum.member(3).is_none());
    }
}
