//! Sig shares and the quorum wire messages
//!
//! A sig share is one member's partial signature over a sign hash. Shares are
//! idempotent under retransmission: one member produces exactly one share per
//! `(quorum_hash, id, msg_hash)`.

use super::keys::BlsSignature;
use super::recovered::RecoveredSignature;
use super::types::{build_sign_hash, Hash, LlmqType, MemberIndex};
use crate::error::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};

/// Key of one signing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub llmq_type: LlmqType,
    pub quorum_hash: Hash,
    pub id: Hash,
    pub msg_hash: Hash,
}

impl SessionKey {
    pub fn sign_hash(&self) -> Hash {
        build_sign_hash(self.llmq_type, &self.quorum_hash, &self.id, &self.msg_hash)
    }
}

/// A member's partial signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigShare {
    pub llmq_type: LlmqType,
    pub quorum_hash: Hash,
    pub quorum_member: MemberIndex,
    pub id: Hash,
    pub msg_hash: Hash,
    pub signature: BlsSignature,
}

impl SigShare {
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            llmq_type: self.llmq_type,
            quorum_hash: self.quorum_hash,
            id: self.id,
            msg_hash: self.msg_hash,
        }
    }

    pub fn sign_hash(&self) -> Hash {
        build_sign_hash(self.llmq_type, &self.quorum_hash, &self.id, &self.msg_hash)
    }
}

/// Inbound/outbound form of a sig share.
///
/// Carries the LLMQ type: quorums of different types formed on the same base
/// block share a quorum hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigShareMessage {
    pub llmq_type: LlmqType,
    pub quorum_hash: Hash,
    pub quorum_member: MemberIndex,
    pub id: Hash,
    pub msg_hash: Hash,
    pub signature: BlsSignature,
}

impl SigShareMessage {
    pub fn into_share(self) -> SigShare {
        SigShare {
            llmq_type: self.llmq_type,
            quorum_hash: self.quorum_hash,
            quorum_member: self.quorum_member,
            id: self.id,
            msg_hash: self.msg_hash,
            signature: self.signature,
        }
    }
}

impl From<&SigShare> for SigShareMessage {
    fn from(share: &SigShare) -> Self {
        Self {
            llmq_type: share.llmq_type,
            quorum_hash: share.quorum_hash,
            quorum_member: share.quorum_member,
            id: share.id,
            msg_hash: share.msg_hash,
            signature: share.signature.clone(),
        }
    }
}

/// Relay form of a recovered signature. The receiver stamps its own
/// first-seen time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredSigMessage {
    pub llmq_type: LlmqType,
    pub quorum_hash: Hash,
    pub id: Hash,
    pub msg_hash: Hash,
    pub signature: BlsSignature,
}

impl From<&RecoveredSignature> for RecoveredSigMessage {
    fn from(sig: &RecoveredSignature) -> Self {
        Self {
            llmq_type: sig.llmq_type,
            quorum_hash: sig.quorum_hash,
            id: sig.id,
            msg_hash: sig.msg_hash,
            signature: sig.signature.clone(),
        }
    }
}

/// Everything exchanged between quorum members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuorumMessage {
    SigShares(Vec<SigShareMessage>),
    RecoveredSig(RecoveredSigMessage),
}

impl QuorumMessage {
    pub fn encode(&self) -> SigningResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SigningError::Codec {
            reason: e.to_string(),
        })
    }

    pub fn decode(bytes: &[u8]) -> SigningResult<Self> {
        bincode::deserialize(bytes).map_err(|e| SigningError::Codec {
            reason: e.to_string(),
        })
    }
}
