//! Core identifiers and LLMQ parameters
//!
//! Hashes are raw 32-byte values. Everything a quorum member signs is a
//! *sign hash* that binds the quorum, the request id and the message hash
//! together, so a signature can never be replayed against another quorum.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte hash (request ids, message hashes, quorum hashes, member ids).
pub type Hash = [u8; 32];

/// Index of a member inside a quorum's ordered member list.
pub type MemberIndex = u16;

/// Double SHA-256 over the concatenation of `parts`.
pub fn sha256d(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let first = hasher.finalize();
    Sha256::digest(first).into()
}

/// Short hex prefix used in log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

/// Build the hash that quorum members actually sign.
///
/// `SHA256d(llmq_type || quorum_hash || id || msg_hash)`
pub fn build_sign_hash(llmq_type: LlmqType, quorum_hash: &Hash, id: &Hash, msg_hash: &Hash) -> Hash {
    sha256d(&[&[llmq_type.as_u8()], quorum_hash, id, msg_hash])
}

/// Long-living masternode quorum type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LlmqType {
    /// 400 members, 240 threshold, one DKG every 12 hours
    Llmq400_60,
    /// Small quorums for regtest and unit tests
    LlmqTest,
}

impl LlmqType {
    pub fn as_u8(self) -> u8 {
        match self {
            LlmqType::Llmq400_60 => 2,
            LlmqType::LlmqTest => 100,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(LlmqType::Llmq400_60),
            100 => Some(LlmqType::LlmqTest),
            _ => None,
        }
    }

    /// Built-in consensus parameters for this type.
    pub fn default_params(self) -> LlmqParams {
        match self {
            LlmqType::Llmq400_60 => LlmqParams {
                llmq_type: self,
                size: 400,
                threshold: 240,
                dkg_interval: 24 * 12,
                signing_active_quorum_count: 4,
                recovery_members: 100,
            },
            LlmqType::LlmqTest => LlmqParams {
                llmq_type: self,
                size: 3,
                threshold: 2,
                dkg_interval: 24,
                signing_active_quorum_count: 4,
                recovery_members: 3,
            },
        }
    }
}

impl fmt::Display for LlmqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmqType::Llmq400_60 => write!(f, "llmq_400_60"),
            LlmqType::LlmqTest => write!(f, "llmq_test"),
        }
    }
}

/// Consensus parameters of one LLMQ type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmqParams {
    pub llmq_type: LlmqType,
    /// Members per quorum
    pub size: usize,
    /// Minimum distinct valid shares needed to recover
    pub threshold: usize,
    /// Blocks between two DKG rounds (quorum base blocks are aligned to it)
    pub dkg_interval: u64,
    /// Number of most recent quorums eligible for new signing requests
    pub signing_active_quorum_count: usize,
    /// Members designated to receive the threshold-completing share set
    pub recovery_members: usize,
}

/// The logical key of one signing task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningRequest {
    pub llmq_type: LlmqType,
    pub id: Hash,
    pub msg_hash: Hash,
}

impl SigningRequest {
    pub fn new(llmq_type: LlmqType, id: Hash, msg_hash: Hash) -> Self {
        Self {
            llmq_type,
            id,
            msg_hash,
        }
    }
}
