//! Recovered signature entity

use super::keys::BlsSignature;
use super::types::{build_sign_hash, sha256d, Hash, LlmqType};
use serde::{Deserialize, Serialize};

/// The aggregated, fully valid quorum signature for one request.
///
/// At most one is authoritative per `(id, msg_hash)`. Several may exist for
/// one `id` under different message hashes, which is the conflict condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredSignature {
    pub llmq_type: LlmqType,
    pub quorum_hash: Hash,
    pub id: Hash,
    pub msg_hash: Hash,
    pub signature: BlsSignature,
    /// Local time (seconds) this node first stored the signature
    pub first_seen: u64,
}

impl RecoveredSignature {
    pub fn sign_hash(&self) -> Hash {
        build_sign_hash(self.llmq_type, &self.quorum_hash, &self.id, &self.msg_hash)
    }

    /// Content address; independent of `first_seen`.
    pub fn content_hash(&self) -> Hash {
        sha256d(&[
            &[self.llmq_type.as_u8()],
            &self.quorum_hash,
            &self.id,
            &self.msg_hash,
            self.signature.as_bytes(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_ignores_first_seen() {
        let a = RecoveredSignature {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [1u8; 32],
            id: [2u8; 32],
            msg_hash: [3u8; 32],
            signature: BlsSignature::new(vec![4u8; 48]),
            first_seen: 10,
        };
        let mut b = a.clone();
        b.first_seen = 99;
        assert_eq!(a.content_hash(), b.content_hash());

        b.msg_hash = [5u8; 32];
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
