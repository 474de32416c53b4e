//! Deterministic fake threshold scheme for tests
//!
//! Byte-string "signatures" with hash-based rules:
//!
//! ```text
//! quorum key      Q                         32 bytes
//! member key i    Q || i (u16 le)           34 bytes, secret = public
//! share           Q || h || H(key_i || h)   96 bytes
//! recovered       H("recovered" || Q || h)  32 bytes
//! ```
//!
//! The recovered value depends only on the quorum and the sign hash, so any
//! subset of valid shares produces the same bytes.

use crate::domain::{sha256d, BlsPublicKey, BlsSignature, Hash, MemberIndex, SecretKeyShare};
use crate::error::{SigningError, SigningResult};
use crate::ports::{DealtKeys, KeyDealer, ThresholdCrypto};

const SHARE_LEN: usize = 96;

#[derive(Clone, Copy, Debug, Default)]
pub struct FakeThresholdCrypto;

impl FakeThresholdCrypto {
    pub fn new() -> Self {
        Self
    }

    fn recovered(quorum_key: &[u8], sign_hash: &Hash) -> BlsSignature {
        BlsSignature::new(sha256d(&[b"recovered", quorum_key, sign_hash]).to_vec())
    }
}

impl ThresholdCrypto for FakeThresholdCrypto {
    fn sign_share(&self, secret: &SecretKeyShare, sign_hash: &Hash) -> SigningResult<BlsSignature> {
        let key = secret.as_bytes();
        if key.len() != 34 {
            return Err(SigningError::Crypto {
                reason: "malformed fake key share".to_string(),
            });
        }
        let mut sig = Vec::with_capacity(SHARE_LEN);
        sig.extend_from_slice(&key[..32]);
        sig.extend_from_slice(sign_hash);
        sig.extend_from_slice(&sha256d(&[key, sign_hash]));
        Ok(BlsSignature::new(sig))
    }

    fn verify_share(
        &self,
        public_share: &BlsPublicKey,
        sign_hash: &Hash,
        signature: &BlsSignature,
    ) -> bool {
        let key = public_share.as_bytes();
        let sig = signature.as_bytes();
        key.len() == 34
            && sig.len() == SHARE_LEN
            && sig[..32] == key[..32]
            && sig[32..64] == sign_hash[..]
            && sig[64..] == sha256d(&[key, sign_hash])[..]
    }

    fn recover(&self, shares: &[(MemberIndex, BlsSignature)]) -> SigningResult<BlsSignature> {
        let (_, first) = shares.first().ok_or_else(|| SigningError::Crypto {
            reason: "no shares to recover from".to_string(),
        })?;
        let prefix = first.as_bytes();
        if prefix.len() != SHARE_LEN
            || shares
                .iter()
                .any(|(_, s)| s.as_bytes().len() != SHARE_LEN || s.as_bytes()[..64] != prefix[..64])
        {
            return Err(SigningError::Crypto {
                reason: "shares do not belong to one quorum and message".to_string(),
            });
        }

        let mut sign_hash = [0u8; 32];
        sign_hash.copy_from_slice(&prefix[32..64]);
        Ok(Self::recovered(&prefix[..32], &sign_hash))
    }

    fn verify_aggregate(
        &self,
        quorum_public_key: &BlsPublicKey,
        sign_hash: &Hash,
        signature: &BlsSignature,
    ) -> bool {
        *signature == Self::recovered(quorum_public_key.as_bytes(), sign_hash)
    }
}

impl KeyDealer for FakeThresholdCrypto {
    fn deal(&self, threshold: usize, size: usize, seed: [u8; 32]) -> SigningResult<DealtKeys> {
        if threshold == 0 || threshold > size {
            return Err(SigningError::Crypto {
                reason: format!("invalid threshold {} for {} members", threshold, size),
            });
        }

        let quorum_key = sha256d(&[b"fake-quorum", &seed]);
        let member_keys: Vec<Vec<u8>> = (0..size as MemberIndex)
            .map(|i| [&quorum_key[..], &i.to_le_bytes()[..]].concat())
            .collect();

        Ok(DealtKeys {
            quorum_public_key: BlsPublicKey::new(quorum_key.to_vec()),
            public_key_shares: member_keys.iter().cloned().map(BlsPublicKey::new).collect(),
            secret_key_shares: member_keys.into_iter().map(SecretKeyShare::new).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_rules() {
        let crypto = FakeThresholdCrypto::new();
        let keys = crypto.deal(2, 3, [1u8; 32]).unwrap();
        let hash = [5u8; 32];

        let share = crypto.sign_share(&keys.secret_key_shares[1], &hash).unwrap();
        assert!(crypto.verify_share(&keys.public_key_shares[1], &hash, &share));
        assert!(!crypto.verify_share(&keys.public_key_shares[0], &hash, &share));
        assert!(!crypto.verify_share(&keys.public_key_shares[1], &[6u8; 32], &share));
    }

    #[test]
    fn test_recovered_is_subset_independent() {
        let crypto = FakeThresholdCrypto::new();
        let keys = crypto.deal(2, 3, [1u8; 32]).unwrap();
        let hash = [5u8; 32];
        let shares: Vec<(MemberIndex, BlsSignature)> = keys
            .secret_key_shares
            .iter()
            .enumerate()
            .map(|(i, sk)| (i as MemberIndex, crypto.sign_share(sk, &hash).unwrap()))
            .collect();

        let a = crypto.recover(&shares[..2]).unwrap();
        let b = crypto.recover(&shares[1..]).unwrap();
        assert_eq!(a, b);
        assert!(crypto.verify_aggregate(&keys.quorum_public_key, &hash, &a));

        let other = crypto.deal(2, 3, [2u8; 32]).unwrap();
        assert!(!crypto.verify_aggregate(&other.quorum_public_key, &hash, &a));
    }

    #[test]
    fn test_recover_rejects_mixed_messages() {
        let crypto = FakeThresholdCrypto::new();
        let keys = crypto.deal(2, 3, [1u8; 32]).unwrap();
        let a = crypto.sign_share(&keys.secret_key_shares[0], &[1u8; 32]).unwrap();
        let b = crypto.sign_share(&keys.secret_key_shares[1], &[2u8; 32]).unwrap();

        assert!(crypto.recover(&[(0, a), (1, b)]).is_err());
    }
}
