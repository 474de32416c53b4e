//! # BLS Threshold Crypto (BLS12-381)
//!
//! Shamir-shared BLS keys over the scalar field with Lagrange recovery in G1.
//!
//! ## Implementation Details
//!
//! - Signatures are on G1 (48 bytes compressed)
//! - Public keys are on G2 (96 bytes compressed)
//! - Member `i` holds the polynomial evaluated at `x = i + 1`
//!
//! Recovery computes `sig = Σ λ_i · sig_i` with
//! `λ_i = Π_{j≠i} x_j / (x_j - x_i)`, which equals the signature of the
//! polynomial's constant term. Any threshold-sized subset yields the same
//! bytes, so nodes that picked the same subset agree bit for bit.
//!
//! Uses blst's `min_sig` variant; field and point arithmetic go through the
//! raw blst bindings.

use crate::domain::{BlsPublicKey, BlsSignature, Hash, MemberIndex, SecretKeyShare};
use crate::error::{SigningError, SigningResult};
use crate::ports::{DealtKeys, KeyDealer, ThresholdCrypto};
use blst::min_sig::{PublicKey, SecretKey, Signature};
use blst::{blst_fr, blst_p1, blst_p1_affine, blst_scalar, BLST_ERROR};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Domain separation tag (hash-to-G1, proof-of-possession scheme)
const DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed G1 point size
const SIGNATURE_LEN: usize = 48;

fn crypto_err(context: &str, err: BLST_ERROR) -> SigningError {
    SigningError::Crypto {
        reason: format!("{}: {:?}", context, err),
    }
}

fn fr_from_u64(value: u64) -> blst_fr {
    let limbs = [value, 0, 0, 0];
    let mut out = blst_fr::default();
    unsafe { blst::blst_fr_from_uint64(&mut out, limbs.as_ptr()) };
    out
}

fn fr_mul(a: &blst_fr, b: &blst_fr) -> blst_fr {
    let mut out = blst_fr::default();
    unsafe { blst::blst_fr_mul(&mut out, a, b) };
    out
}

fn fr_add(a: &blst_fr, b: &blst_fr) -> blst_fr {
    let mut out = blst_fr::default();
    unsafe { blst::blst_fr_add(&mut out, a, b) };
    out
}

fn fr_sub(a: &blst_fr, b: &blst_fr) -> blst_fr {
    let mut out = blst_fr::default();
    unsafe { blst::blst_fr_sub(&mut out, a, b) };
    out
}

fn fr_inverse(a: &blst_fr) -> blst_fr {
    let mut out = blst_fr::default();
    unsafe { blst::blst_fr_inverse(&mut out, a) };
    out
}

fn fr_from_secret(sk: &SecretKey) -> blst_fr {
    let bytes = sk.to_bytes();
    let mut scalar = blst_scalar::default();
    let mut out = blst_fr::default();
    unsafe {
        blst::blst_scalar_from_bendian(&mut scalar, bytes.as_ptr());
        blst::blst_fr_from_scalar(&mut out, &scalar);
    }
    out
}

fn secret_from_fr(value: &blst_fr) -> SigningResult<SecretKey> {
    let mut scalar = blst_scalar::default();
    let mut bytes = [0u8; 32];
    unsafe {
        blst::blst_scalar_from_fr(&mut scalar, value);
        blst::blst_bendian_from_scalar(bytes.as_mut_ptr(), &scalar);
    }
    SecretKey::from_bytes(&bytes).map_err(|e| crypto_err("derived key share", e))
}

/// `λ_i` for interpolation at zero over the points `xs`.
fn lagrange_at_zero(xs: &[u64], i: usize) -> SigningResult<blst_scalar> {
    let x_i = fr_from_u64(xs[i]);
    let mut numerator = fr_from_u64(1);
    let mut denominator = fr_from_u64(1);

    for (j, &x) in xs.iter().enumerate() {
        if j == i {
            continue;
        }
        if x == xs[i] {
            return Err(SigningError::Crypto {
                reason: format!("duplicate share for member {}", x - 1),
            });
        }
        let x_j = fr_from_u64(x);
        numerator = fr_mul(&numerator, &x_j);
        denominator = fr_mul(&denominator, &fr_sub(&x_j, &x_i));
    }

    let lambda = fr_mul(&numerator, &fr_inverse(&denominator));
    let mut scalar = blst_scalar::default();
    unsafe { blst::blst_scalar_from_fr(&mut scalar, &lambda) };
    Ok(scalar)
}

fn parse_signature(signature: &BlsSignature) -> Option<Signature> {
    Signature::from_bytes(signature.as_bytes()).ok()
}

fn parse_public_key(key: &BlsPublicKey) -> Option<PublicKey> {
    PublicKey::from_bytes(key.as_bytes()).ok()
}

fn verify(public_key: &BlsPublicKey, sign_hash: &Hash, signature: &BlsSignature) -> bool {
    let (Some(sig), Some(pk)) = (parse_signature(signature), parse_public_key(public_key)) else {
        return false;
    };
    sig.verify(true, sign_hash, DST, &[], &pk, true) == BLST_ERROR::BLST_SUCCESS
}

/// Real pairing-based threshold scheme.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlsThresholdCrypto;

impl BlsThresholdCrypto {
    pub fn new() -> Self {
        Self
    }
}

impl ThresholdCrypto for BlsThresholdCrypto {
    fn sign_share(&self, secret: &SecretKeyShare, sign_hash: &Hash) -> SigningResult<BlsSignature> {
        let sk = SecretKey::from_bytes(secret.as_bytes()).map_err(|e| crypto_err("secret key share", e))?;
        Ok(BlsSignature::new(sk.sign(sign_hash, DST, &[]).to_bytes().to_vec()))
    }

    fn verify_share(
        &self,
        public_share: &BlsPublicKey,
        sign_hash: &Hash,
        signature: &BlsSignature,
    ) -> bool {
        verify(public_share, sign_hash, signature)
    }

    fn recover(&self, shares: &[(MemberIndex, BlsSignature)]) -> SigningResult<BlsSignature> {
        if shares.is_empty() {
            return Err(SigningError::Crypto {
                reason: "no shares to recover from".to_string(),
            });
        }

        let xs: Vec<u64> = shares.iter().map(|(m, _)| *m as u64 + 1).collect();
        let mut acc: Option<blst_p1> = None;

        for (i, (member, signature)) in shares.iter().enumerate() {
            let sig = parse_signature(signature).ok_or_else(|| SigningError::Crypto {
                reason: format!("malformed share from member {}", member),
            })?;
            let compressed: [u8; SIGNATURE_LEN] = sig.to_bytes();
            let lambda = lagrange_at_zero(&xs, i)?;

            let mut affine = blst_p1_affine::default();
            let mut point = blst_p1::default();
            let mut term = blst_p1::default();
            unsafe {
                let rc = blst::blst_p1_uncompress(&mut affine, compressed.as_ptr());
                if rc != BLST_ERROR::BLST_SUCCESS {
                    return Err(crypto_err("share point", rc));
                }
                blst::blst_p1_from_affine(&mut point, &affine);
                blst::blst_p1_mult(&mut term, &point, lambda.b.as_ptr(), 255);
            }

            acc = Some(match acc {
                None => term,
                Some(sum) => {
                    let mut out = blst_p1::default();
                    unsafe { blst::blst_p1_add_or_double(&mut out, &sum, &term) };
                    out
                }
            });
        }

        let mut out = [0u8; SIGNATURE_LEN];
        if let Some(sum) = acc {
            unsafe { blst::blst_p1_compress(out.as_mut_ptr(), &sum) };
        }
        Ok(BlsSignature::new(out.to_vec()))
    }

    fn verify_aggregate(
        &self,
        quorum_public_key: &BlsPublicKey,
        sign_hash: &Hash,
        signature: &BlsSignature,
    ) -> bool {
        verify(quorum_public_key, sign_hash, signature)
    }
}

impl KeyDealer for BlsThresholdCrypto {
    /// Trusted-dealer Shamir sharing of a fresh BLS key, reproducible from
    /// `seed`.
    fn deal(&self, threshold: usize, size: usize, seed: [u8; 32]) -> SigningResult<DealtKeys> {
        if threshold == 0 || threshold > size {
            return Err(SigningError::Crypto {
                reason: format!("invalid threshold {} for {} members", threshold, size),
            });
        }

        let mut rng = StdRng::from_seed(seed);
        let mut coefficients = Vec::with_capacity(threshold);
        let mut master = None;
        for k in 0..threshold {
            let mut ikm = [0u8; 32];
            rng.fill_bytes(&mut ikm);
            let sk = SecretKey::key_gen(&ikm, &[]).map_err(|e| crypto_err("key generation", e))?;
            coefficients.push(fr_from_secret(&sk));
            if k == 0 {
                master = Some(sk);
            }
        }
        let quorum_public_key = master
            .map(|sk| BlsPublicKey::new(sk.sk_to_pk().to_bytes().to_vec()))
            .unwrap_or_default();

        let mut public_key_shares = Vec::with_capacity(size);
        let mut secret_key_shares = Vec::with_capacity(size);
        for member in 0..size {
            let x = fr_from_u64(member as u64 + 1);
            let mut y = coefficients[threshold - 1];
            for c in coefficients[..threshold - 1].iter().rev() {
                y = fr_add(&fr_mul(&y, &x), c);
            }

            let sk = secret_from_fr(&y)?;
            public_key_shares.push(BlsPublicKey::new(sk.sk_to_pk().to_bytes().to_vec()));
            secret_key_shares.push(SecretKeyShare::new(sk.to_bytes().to_vec()));
        }

        Ok(DealtKeys {
            quorum_public_key,
            public_key_shares,
            secret_key_shares,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_all(crypto: &BlsThresholdCrypto, keys: &DealtKeys, hash: &Hash) -> Vec<(MemberIndex, BlsSignature)> {
        keys.secret_key_shares
            .iter()
            .enumerate()
            .map(|(i, sk)| (i as MemberIndex, crypto.sign_share(sk, hash).unwrap()))
            .collect()
    }

    #[test]
    fn test_share_verifies_against_own_key_only() {
        let crypto = BlsThresholdCrypto::new();
        let keys = crypto.deal(3, 5, [1u8; 32]).unwrap();
        let hash = [9u8; 32];
        let shares = sign_all(&crypto, &keys, &hash);

        assert!(crypto.verify_share(&keys.public_key_shares[0], &hash, &shares[0].1));
        assert!(!crypto.verify_share(&keys.public_key_shares[1], &hash, &shares[0].1));
        assert!(!crypto.verify_share(&keys.public_key_shares[0], &[8u8; 32], &shares[0].1));
    }

    #[test]
    fn test_any_threshold_subset_recovers_same_signature() {
        let crypto = BlsThresholdCrypto::new();
        let keys = crypto.deal(3, 5, [2u8; 32]).unwrap();
        let hash = [7u8; 32];
        let shares = sign_all(&crypto, &keys, &hash);

        let a = crypto
            .recover(&[shares[0].clone(), shares[1].clone(), shares[2].clone()])
            .unwrap();
        let b = crypto
            .recover(&[shares[4].clone(), shares[1].clone(), shares[3].clone()])
            .unwrap();

        assert_eq!(a, b);
        assert!(crypto.verify_aggregate(&keys.quorum_public_key, &hash, &a));
        assert!(!crypto.verify_aggregate(&keys.quorum_public_key, &[6u8; 32], &a));
    }

    #[test]
    fn test_below_threshold_does_not_verify() {
        let crypto = BlsThresholdCrypto::new();
        let keys = crypto.deal(3, 5, [3u8; 32]).unwrap();
        let hash = [7u8; 32];
        let shares = sign_all(&crypto, &keys, &hash);

        let partial = crypto.recover(&shares[..2]).unwrap();
        assert!(!crypto.verify_aggregate(&keys.quorum_public_key, &hash, &partial));
    }

    #[test]
    fn test_deal_is_reproducible() {
        let crypto = BlsThresholdCrypto::new();
        let a = crypto.deal(2, 3, [4u8; 32]).unwrap();
        let b = crypto.deal(2, 3, [4u8; 32]).unwrap();
        assert_eq!(a.quorum_public_key, b.quorum_public_key);
        assert_eq!(a.public_key_shares, b.public_key_shares);

        assert!(crypto.deal(4, 3, [4u8; 32]).is_err());
    }

    #[test]
    fn test_recover_rejects_garbage() {
        let crypto = BlsThresholdCrypto::new();
        assert!(crypto.recover(&[]).is_err());
        assert!(crypto
            .recover(&[(0, BlsSignature::new(vec![1u8; 10]))])
            .is_err());
    }
}
