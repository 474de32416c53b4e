//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Crypto primitives, chain lookups, peer transport and the clock are all
//! supplied from outside so each can be swapped for a deterministic fake.

use crate::domain::{BlsPublicKey, BlsSignature, Hash, MemberIndex, QuorumMessage, SecretKeyShare};
use crate::error::SigningResult;
use async_trait::async_trait;

/// Threshold signature primitives.
///
/// All signing operates on sign hashes, never raw message hashes.
pub trait ThresholdCrypto: Send + Sync {
    /// Produce this member's share over `sign_hash`.
    fn sign_share(&self, secret: &SecretKeyShare, sign_hash: &Hash) -> SigningResult<BlsSignature>;

    /// Check a share against the claimed member's public key share.
    fn verify_share(&self, public_share: &BlsPublicKey, sign_hash: &Hash, signature: &BlsSignature)
        -> bool;

    /// Combine member shares into the quorum signature.
    ///
    /// The result depends only on the set of `(member, share)` pairs.
    fn recover(&self, shares: &[(MemberIndex, BlsSignature)]) -> SigningResult<BlsSignature>;

    /// Check a recovered signature against the quorum's aggregate key.
    fn verify_aggregate(
        &self,
        quorum_public_key: &BlsPublicKey,
        sign_hash: &Hash,
        signature: &BlsSignature,
    ) -> bool;
}

/// Key material for one quorum, as the DKG would hand it out.
#[derive(Clone, Debug)]
pub struct DealtKeys {
    pub quorum_public_key: BlsPublicKey,
    /// Per member, in member order
    pub public_key_shares: Vec<BlsPublicKey>,
    pub secret_key_shares: Vec<SecretKeyShare>,
}

/// Stand-in for the DKG: deals threshold keys for simulations and tests.
pub trait KeyDealer {
    fn deal(&self, threshold: usize, size: usize, seed: [u8; 32]) -> SigningResult<DealtKeys>;
}

/// Block height/hash lookups.
pub trait ChainIndex: Send + Sync {
    fn tip_height(&self) -> u64;

    fn height_of(&self, block_hash: &Hash) -> Option<u64>;

    fn hash_of(&self, height: u64) -> Option<Hash>;
}

/// Reliable delivery to an already-connected peer.
#[async_trait]
pub trait ShareTransport: Send + Sync {
    /// Send `message` to the member identified by `to` (its registration hash).
    async fn send(&self, to: &Hash, message: QuorumMessage) -> SigningResult<()>;
}

/// Time source for expiry and timeouts.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current time in seconds.
    fn now(&self) -> u64;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
