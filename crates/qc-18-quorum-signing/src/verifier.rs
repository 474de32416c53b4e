//! # Verifier
//!
//! Checks a recovered signature against the quorum that must have produced
//! it. Resolution order:
//!
//! 1. explicit quorum hash, used as is
//! 2. explicit sign height, selecting among the quorums active at that height
//! 3. the live active set
//!
//! For 2 and 3 the previous active set (one `dkg_interval` earlier) is tried
//! as well, so a signature made just before a rotation still verifies.

use crate::domain::{build_sign_hash, short_hex, Quorum, QuorumSelector, QuorumTracker};
use crate::error::{SigningError, SigningResult};
use crate::ports::{ChainIndex, ThresholdCrypto, VerifyRequest};
use std::sync::Arc;
use tracing::debug;

pub struct Verifier<C: ThresholdCrypto, K: ChainIndex> {
    tracker: Arc<QuorumTracker>,
    selector: Arc<QuorumSelector>,
    crypto: Arc<C>,
    chain: Arc<K>,
}

impl<C: ThresholdCrypto, K: ChainIndex> Verifier<C, K> {
    pub fn new(
        tracker: Arc<QuorumTracker>,
        selector: Arc<QuorumSelector>,
        crypto: Arc<C>,
        chain: Arc<K>,
    ) -> Self {
        Self {
            tracker,
            selector,
            crypto,
            chain,
        }
    }

    pub fn verify(&self, request: &VerifyRequest) -> SigningResult<bool> {
        let params = self
            .tracker
            .params(request.llmq_type)
            .ok_or(SigningError::UnknownLlmqType {
                llmq_type: request.llmq_type,
            })?;

        if let Some(quorum_hash) = request.quorum_hash {
            let quorum = self
                .tracker
                .quorum_by_hash(request.llmq_type, &quorum_hash)
                .ok_or(SigningError::QuorumNotFound { quorum_hash })?;
            return Ok(self.check(&quorum, request));
        }

        let tip = self.chain.tip_height();
        let sign_height = request.sign_height.unwrap_or(tip);
        if sign_height > tip {
            debug!(
                "[qc-18] Sign height {} above tip {}, no quorum to verify against",
                sign_height, tip
            );
            return Ok(false);
        }

        let current = match request.sign_height {
            Some(height) => self
                .selector
                .select_at_height(request.llmq_type, &request.id, height),
            None => self
                .selector
                .select_from(&self.tracker.active_quorums(request.llmq_type), &request.id),
        };
        if current.as_deref().is_some_and(|q| self.check(q, request)) {
            return Ok(true);
        }

        let Some(previous_height) = sign_height.checked_sub(params.dkg_interval) else {
            return Ok(false);
        };
        let previous = self
            .selector
            .select_at_height(request.llmq_type, &request.id, previous_height);
        Ok(previous.as_deref().is_some_and(|q| self.check(q, request)))
    }

    fn check(&self, quorum: &Quorum, request: &VerifyRequest) -> bool {
        let sign_hash = build_sign_hash(
            request.llmq_type,
            &quorum.quorum_hash,
            &request.id,
            &request.msg_hash,
        );
        let valid = self
            .crypto
            .verify_aggregate(&quorum.quorum_public_key, &sign_hash, &request.signature);
        debug!(
            "[qc-18] Verify id={} against quorum {}: {}",
            short_hex(&request.id),
            short_hex(&quorum.quorum_hash),
            valid
        );
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FakeThresholdCrypto, InMemoryChainIndex};
    use crate::domain::{BlsSignature, Hash, LlmqType, MemberIndex, QuorumMember};
    use crate::ports::KeyDealer;

    struct Fixture {
        verifier: Verifier<FakeThresholdCrypto, InMemoryChainIndex>,
        tracker: Arc<QuorumTracker>,
        chain: Arc<InMemoryChainIndex>,
        crypto: Arc<FakeThresholdCrypto>,
    }

    fn fixture() -> Fixture {
        let tracker = Arc::new(QuorumTracker::new([LlmqType::LlmqTest.default_params()]));
        let selector = Arc::new(QuorumSelector::new(Arc::clone(&tracker)));
        let crypto = Arc::new(FakeThresholdCrypto::new());
        let chain = Arc::new(InMemoryChainIndex::new());
        let verifier = Verifier::new(
            Arc::clone(&tracker),
            selector,
            Arc::clone(&crypto),
            Arc::clone(&chain),
        );
        Fixture {
            verifier,
            tracker,
            chain,
            crypto,
        }
    }

    /// Form a quorum at `height` and return a recovered signature it made.
    fn form_and_sign(f: &Fixture, height: u64, id: &Hash, msg_hash: &Hash) -> (Hash, BlsSignature) {
        f.chain.mine_to(height);
        let quorum_hash = InMemoryChainIndex::block_hash(height);
        let keys = f.crypto.deal(2, 3, quorum_hash).unwrap();
        f.tracker.on_quorum_formed(Quorum {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash,
            height,
            members: keys
                .public_key_shares
                .iter()
                .enumerate()
                .map(|(i, pk)| QuorumMember {
                    pro_tx_hash: [i as u8; 32],
                    public_key_share: pk.clone(),
                    valid: true,
                })
                .collect(),
            quorum_public_key: keys.quorum_public_key.clone(),
            threshold: 2,
        });

        let sign_hash = build_sign_hash(LlmqType::LlmqTest, &quorum_hash, id, msg_hash);
        let shares: Vec<(MemberIndex, BlsSignature)> = keys.secret_key_shares[..2]
            .iter()
            .enumerate()
            .map(|(i, sk)| (i as MemberIndex, f.crypto.sign_share(sk, &sign_hash).unwrap()))
            .collect();
        (quorum_hash, f.crypto.recover(&shares).unwrap())
    }

    #[test]
    fn test_explicit_quorum() {
        let f = fixture();
        let (id, msg) = ([1u8; 32], [2u8; 32]);
        let (q1, sig) = form_and_sign(&f, 24, &id, &msg);
        let (q2, _) = form_and_sign(&f, 48, &id, &msg);

        let request = VerifyRequest::new(LlmqType::LlmqTest, id, msg, sig);
        assert!(f.verifier.verify(&request.clone().with_quorum(q1)).unwrap());
        assert!(!f.verifier.verify(&request.clone().with_quorum(q2)).unwrap());
        assert!(matches!(
            f.verifier.verify(&request.with_quorum([0xee; 32])),
            Err(SigningError::QuorumNotFound { .. })
        ));
    }

    #[test]
    fn test_height_above_tip_is_false() {
        let f = fixture();
        let (id, msg) = ([1u8; 32], [2u8; 32]);
        let (_, sig) = form_and_sign(&f, 24, &id, &msg);

        let request = VerifyRequest::new(LlmqType::LlmqTest, id, msg, sig).at_height(10_000);
        assert!(!f.verifier.verify(&request).unwrap());
    }

    #[test]
    fn test_single_quorum_verifies_implicitly() {
        let f = fixture();
        let (id, msg) = ([1u8; 32], [2u8; 32]);
        let (_, sig) = form_and_sign(&f, 24, &id, &msg);

        let request = VerifyRequest::new(LlmqType::LlmqTest, id, msg, sig);
        assert!(f.verifier.verify(&request).unwrap());
        assert!(f.verifier.verify(&request.clone().at_height(30)).unwrap());
        // before the quorum existed
        assert!(!f.verifier.verify(&request.at_height(10)).unwrap());
    }

    #[test]
    fn test_wrong_message_fails() {
        let f = fixture();
        let (id, msg) = ([1u8; 32], [2u8; 32]);
        let (_, sig) = form_and_sign(&f, 24, &id, &msg);

        let request = VerifyRequest::new(LlmqType::LlmqTest, id, [3u8; 32], sig);
        assert!(!f.verifier.verify(&request).unwrap());
    }
}
