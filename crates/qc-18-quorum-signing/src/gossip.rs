//! # Share Gossip Router
//!
//! Fans shares and recovered signatures out to quorum members.
//!
//! - Own shares go to every other member of the quorum.
//! - When a session reaches threshold, the completing share set goes to the
//!   recovery members for that request id, so aggregation happens in one
//!   agreed place first.
//! - Recovered signatures are relayed to every other member.
//!
//! Unreachable peers never fail a session: send errors are logged and
//! counted, and the session keeps collecting until it recovers on its own
//! view or times out.

use crate::domain::{
    short_hex, Hash, MemberIndex, Quorum, QuorumMessage, RecoveredSigMessage, RecoveredSignature,
    SigShare, SigShareMessage,
};
use crate::metrics;
use crate::ports::ShareTransport;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ShareGossipRouter<T: ShareTransport> {
    /// This node's registration hash
    node_id: Hash,
    transport: Arc<T>,
}

impl<T: ShareTransport> ShareGossipRouter<T> {
    pub fn new(node_id: Hash, transport: Arc<T>) -> Self {
        Self { node_id, transport }
    }

    /// Send shares to all other members. Returns the number of peers reached.
    pub async fn broadcast_to_quorum_peers(&self, quorum: &Quorum, shares: &[SigShare]) -> usize {
        let peers: Vec<Hash> = quorum
            .members
            .iter()
            .map(|m| m.pro_tx_hash)
            .filter(|p| *p != self.node_id)
            .collect();
        self.send_shares(&peers, shares).await
    }

    /// Push the completing share set to the recovery members.
    pub async fn route_to_recovery_members(
        &self,
        quorum: &Quorum,
        recovery_members: &[MemberIndex],
        shares: &[SigShare],
    ) -> usize {
        let peers: Vec<Hash> = recovery_members
            .iter()
            .filter_map(|&i| quorum.member(i))
            .map(|m| m.pro_tx_hash)
            .filter(|p| *p != self.node_id)
            .collect();
        debug!(
            "[qc-18] Routing {} shares for quorum {} to {} recovery members",
            shares.len(),
            short_hex(&quorum.quorum_hash),
            peers.len()
        );
        self.send_shares(&peers, shares).await
    }

    /// Relay a recovered signature to all other members.
    pub async fn relay_recovered(&self, quorum: &Quorum, sig: &RecoveredSignature) -> usize {
        let message = QuorumMessage::RecoveredSig(RecoveredSigMessage::from(sig));
        let mut reached = 0;
        for member in quorum.members.iter().filter(|m| m.pro_tx_hash != self.node_id) {
            if self.send(&member.pro_tx_hash, message.clone()).await {
                reached += 1;
            }
        }
        reached
    }

    async fn send_shares(&self, peers: &[Hash], shares: &[SigShare]) -> usize {
        if shares.is_empty() {
            return 0;
        }
        let message = QuorumMessage::SigShares(shares.iter().map(SigShareMessage::from).collect());
        let mut reached = 0;
        for peer in peers {
            if self.send(peer, message.clone()).await {
                reached += 1;
            }
        }
        reached
    }

    async fn send(&self, to: &Hash, message: QuorumMessage) -> bool {
        match self.transport.send(to, message).await {
            Ok(()) => true,
            Err(e) => {
                metrics::record_transport_failure();
                warn!("[qc-18] Failed to reach {}: {}", short_hex(to), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryNetwork;
    use crate::domain::{BlsPublicKey, BlsSignature, LlmqType, QuorumMember};

    fn quorum() -> Quorum {
        Quorum {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [9u8; 32],
            height: 24,
            members: (0..4u8)
                .map(|i| QuorumMember {
                    pro_tx_hash: [i; 32],
                    public_key_share: BlsPublicKey::default(),
                    valid: true,
                })
                .collect(),
            quorum_public_key: BlsPublicKey::default(),
            threshold: 2,
        }
    }

    fn share() -> SigShare {
        SigShare {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [9u8; 32],
            quorum_member: 0,
            id: [1u8; 32],
            msg_hash: [2u8; 32],
            signature: BlsSignature::new(vec![3u8; 96]),
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_self() {
        let network = InMemoryNetwork::new();
        let (transport, mut own_rx) = network.join([0u8; 32]);
        let mut inboxes: Vec<_> = (1..4u8).map(|i| network.join([i; 32]).1).collect();
        let router = ShareGossipRouter::new([0u8; 32], Arc::new(transport));

        assert_eq!(router.broadcast_to_quorum_peers(&quorum(), &[share()]).await, 3);
        assert!(own_rx.try_recv().is_err());
        for rx in inboxes.iter_mut() {
            let envelope = rx.try_recv().unwrap();
            assert!(matches!(envelope.decode().unwrap(), QuorumMessage::SigShares(s) if s.len() == 1));
        }
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_not_an_error() {
        let network = InMemoryNetwork::new();
        let (transport, _own_rx) = network.join([0u8; 32]);
        let _rx1 = network.join([1u8; 32]).1;
        let router = ShareGossipRouter::new([0u8; 32], Arc::new(transport));

        // members 2 and 3 never joined
        assert_eq!(router.broadcast_to_quorum_peers(&quorum(), &[share()]).await, 1);
    }

    #[tokio::test]
    async fn test_route_to_recovery_members_only() {
        let network = InMemoryNetwork::new();
        let (transport, _own_rx) = network.join([0u8; 32]);
        let mut rx1 = network.join([1u8; 32]).1;
        let mut rx2 = network.join([2u8; 32]).1;
        let mut rx3 = network.join([3u8; 32]).1;
        let router = ShareGossipRouter::new([0u8; 32], Arc::new(transport));

        let reached = router
            .route_to_recovery_members(&quorum(), &[3, 0, 1], &[share()])
            .await;
        assert_eq!(reached, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
        assert!(rx3.try_recv().is_ok());
    }
}
