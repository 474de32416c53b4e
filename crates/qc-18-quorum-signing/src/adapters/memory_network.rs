//! In-process transport between simulated quorum members
//!
//! Messages are bincode-encoded on send and delivered as raw envelopes, so
//! the wire codec is exercised end to end. Links can be cut to simulate
//! partitions.

use crate::domain::{short_hex, Hash, QuorumMessage};
use crate::error::{SigningError, SigningResult};
use crate::ports::ShareTransport;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// One encoded message in flight.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub from: Hash,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn decode(&self) -> SigningResult<QuorumMessage> {
        QuorumMessage::decode(&self.payload)
    }
}

#[derive(Default)]
struct NetworkState {
    peers: HashMap<Hash, mpsc::UnboundedSender<Envelope>>,
    /// Unordered pairs that cannot reach each other
    cut: HashSet<(Hash, Hash)>,
}

fn link(a: Hash, b: Hash) -> (Hash, Hash) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Hub connecting every registered node.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    state: Arc<RwLock<NetworkState>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node; returns its transport and inbox.
    pub fn join(&self, node_id: Hash) -> (InMemoryTransport, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.write().peers.insert(node_id, tx);
        let transport = InMemoryTransport {
            node_id,
            network: self.clone(),
        };
        (transport, rx)
    }

    /// Cut the link between two nodes.
    pub fn partition(&self, a: Hash, b: Hash) {
        self.state.write().cut.insert(link(a, b));
    }

    /// Isolate `node` from every other node.
    pub fn isolate(&self, node: Hash) {
        let mut state = self.state.write();
        let others: Vec<Hash> = state.peers.keys().filter(|p| **p != node).copied().collect();
        for other in others {
            state.cut.insert(link(node, other));
        }
    }

    pub fn heal(&self) {
        self.state.write().cut.clear();
    }

    fn deliver(&self, from: Hash, to: &Hash, payload: Vec<u8>) -> SigningResult<()> {
        let state = self.state.read();
        if state.cut.contains(&link(from, *to)) {
            return Err(SigningError::Transport {
                reason: format!("{} unreachable", short_hex(to)),
            });
        }
        let peer = state.peers.get(to).ok_or_else(|| SigningError::Transport {
            reason: format!("{} not connected", short_hex(to)),
        })?;
        peer.send(Envelope { from, payload })
            .map_err(|_| SigningError::Transport {
                reason: format!("{} inbox closed", short_hex(to)),
            })
    }
}

/// A node's handle on the [`InMemoryNetwork`].
#[derive(Clone)]
pub struct InMemoryTransport {
    node_id: Hash,
    network: InMemoryNetwork,
}

#[async_trait]
impl ShareTransport for InMemoryTransport {
    async fn send(&self, to: &Hash, message: QuorumMessage) -> SigningResult<()> {
        let payload = message.encode()?;
        trace!(
            "[qc-18] {} -> {} ({} bytes)",
            short_hex(&self.node_id),
            short_hex(to),
            payload.len()
        );
        self.network.deliver(self.node_id, to, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlsSignature, LlmqType, RecoveredSigMessage};

    fn message() -> QuorumMessage {
        QuorumMessage::RecoveredSig(RecoveredSigMessage {
            llmq_type: LlmqType::LlmqTest,
            quorum_hash: [1u8; 32],
            id: [2u8; 32],
            msg_hash: [3u8; 32],
            signature: BlsSignature::new(vec![4u8; 32]),
        })
    }

    #[tokio::test]
    async fn test_delivery_roundtrips_through_codec() {
        let network = InMemoryNetwork::new();
        let (a, _rx_a) = network.join([0xa; 32]);
        let (_b, mut rx_b) = network.join([0xb; 32]);

        a.send(&[0xb; 32], message()).await.unwrap();

        let envelope = rx_b.recv().await.unwrap();
        assert_eq!(envelope.from, [0xa; 32]);
        assert_eq!(envelope.decode().unwrap(), message());
    }

    #[tokio::test]
    async fn test_partition_and_heal() {
        let network = InMemoryNetwork::new();
        let (a, _rx_a) = network.join([0xa; 32]);
        let (_b, mut rx_b) = network.join([0xb; 32]);

        network.isolate([0xb; 32]);
        let result = a.send(&[0xb; 32], message()).await;
        assert!(matches!(result, Err(SigningError::Transport { .. })));

        network.heal();
        a.send(&[0xb; 32], message()).await.unwrap();
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_peer() {
        let network = InMemoryNetwork::new();
        let (a, _rx) = network.join([0xa; 32]);
        assert!(a.send(&[0xc; 32], message()).await.is_err());
    }
}
