//! Adapters: crypto backends, in-process transport, clock and chain index

pub mod bls;
pub mod chain_index;
pub mod clock;
pub mod fake_crypto;
pub mod memory_network;

pub use bls::BlsThresholdCrypto;
pub use chain_index::InMemoryChainIndex;
pub use clock::ManualClock;
pub use fake_crypto::FakeThresholdCrypto;
pub use memory_network::{Envelope, InMemoryNetwork, InMemoryTransport};
