//! # Quorum Signing Subsystem (QC-18)
//!
//! Threshold signing by long-lived masternode quorums (LLMQs). Members each
//! hold a share of the quorum key; any `threshold` valid shares over the same
//! request recover one signature that verifies against the quorum public key.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): quorum tracking, deterministic selection,
//!   signing sessions, recovered signature store. No I/O.
//! - **Ports Layer** (`ports/`): inbound [`QuorumSigningApi`], outbound
//!   crypto, transport, chain and clock traits
//! - **Adapters** (`adapters/`): blst threshold BLS, a deterministic fake
//!   scheme, an in-process network, manual clock and chain
//! - **Service Layer** (`service.rs`): wires domain logic to ports
//!
//! ```text
//!   sign() ──→ QuorumSelector ──→ own share ──┐
//!                                             ▼
//!   peer shares ──→ validate ──→ SessionRegistry ──threshold──→ recover
//!                                                                  │
//!   verify() ←── Verifier ←── RecoveredSignatureStore ←───────────┘
//!                                      │
//!                                      └──→ SigningEvent broadcast
//! ```
//!
//! ## Safety Notes
//!
//! - **One vote per id**: a node never signs two message hashes for one id
//! - **First share wins**: a member's second, different share is equivocation
//!   and is dropped
//! - **Conflicts are kept**: two recovered message hashes for one id are both
//!   stored and flagged, never silently replaced
//!
//! ## Example
//!
//! ```rust,ignore
//! let service = QuorumSigningService::new(
//!     SigningConfig::default(),
//!     node_id,
//!     Arc::new(BlsThresholdCrypto::new()),
//!     Arc::new(transport),
//!     Arc::new(chain),
//!     SystemTimeSource,
//! );
//! service.on_quorum_formed(quorum, Some(key_share));
//!
//! let request = SigningRequest::new(LlmqType::LlmqTest, id, msg_hash);
//! service.sign(request, SignOptions::default()).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod gossip;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod telemetry;
pub mod verifier;

// Re-export public API
pub use adapters::{
    BlsThresholdCrypto, Envelope, FakeThresholdCrypto, InMemoryChainIndex, InMemoryNetwork,
    InMemoryTransport, ManualClock,
};
pub use config::SigningConfig;
pub use domain::{
    build_sign_hash, BlsPublicKey, BlsSignature, Hash, LlmqParams, LlmqType, MemberIndex, Quorum,
    QuorumMember, QuorumMessage, RecoveredSignature, SecretKeyShare, SessionKey, SessionStatus,
    SigShare, SigningRequest,
};
pub use error::{InvalidShareReason, SigningError, SigningResult};
pub use events::SigningEvent;
pub use ports::inbound::{
    CleanupReport, QuorumSelection, QuorumSigningApi, ShareDisposition, SignOptions, VerifyRequest,
};
pub use ports::outbound::{
    ChainIndex, DealtKeys, KeyDealer, ShareTransport, SystemTimeSource, ThresholdCrypto,
    TimeSource,
};
pub use service::QuorumSigningService;
pub use telemetry::{init_logging, LogConfig};
