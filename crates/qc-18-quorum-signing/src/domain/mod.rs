//! Domain layer - entities and stateful components, free of I/O
//!
//! Time is always passed in explicitly as seconds from an injected clock.

pub mod keys;
pub mod quorum;
pub mod quorum_tracker;
pub mod recovered;
pub mod recovered_store;
pub mod selection;
pub mod session;
pub mod sessions;
pub mod sig_share;
pub mod types;

pub use keys::{BlsPublicKey, BlsSignature, SecretKeyShare};
pub use quorum::{Quorum, QuorumMember};
pub use quorum_tracker::QuorumTracker;
pub use recovered::RecoveredSignature;
pub use recovered_store::{RecoveredSignatureStore, StoreOutcome, Vote, VoteLedger, VoteOutcome};
pub use selection::{QuorumScorer, QuorumSelector, Sha256dScorer};
pub use session::{SessionStatus, ShareInsert, SigningSession};
pub use sessions::{SessionHandle, SessionRegistry};
pub use sig_share::{QuorumMessage, RecoveredSigMessage, SessionKey, SigShare, SigShareMessage};
pub use types::{
    build_sign_hash, sha256d, short_hex, Hash, LlmqParams, LlmqType, MemberIndex, SigningRequest,
};
