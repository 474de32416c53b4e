//! Error types for the Quorum Signing subsystem

use crate::domain::{Hash, LlmqType, MemberIndex};
use thiserror::Error;

/// Why an inbound sig share was dropped.
///
/// Invalid shares are reported and logged; they never fail the session they
/// were meant for.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvalidShareReason {
    #[error("unknown quorum")]
    UnknownQuorum,

    #[error("member index {index} out of range for quorum of {size}")]
    MemberOutOfRange { index: MemberIndex, size: usize },

    #[error("member {index} did not pass the DKG")]
    InvalidMember { index: MemberIndex },

    #[error("share signature does not verify against member key share")]
    BadSignature,

    #[error("member {index} already sent a different share (equivocation)")]
    Equivocation { index: MemberIndex },
}

/// Quorum signing errors
#[derive(Debug, Error)]
pub enum SigningError {
    /// Explicit quorum hash is not known for the type, active or historical
    #[error("Quorum not found: {}", hex::encode(quorum_hash))]
    QuorumNotFound { quorum_hash: Hash },

    /// No quorum is active for implicit selection
    #[error("No active quorums for {llmq_type}")]
    NoActiveQuorums { llmq_type: LlmqType },

    /// LLMQ type has no configured parameters
    #[error("Unknown LLMQ type: {llmq_type}")]
    UnknownLlmqType { llmq_type: LlmqType },

    /// No recovered signature (yet) for the request
    #[error("Recovered signature not found: id {}, msg_hash {}", hex::encode(id), hex::encode(msg_hash))]
    NotFound { id: Hash, msg_hash: Hash },

    /// Share rejected during ingestion
    #[error("Invalid sig share: {reason}")]
    InvalidShare { reason: InvalidShareReason },

    /// Aggregated signature failed to verify despite enough valid shares
    #[error("Aggregation integrity failure for quorum {} id {}", hex::encode(quorum_hash), hex::encode(id))]
    AggregationIntegrityFailure { quorum_hash: Hash, id: Hash },

    /// This node is not a valid member of the selected quorum
    #[error("Not a valid member of quorum {}", hex::encode(quorum_hash))]
    NotQuorumMember { quorum_hash: Hash },

    /// This node already signed another message for the same request id
    #[error("Already voted on id {} for msg_hash {}", hex::encode(id), hex::encode(prev_msg_hash))]
    AlreadyVoted { id: Hash, prev_msg_hash: Hash },

    /// No secret key share held for the quorum
    #[error("Missing secret key share for quorum {}", hex::encode(quorum_hash))]
    MissingKeyShare { quorum_hash: Hash },

    /// Crypto backend failure
    #[error("Crypto error: {reason}")]
    Crypto { reason: String },

    /// Transport failure
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Wire encoding/decoding failure
    #[error("Codec error: {reason}")]
    Codec { reason: String },
}

/// Result type for quorum signing operations
pub type SigningResult<T> = Result<T, SigningError>;
