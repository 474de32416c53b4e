//! Outgoing events for the Quorum Signing subsystem
//!
//! Published on a `tokio::sync::broadcast` channel; subscribers that fall
//! behind miss events rather than blocking signing.

use crate::domain::{Hash, MemberIndex, RecoveredSignature, SessionKey};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningEvent {
    /// A recovered signature entered the local store
    SignatureRecovered(RecoveredSignature),

    /// Another msg hash already recovered for the same id
    ConflictDetected {
        id: Hash,
        msg_hash: Hash,
        /// Every msg hash now recovered for the id
        conflicting_with: Vec<Hash>,
    },

    /// A member sent two different shares for one session
    EquivocationDetected {
        quorum_hash: Hash,
        member: MemberIndex,
        id: Hash,
        msg_hash: Hash,
    },

    /// Threshold reached but the aggregate failed verification
    AggregationFailed { session: SessionKey },

    /// A session timed out before reaching threshold
    SessionExpired { session: SessionKey },
}
