//! Driving Ports (API - Inbound)

use crate::domain::{
    BlsSignature, Hash, LlmqType, QuorumMessage, RecoveredSignature, SigShare, SigningRequest,
};
use crate::error::{InvalidShareReason, SigningResult};
use async_trait::async_trait;

/// Options for [`QuorumSigningApi::sign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignOptions {
    /// Sign with this quorum instead of the selected one
    pub quorum_hash: Option<Hash>,
    /// Feed the share into the local session and broadcast it. When false
    /// the share is only returned, for out-of-band delivery.
    pub submit: bool,
    /// Produce a share again for an id already voted with the same msg hash
    pub allow_resign: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            quorum_hash: None,
            submit: true,
            allow_resign: false,
        }
    }
}

impl SignOptions {
    pub fn with_quorum(mut self, quorum_hash: Hash) -> Self {
        self.quorum_hash = Some(quorum_hash);
        self
    }

    pub fn no_submit(mut self) -> Self {
        self.submit = false;
        self
    }

    pub fn allow_resign(mut self) -> Self {
        self.allow_resign = true;
        self
    }
}

/// Signature to check, with optional quorum pinning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyRequest {
    pub llmq_type: LlmqType,
    pub id: Hash,
    pub msg_hash: Hash,
    pub signature: BlsSignature,
    /// Verify against exactly this quorum
    pub quorum_hash: Option<Hash>,
    /// Verify against the quorums active at this height
    pub sign_height: Option<u64>,
}

impl VerifyRequest {
    pub fn new(llmq_type: LlmqType, id: Hash, msg_hash: Hash, signature: BlsSignature) -> Self {
        Self {
            llmq_type,
            id,
            msg_hash,
            signature,
            quorum_hash: None,
            sign_height: None,
        }
    }

    pub fn with_quorum(mut self, quorum_hash: Hash) -> Self {
        self.quorum_hash = Some(quorum_hash);
        self
    }

    pub fn at_height(mut self, height: u64) -> Self {
        self.sign_height = Some(height);
        self
    }
}

/// The quorum responsible for a request id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumSelection {
    pub llmq_type: LlmqType,
    pub quorum_hash: Hash,
    pub height: u64,
    /// Registration hashes of the recovery members, best-ranked first
    pub recovery_members: Vec<Hash>,
}

/// What happened to one inbound share or recovered signature.
///
/// Invalid input is reported here and in logs; it is never an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareDisposition {
    /// Recorded in its session
    Accepted { collected: usize },
    /// Already known
    Duplicate,
    /// Dropped
    Rejected(InvalidShareReason),
    /// The request already recovered or its session is closed
    Ignored,
    /// This input completed (or delivered) the recovered signature
    Recovered(RecoveredSignature),
    /// Threshold reached but the aggregate failed verification; session
    /// aborted
    AggregationFailed,
}

/// Counts from one cleanup run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired_signatures: usize,
    pub expired_votes: usize,
    pub expired_sessions: usize,
}

/// Primary Quorum Signing API
#[async_trait]
pub trait QuorumSigningApi: Send + Sync {
    /// Produce this node's share for a request.
    ///
    /// Returns `None` when nothing was signed: the id already recovered, or
    /// the same message was already voted without `allow_resign`.
    async fn sign(&self, request: SigningRequest, options: SignOptions) -> SigningResult<Option<SigShare>>;

    /// Handle a message from a quorum peer.
    async fn receive_message(&self, from: Hash, message: QuorumMessage) -> Vec<ShareDisposition>;

    /// Fails with `NotFound` until the request recovers.
    async fn get_recovered_signature(&self, id: &Hash, msg_hash: &Hash) -> SigningResult<RecoveredSignature>;

    async fn has_recovered_signature(&self, id: &Hash, msg_hash: &Hash) -> bool;

    /// Look a recovered signature up by its content hash, as announced in
    /// inventory.
    async fn get_recovered_signature_by_hash(&self, content_hash: &Hash) -> Option<RecoveredSignature>;

    /// True iff another msg hash recovered for `id`.
    async fn is_conflicting(&self, id: &Hash, msg_hash: &Hash) -> bool;

    async fn has_voted_on_id(&self, id: &Hash) -> bool;

    async fn get_vote_for_id(&self, id: &Hash) -> Option<Hash>;

    async fn select_quorum(&self, llmq_type: LlmqType, id: &Hash) -> SigningResult<QuorumSelection>;

    /// Fails with `QuorumNotFound` if an explicit quorum hash is unknown.
    async fn verify(&self, request: VerifyRequest) -> SigningResult<bool>;

    /// Rate-limited sweep; `None` if the last run is too recent.
    async fn cleanup(&self) -> Option<CleanupReport>;

    /// Sweep now, ignoring the rate limit.
    async fn force_cleanup(&self) -> CleanupReport;
}
