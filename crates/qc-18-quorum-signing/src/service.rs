//! Quorum Signing Service - Core business logic
//!
//! Wires quorum tracking, selection, sessions, the recovered signature store
//! and verification behind [`QuorumSigningApi`].
//!
//! ## Share path
//!
//! ```text
//! share ─→ quorum known? ─→ member in range and valid? ─→ already recovered?
//!       ─→ share verifies? ─→ session.add_share ─→ threshold? ─→ recover
//!       ─→ aggregate verifies? ─→ (session lock released) ─→ store ─→ relay
//! ```
//!
//! Invalid shares are dropped with a [`ShareDisposition::Rejected`]; they
//! never fail the session they target.

use crate::config::SigningConfig;
use crate::domain::{
    build_sign_hash, short_hex, BlsSignature, Hash, LlmqType, MemberIndex, Quorum, QuorumMessage,
    QuorumSelector, QuorumTracker, RecoveredSigMessage, RecoveredSignature,
    RecoveredSignatureStore, SecretKeyShare, SessionKey, SessionRegistry, SessionStatus,
    ShareInsert, SigShare, SigningRequest, SigningSession, StoreOutcome, VoteLedger, VoteOutcome,
};
use crate::error::{InvalidShareReason, SigningError, SigningResult};
use crate::events::SigningEvent;
use crate::gossip::ShareGossipRouter;
use crate::metrics;
use crate::ports::inbound::{
    CleanupReport, QuorumSelection, QuorumSigningApi, ShareDisposition, SignOptions, VerifyRequest,
};
use crate::ports::outbound::{ChainIndex, ShareTransport, ThresholdCrypto, TimeSource};
use crate::verifier::Verifier;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of adding a share, decided under the session lock.
enum SessionStep {
    Done(ShareDisposition),
    Recovered {
        sig: RecoveredSignature,
        shares: Vec<SigShare>,
    },
    Failed(SigningError),
    /// The request recovered while this share was in flight
    Superseded,
}

fn reason_label(reason: &InvalidShareReason) -> &'static str {
    match reason {
        InvalidShareReason::UnknownQuorum => "unknown_quorum",
        InvalidShareReason::MemberOutOfRange { .. } => "member_out_of_range",
        InvalidShareReason::InvalidMember { .. } => "invalid_member",
        InvalidShareReason::BadSignature => "bad_signature",
        InvalidShareReason::Equivocation { .. } => "equivocation",
    }
}

/// Quorum signing for one node.
pub struct QuorumSigningService<C, T, K, X>
where
    C: ThresholdCrypto,
    T: ShareTransport,
    K: ChainIndex,
    X: TimeSource,
{
    config: SigningConfig,
    /// This node's registration hash
    node_id: Hash,
    tracker: Arc<QuorumTracker>,
    selector: Arc<QuorumSelector>,
    sessions: SessionRegistry,
    store: RecoveredSignatureStore,
    votes: VoteLedger,
    /// Secret key shares by quorum hash
    key_shares: RwLock<HashMap<(LlmqType, Hash), SecretKeyShare>>,
    crypto: Arc<C>,
    router: ShareGossipRouter<T>,
    verifier: Verifier<C, K>,
    clock: X,
    events: broadcast::Sender<SigningEvent>,
    last_cleanup: Mutex<Option<u64>>,
}

impl<C, T, K, X> QuorumSigningService<C, T, K, X>
where
    C: ThresholdCrypto,
    T: ShareTransport,
    K: ChainIndex,
    X: TimeSource,
{
    pub fn new(
        config: SigningConfig,
        node_id: Hash,
        crypto: Arc<C>,
        transport: Arc<T>,
        chain: Arc<K>,
        clock: X,
    ) -> Self {
        let tracker = Arc::new(QuorumTracker::new(config.llmq_params.iter().cloned()));
        let selector = Arc::new(QuorumSelector::new(Arc::clone(&tracker)));
        let verifier = Verifier::new(
            Arc::clone(&tracker),
            Arc::clone(&selector),
            Arc::clone(&crypto),
            chain,
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            store: RecoveredSignatureStore::new(config.max_recsigs_age_secs),
            votes: VoteLedger::new(config.max_recsigs_age_secs),
            config,
            node_id,
            tracker,
            selector,
            sessions: SessionRegistry::new(),
            key_shares: RwLock::new(HashMap::new()),
            crypto,
            router: ShareGossipRouter::new(node_id, transport),
            verifier,
            clock,
            events,
            last_cleanup: Mutex::new(None),
        }
    }

    pub fn node_id(&self) -> Hash {
        self.node_id
    }

    pub fn tracker(&self) -> &QuorumTracker {
        &self.tracker
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SigningEvent> {
        self.events.subscribe()
    }

    /// `None` once the session recovered, expired or never existed.
    pub fn session_status(&self, key: &SessionKey) -> Option<SessionStatus> {
        self.sessions.status(key)
    }

    /// Shares collected so far by a live session.
    pub fn session_share_count(&self, key: &SessionKey) -> usize {
        self.sessions
            .get(key)
            .map(|s| s.lock().collected())
            .unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Accept a quorum from the DKG, with this node's key share if it is a
    /// member.
    pub fn on_quorum_formed(&self, quorum: Quorum, key_share: Option<SecretKeyShare>) -> bool {
        let llmq_type = quorum.llmq_type;
        let quorum_hash = quorum.quorum_hash;
        let is_member = quorum.is_valid_member(&self.node_id);
        if !self.tracker.on_quorum_formed(quorum) {
            return false;
        }

        match key_share {
            Some(secret) => {
                self.key_shares.write().insert((llmq_type, quorum_hash), secret);
            }
            None if is_member => {
                warn!(
                    "[qc-18] Member of quorum {} but no key share supplied",
                    short_hex(&quorum_hash)
                );
            }
            None => {}
        }
        true
    }

    /// Run the rate-limited cleanup every `cleanup_interval_secs` of wall
    /// time until the task is aborted.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> JoinHandle<()>
    where
        C: 'static,
        T: 'static,
        K: 'static,
        X: 'static,
    {
        let service = Arc::clone(self);
        let period = Duration::from_secs(self.config.cleanup_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                service.cleanup().await;
            }
        })
    }

    fn publish(&self, event: SigningEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn reject(&self, share: &SigShare, reason: InvalidShareReason) -> ShareDisposition {
        metrics::record_share_rejected(reason_label(&reason));
        warn!(
            "[qc-18] Dropping share from member {} for quorum {} id={}: {}",
            share.quorum_member,
            short_hex(&share.quorum_hash),
            short_hex(&share.id),
            SigningError::InvalidShare {
                reason: reason.clone()
            }
        );
        ShareDisposition::Rejected(reason)
    }

    fn create_share(
        &self,
        quorum: &Quorum,
        member: MemberIndex,
        request: &SigningRequest,
    ) -> SigningResult<SigShare> {
        let sign_hash = build_sign_hash(
            request.llmq_type,
            &quorum.quorum_hash,
            &request.id,
            &request.msg_hash,
        );
        let signature = {
            let key_shares = self.key_shares.read();
            let secret = key_shares
                .get(&(quorum.llmq_type, quorum.quorum_hash))
                .ok_or(SigningError::MissingKeyShare {
                    quorum_hash: quorum.quorum_hash,
                })?;
            self.crypto.sign_share(secret, &sign_hash)?
        };

        Ok(SigShare {
            llmq_type: request.llmq_type,
            quorum_hash: quorum.quorum_hash,
            quorum_member: member,
            id: request.id,
            msg_hash: request.msg_hash,
            signature,
        })
    }

    /// Recover from the session's threshold subset and check the result.
    fn aggregate(&self, quorum: &Quorum, session: &mut SigningSession, now: u64) -> SessionStep {
        let Some(shares) = session.recovery_set() else {
            return SessionStep::Done(ShareDisposition::Accepted {
                collected: session.collected(),
            });
        };
        let key = *session.key();
        let pairs: Vec<(MemberIndex, BlsSignature)> = shares
            .iter()
            .map(|s| (s.quorum_member, s.signature.clone()))
            .collect();

        let signature = match self.crypto.recover(&pairs) {
            Ok(sig) => sig,
            Err(e) => return SessionStep::Failed(e),
        };
        if !self
            .crypto
            .verify_aggregate(&quorum.quorum_public_key, &key.sign_hash(), &signature)
        {
            return SessionStep::Failed(SigningError::AggregationIntegrityFailure {
                quorum_hash: key.quorum_hash,
                id: key.id,
            });
        }

        session.mark_recovered();
        SessionStep::Recovered {
            sig: RecoveredSignature {
                llmq_type: key.llmq_type,
                quorum_hash: key.quorum_hash,
                id: key.id,
                msg_hash: key.msg_hash,
                signature,
                first_seen: now,
            },
            shares,
        }
    }

    /// Store a recovered signature and publish what changed.
    fn store_recovered(&self, sig: &RecoveredSignature) -> StoreOutcome {
        let outcome = self.store.store(sig.clone());
        let StoreOutcome::Accepted { conflicting } = outcome else {
            return outcome;
        };

        metrics::record_signature_recovered();
        info!(
            "[qc-18] Recovered signature: quorum={} id={} msg_hash={}",
            short_hex(&sig.quorum_hash),
            short_hex(&sig.id),
            short_hex(&sig.msg_hash)
        );
        self.sessions.remove_request(&sig.id, &sig.msg_hash);

        if conflicting {
            metrics::record_conflict();
            let conflicting_with = self.store.msg_hashes_for_id(&sig.id);
            warn!(
                "[qc-18] Conflicting recovered signatures for id={}: {} message hashes",
                short_hex(&sig.id),
                conflicting_with.len()
            );
            self.publish(SigningEvent::ConflictDetected {
                id: sig.id,
                msg_hash: sig.msg_hash,
                conflicting_with,
            });
        }
        self.publish(SigningEvent::SignatureRecovered(sig.clone()));
        outcome
    }

    /// Validate a share and feed it into its session.
    pub async fn process_share(&self, share: SigShare) -> ShareDisposition {
        let Some(quorum) = self
            .tracker
            .quorum_by_hash(share.llmq_type, &share.quorum_hash)
        else {
            return self.reject(&share, InvalidShareReason::UnknownQuorum);
        };
        let Some(member) = quorum.member(share.quorum_member) else {
            let reason = InvalidShareReason::MemberOutOfRange {
                index: share.quorum_member,
                size: quorum.size(),
            };
            return self.reject(&share, reason);
        };
        if !member.valid {
            let reason = InvalidShareReason::InvalidMember {
                index: share.quorum_member,
            };
            return self.reject(&share, reason);
        }
        if self.store.has(&share.id, &share.msg_hash) {
            self.sessions.remove(&share.session_key());
            return ShareDisposition::Ignored;
        }
        if !self
            .crypto
            .verify_share(&member.public_key_share, &share.sign_hash(), &share.signature)
        {
            return self.reject(&share, InvalidShareReason::BadSignature);
        }

        let key = share.session_key();
        let now = self.clock.now();
        let member_index = share.quorum_member;
        let handle = self.sessions.get_or_create(key, quorum.threshold, now);

        let step = {
            let mut session = handle.lock();
            if self.store.has(&key.id, &key.msg_hash) {
                session.mark_recovered();
                SessionStep::Superseded
            } else {
                match session.add_share(share, now) {
                    ShareInsert::Inserted { collected } => {
                        metrics::record_share_processed();
                        debug!(
                            "[qc-18] Share {}/{} from member {} for id={}",
                            collected,
                            quorum.threshold,
                            member_index,
                            short_hex(&key.id)
                        );
                        self.aggregate(&quorum, &mut session, now)
                    }
                    ShareInsert::Duplicate => SessionStep::Done(ShareDisposition::Duplicate),
                    ShareInsert::Equivocation { .. } => {
                        SessionStep::Done(ShareDisposition::Rejected(InvalidShareReason::Equivocation {
                            index: member_index,
                        }))
                    }
                    ShareInsert::Closed(_) => SessionStep::Done(ShareDisposition::Ignored),
                }
            }
        };

        match step {
            SessionStep::Done(ShareDisposition::Rejected(reason)) => {
                metrics::record_share_rejected(reason_label(&reason));
                warn!(
                    "[qc-18] Equivocation by member {} in quorum {} for id={}",
                    member_index,
                    short_hex(&key.quorum_hash),
                    short_hex(&key.id)
                );
                self.publish(SigningEvent::EquivocationDetected {
                    quorum_hash: key.quorum_hash,
                    member: member_index,
                    id: key.id,
                    msg_hash: key.msg_hash,
                });
                ShareDisposition::Rejected(reason)
            }
            SessionStep::Done(disposition) => disposition,
            SessionStep::Superseded => {
                self.sessions.remove(&key);
                ShareDisposition::Ignored
            }
            SessionStep::Failed(e) => {
                error!(
                    "[qc-18] Aborting session msg_hash={} after {} shares: {}",
                    short_hex(&key.msg_hash),
                    quorum.threshold,
                    e
                );
                self.sessions.remove(&key);
                metrics::record_aggregation_failure();
                self.publish(SigningEvent::AggregationFailed { session: key });
                ShareDisposition::AggregationFailed
            }
            SessionStep::Recovered { sig, shares } => {
                let outcome = self.store_recovered(&sig);
                self.sessions.remove(&key);
                if outcome == StoreOutcome::Duplicate {
                    return ShareDisposition::Ignored;
                }
                let recovery_members = self.selector.recovery_members(&quorum, &key.id);
                self.router
                    .route_to_recovery_members(&quorum, &recovery_members, &shares)
                    .await;
                self.router.relay_recovered(&quorum, &sig).await;
                ShareDisposition::Recovered(sig)
            }
        }
    }

    /// Pre-verify and store a recovered signature relayed by a peer.
    pub async fn receive_recovered(&self, message: RecoveredSigMessage) -> ShareDisposition {
        let Some(quorum) = self
            .tracker
            .quorum_by_hash(message.llmq_type, &message.quorum_hash)
        else {
            warn!(
                "[qc-18] Recovered signature for unknown quorum {}",
                short_hex(&message.quorum_hash)
            );
            return ShareDisposition::Rejected(InvalidShareReason::UnknownQuorum);
        };
        if self.store.has(&message.id, &message.msg_hash) {
            return ShareDisposition::Duplicate;
        }

        let sign_hash = build_sign_hash(
            message.llmq_type,
            &message.quorum_hash,
            &message.id,
            &message.msg_hash,
        );
        if !self
            .crypto
            .verify_aggregate(&quorum.quorum_public_key, &sign_hash, &message.signature)
        {
            warn!(
                "[qc-18] Relayed signature for id={} does not verify against quorum {}",
                short_hex(&message.id),
                short_hex(&message.quorum_hash)
            );
            return ShareDisposition::Rejected(InvalidShareReason::BadSignature);
        }

        let sig = RecoveredSignature {
            llmq_type: message.llmq_type,
            quorum_hash: message.quorum_hash,
            id: message.id,
            msg_hash: message.msg_hash,
            signature: message.signature,
            first_seen: self.clock.now(),
        };
        match self.store_recovered(&sig) {
            StoreOutcome::Accepted { .. } => ShareDisposition::Recovered(sig),
            StoreOutcome::Duplicate => ShareDisposition::Duplicate,
        }
    }

    fn run_cleanup(&self, now: u64) -> CleanupReport {
        let expired_sigs = self.store.sweep_expired(now);
        for sig in &expired_sigs {
            self.sessions.remove_request(&sig.id, &sig.msg_hash);
        }
        let expired_votes = self.votes.sweep_expired(now);
        let expired_sessions = self
            .sessions
            .expire_idle(now, self.config.session_timeout_secs);
        for key in &expired_sessions {
            debug!(
                "[qc-18] Session expired: quorum={} id={}",
                short_hex(&key.quorum_hash),
                short_hex(&key.id)
            );
            self.publish(SigningEvent::SessionExpired { session: *key });
        }

        metrics::set_cache_sizes(self.sessions.len(), self.store.len());
        let report = CleanupReport {
            expired_signatures: expired_sigs.len(),
            expired_votes,
            expired_sessions: expired_sessions.len(),
        };
        if report != CleanupReport::default() {
            debug!("[qc-18] Cleanup: {:?}", report);
        }
        report
    }
}

#[async_trait]
impl<C, T, K, X> QuorumSigningApi for QuorumSigningService<C, T, K, X>
where
    C: ThresholdCrypto,
    T: ShareTransport,
    K: ChainIndex,
    X: TimeSource,
{
    async fn sign(
        &self,
        request: SigningRequest,
        options: SignOptions,
    ) -> SigningResult<Option<SigShare>> {
        let quorum = self.selector.select(
            request.llmq_type,
            &request.id,
            options.quorum_hash.as_ref(),
        )?;
        let member = quorum
            .member_index(&self.node_id)
            .filter(|&i| quorum.members[i as usize].valid)
            .ok_or(SigningError::NotQuorumMember {
                quorum_hash: quorum.quorum_hash,
            })?;

        let share = self.create_share(&quorum, member, &request)?;
        if !options.submit {
            return Ok(Some(share));
        }

        if self.store.has_for_id(&request.id) {
            debug!(
                "[qc-18] id={} already recovered, not signing",
                short_hex(&request.id)
            );
            return Ok(None);
        }

        match self
            .votes
            .vote(request.id, request.msg_hash, self.clock.now())
        {
            VoteOutcome::Conflicting { prev_msg_hash } => {
                warn!(
                    "[qc-18] Refusing to sign id={} msg_hash={}, already voted for {}",
                    short_hex(&request.id),
                    short_hex(&request.msg_hash),
                    short_hex(&prev_msg_hash)
                );
                return Err(SigningError::AlreadyVoted {
                    id: request.id,
                    prev_msg_hash,
                });
            }
            VoteOutcome::AlreadyCast if !options.allow_resign => {
                debug!(
                    "[qc-18] Already signed id={}, skipping",
                    short_hex(&request.id)
                );
                return Ok(None);
            }
            VoteOutcome::AlreadyCast | VoteOutcome::Recorded => {}
        }

        info!(
            "[qc-18] Signing id={} msg_hash={} with quorum {} as member {}",
            short_hex(&request.id),
            short_hex(&request.msg_hash),
            short_hex(&quorum.quorum_hash),
            member
        );
        self.process_share(share.clone()).await;
        self.router
            .broadcast_to_quorum_peers(&quorum, std::slice::from_ref(&share))
            .await;
        Ok(Some(share))
    }

    async fn receive_message(&self, from: Hash, message: QuorumMessage) -> Vec<ShareDisposition> {
        match message {
            QuorumMessage::SigShares(shares) => {
                debug!(
                    "[qc-18] {} shares from {}",
                    shares.len(),
                    short_hex(&from)
                );
                let mut dispositions = Vec::with_capacity(shares.len());
                for msg in shares {
                    dispositions.push(self.process_share(msg.into_share()).await);
                }
                dispositions
            }
            QuorumMessage::RecoveredSig(msg) => vec![self.receive_recovered(msg).await],
        }
    }

    async fn get_recovered_signature(
        &self,
        id: &Hash,
        msg_hash: &Hash,
    ) -> SigningResult<RecoveredSignature> {
        self.store.get(id, msg_hash).ok_or(SigningError::NotFound {
            id: *id,
            msg_hash: *msg_hash,
        })
    }

    async fn has_recovered_signature(&self, id: &Hash, msg_hash: &Hash) -> bool {
        self.store.has(id, msg_hash)
    }

    async fn get_recovered_signature_by_hash(&self, content_hash: &Hash) -> Option<RecoveredSignature> {
        self.store.get_by_content_hash(content_hash)
    }

    async fn is_conflicting(&self, id: &Hash, msg_hash: &Hash) -> bool {
        self.store.is_conflicting(id, msg_hash)
    }

    async fn has_voted_on_id(&self, id: &Hash) -> bool {
        self.votes.has_voted(id)
    }

    async fn get_vote_for_id(&self, id: &Hash) -> Option<Hash> {
        self.votes.get_vote(id)
    }

    async fn select_quorum(
        &self,
        llmq_type: LlmqType,
        id: &Hash,
    ) -> SigningResult<QuorumSelection> {
        let quorum = self.selector.select(llmq_type, id, None)?;
        let recovery_members = self
            .selector
            .recovery_members(&quorum, id)
            .into_iter()
            .filter_map(|i| quorum.member(i))
            .map(|m| m.pro_tx_hash)
            .collect();

        Ok(QuorumSelection {
            llmq_type,
            quorum_hash: quorum.quorum_hash,
            height: quorum.height,
            recovery_members,
        })
    }

    async fn verify(&self, request: VerifyRequest) -> SigningResult<bool> {
        self.verifier.verify(&request)
    }

    async fn cleanup(&self) -> Option<CleanupReport> {
        let now = self.clock.now();
        {
            let mut last = self.last_cleanup.lock();
            if let Some(prev) = *last {
                if now.saturating_sub(prev) < self.config.cleanup_interval_secs {
                    return None;
                }
            }
            *last = Some(now);
        }
        Some(self.run_cleanup(now))
    }

    async fn force_cleanup(&self) -> CleanupReport {
        let now = self.clock.now();
        *self.last_cleanup.lock() = Some(now);
        self.run_cleanup(now)
    }
}
