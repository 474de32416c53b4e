//! # Quorum signing simulation
//!
//! Runs one 3-of-5 test quorum in-process with real threshold BLS keys:
//! three members sign a request, every member ends up with the same
//! recovered signature, and a member that never signed verifies it.
//!
//! Logging follows `QC_LOG_LEVEL` / `QC_JSON_LOGS`; retention and timeouts
//! follow the `QC_*` variables read by [`SigningConfig::from_env`].

use anyhow::{bail, Context, Result};
use qc_18_quorum_signing::domain::{sha256d, short_hex};
use qc_18_quorum_signing::{
    init_logging, BlsThresholdCrypto, Hash, InMemoryChainIndex, InMemoryNetwork,
    InMemoryTransport, KeyDealer, LlmqParams, LlmqType, LogConfig, Quorum, QuorumMember,
    QuorumSigningApi, QuorumSigningService, SignOptions, SigningConfig, SigningError,
    SigningRequest, SystemTimeSource, VerifyRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

type Node =
    QuorumSigningService<BlsThresholdCrypto, InMemoryTransport, InMemoryChainIndex, SystemTimeSource>;

const MEMBERS: usize = 5;
const THRESHOLD: usize = 3;
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(5);

fn node_id(index: usize) -> Hash {
    sha256d(&[b"sim-node".as_slice(), &(index as u64).to_le_bytes()])
}

/// Deliver every inbound envelope to the node until the network goes away.
fn spawn_pump(
    node: Arc<Node>,
    mut inbox: tokio::sync::mpsc::UnboundedReceiver<qc_18_quorum_signing::Envelope>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = inbox.recv().await {
            match envelope.decode() {
                Ok(message) => {
                    node.receive_message(envelope.from, message).await;
                }
                Err(e) => warn!(
                    "[qc-18] Undecodable message from {}: {}",
                    short_hex(&envelope.from),
                    e
                ),
            }
        }
    })
}

async fn wait_for_recovery(nodes: &[Arc<Node>], request: &SigningRequest) -> Result<()> {
    let deadline = tokio::time::Instant::now() + RECOVERY_TIMEOUT;
    loop {
        let mut recovered = 0;
        for node in nodes {
            if node
                .has_recovered_signature(&request.id, &request.msg_hash)
                .await
            {
                recovered += 1;
            }
        }
        if recovered == nodes.len() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("only {}/{} nodes recovered the signature", recovered, nodes.len());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LogConfig::from_env())?;

    let params = LlmqParams {
        size: MEMBERS,
        threshold: THRESHOLD,
        recovery_members: THRESHOLD,
        ..LlmqType::LlmqTest.default_params()
    };
    let config = SigningConfig::from_env().with_params(params.clone());

    // DKG stand-in
    let crypto = Arc::new(BlsThresholdCrypto::new());
    let chain = Arc::new(InMemoryChainIndex::new());
    let height = chain.mine_to(params.dkg_interval);
    let quorum_hash = InMemoryChainIndex::block_hash(height);
    let keys = crypto
        .deal(THRESHOLD, MEMBERS, quorum_hash)
        .context("dealing quorum keys")?;
    let quorum = Quorum {
        llmq_type: LlmqType::LlmqTest,
        quorum_hash,
        height,
        members: keys
            .public_key_shares
            .iter()
            .enumerate()
            .map(|(i, pk)| QuorumMember {
                pro_tx_hash: node_id(i),
                public_key_share: pk.clone(),
                valid: true,
            })
            .collect(),
        quorum_public_key: keys.quorum_public_key.clone(),
        threshold: THRESHOLD,
    };
    info!(
        "[qc-18] Quorum {} formed at height {} ({}-of-{})",
        short_hex(&quorum_hash),
        height,
        THRESHOLD,
        MEMBERS
    );

    let network = InMemoryNetwork::new();
    let mut nodes = Vec::with_capacity(MEMBERS);
    let mut tasks = Vec::new();
    for (i, secret) in keys.secret_key_shares.iter().enumerate() {
        let (transport, inbox) = network.join(node_id(i));
        let node = Arc::new(QuorumSigningService::new(
            config.clone(),
            node_id(i),
            Arc::clone(&crypto),
            Arc::new(transport),
            Arc::clone(&chain),
            SystemTimeSource,
        ));
        node.on_quorum_formed(quorum.clone(), Some(secret.clone()));
        tasks.push(spawn_pump(Arc::clone(&node), inbox));
        tasks.push(node.spawn_cleanup_task());
        nodes.push(node);
    }

    let request = SigningRequest::new(
        LlmqType::LlmqTest,
        sha256d(&[b"sim-request".as_slice()]),
        sha256d(&[b"sim-message".as_slice()]),
    );
    let selection = nodes[0].select_quorum(request.llmq_type, &request.id).await?;
    info!(
        "[qc-18] Request id={} assigned to quorum {}",
        short_hex(&request.id),
        short_hex(&selection.quorum_hash)
    );

    for node in nodes.iter().take(THRESHOLD) {
        node.sign(request, SignOptions::default()).await?;
    }
    wait_for_recovery(&nodes, &request).await?;

    let recovered = nodes[0]
        .get_recovered_signature(&request.id, &request.msg_hash)
        .await?;
    for node in &nodes[1..] {
        let other = node
            .get_recovered_signature(&request.id, &request.msg_hash)
            .await?;
        if other.signature != recovered.signature {
            bail!("node {} recovered different bytes", short_hex(&node.node_id()));
        }
    }
    info!(
        "[qc-18] All {} members hold signature {}",
        MEMBERS,
        recovered.signature.to_hex()
    );

    let verifier = &nodes[MEMBERS - 1];
    let verified = verifier
        .verify(VerifyRequest::new(
            request.llmq_type,
            request.id,
            request.msg_hash,
            recovered.signature.clone(),
        ))
        .await?;
    info!("[qc-18] Verified by a non-signing member: {}", verified);

    let conflicting = SigningRequest::new(
        request.llmq_type,
        request.id,
        sha256d(&[b"sim-other-message".as_slice()]),
    );
    match nodes[MEMBERS - 1].sign(conflicting, SignOptions::default()).await {
        Ok(None) => info!("[qc-18] Second message for a recovered id was not signed"),
        Ok(Some(_)) => bail!("signed a second message for a recovered id"),
        Err(SigningError::AlreadyVoted { .. }) => {
            info!("[qc-18] Second message for a voted id was refused")
        }
        Err(e) => return Err(e.into()),
    }

    for task in tasks {
        task.abort();
    }
    Ok(())
}
