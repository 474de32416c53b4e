//! # Quorum Signing Metrics
//!
//! Prometheus metrics for monitoring threshold signing.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-18-quorum-signing = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `quorum_signing_shares_processed_total` - Counter of shares accepted into sessions
//! - `quorum_signing_shares_rejected_total` - Counter of dropped shares (by reason)
//! - `quorum_signing_signatures_recovered_total` - Counter of recovered signatures
//! - `quorum_signing_conflicts_total` - Counter of conflicting recoveries
//! - `quorum_signing_aggregation_failures_total` - Counter of aggregation integrity failures
//! - `quorum_signing_transport_failures_total` - Counter of failed peer sends
//! - `quorum_signing_active_sessions` - Gauge of collecting sessions
//! - `quorum_signing_cached_signatures` - Gauge of cached recovered signatures

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_gauge, register_int_counter, CounterVec, Gauge, IntCounter,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref SHARES_PROCESSED: IntCounter = register_int_counter!(
        "quorum_signing_shares_processed_total",
        "Total number of sig shares accepted into sessions"
    )
    .expect("Failed to create SHARES_PROCESSED metric");

    /// Dropped shares, labeled by reason
    pub static ref SHARES_REJECTED: CounterVec = register_counter_vec!(
        "quorum_signing_shares_rejected_total",
        "Total number of sig shares dropped",
        &["reason"]
    )
    .expect("Failed to create SHARES_REJECTED metric");

    pub static ref SIGNATURES_RECOVERED: IntCounter = register_int_counter!(
        "quorum_signing_signatures_recovered_total",
        "Total number of recovered signatures stored"
    )
    .expect("Failed to create SIGNATURES_RECOVERED metric");

    pub static ref CONFLICTS: IntCounter = register_int_counter!(
        "quorum_signing_conflicts_total",
        "Total number of conflicting recovered signatures"
    )
    .expect("Failed to create CONFLICTS metric");

    pub static ref AGGREGATION_FAILURES: IntCounter = register_int_counter!(
        "quorum_signing_aggregation_failures_total",
        "Total number of aggregation integrity failures"
    )
    .expect("Failed to create AGGREGATION_FAILURES metric");

    pub static ref TRANSPORT_FAILURES: IntCounter = register_int_counter!(
        "quorum_signing_transport_failures_total",
        "Total number of failed sends to quorum peers"
    )
    .expect("Failed to create TRANSPORT_FAILURES metric");

    pub static ref ACTIVE_SESSIONS: Gauge = register_gauge!(
        "quorum_signing_active_sessions",
        "Number of signing sessions still collecting"
    )
    .expect("Failed to create ACTIVE_SESSIONS metric");

    pub static ref CACHED_SIGNATURES: Gauge = register_gauge!(
        "quorum_signing_cached_signatures",
        "Number of recovered signatures in the cache"
    )
    .expect("Failed to create CACHED_SIGNATURES metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_share_processed() {
    SHARES_PROCESSED.inc();
}

/// Record a dropped share with reason
#[cfg(feature = "metrics")]
pub fn record_share_rejected(reason: &str) {
    SHARES_REJECTED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_signature_recovered() {
    SIGNATURES_RECOVERED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_conflict() {
    CONFLICTS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_aggregation_failure() {
    AGGREGATION_FAILURES.inc();
}

#[cfg(feature = "metrics")]
pub fn record_transport_failure() {
    TRANSPORT_FAILURES.inc();
}

/// Update cache and session gauges
#[cfg(feature = "metrics")]
pub fn set_cache_sizes(sessions: usize, signatures: usize) {
    ACTIVE_SESSIONS.set(sessions as f64);
    CACHED_SIGNATURES.set(signatures as f64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_share_processed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_share_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_signature_recovered() {}

#[cfg(not(feature = "metrics"))]
pub fn record_conflict() {}

#[cfg(not(feature = "metrics"))]
pub fn record_aggregation_failure() {}

#[cfg(not(feature = "metrics"))]
pub fn record_transport_failure() {}

#[cfg(not(feature = "metrics"))]
pub fn set_cache_sizes(_sessions: usize, _signatures: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_noop_when_disabled() {
        record_share_processed();
        record_share_rejected("bad_signature");
        record_signature_recovered();
        record_conflict();
        record_aggregation_failure();
        record_transport_failure();
        set_cache_sizes(3, 10);
    }
}
