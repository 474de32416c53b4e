//! Quorum signing configuration

use crate::domain::{LlmqParams, LlmqType};
use std::env;

/// Recovered signatures are kept for 7 days
pub const DEFAULT_MAX_RECSIGS_AGE_SECS: u64 = 60 * 60 * 24 * 7;

/// Idle signing sessions expire after one minute
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 60;

/// Cleanup runs at most every 5 seconds
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5;

/// Service configuration
#[derive(Clone, Debug)]
pub struct SigningConfig {
    /// Parameters for every LLMQ type this node tracks
    pub llmq_params: Vec<LlmqParams>,
    /// Retention of recovered signatures and votes (seconds)
    pub max_recsigs_age_secs: u64,
    /// Idle timeout of a collecting session (seconds)
    pub session_timeout_secs: u64,
    /// Minimum spacing of rate-limited cleanup runs (seconds)
    pub cleanup_interval_secs: u64,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            llmq_params: vec![
                LlmqType::Llmq400_60.default_params(),
                LlmqType::LlmqTest.default_params(),
            ],
            max_recsigs_age_secs: DEFAULT_MAX_RECSIGS_AGE_SECS,
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            event_capacity: 1024,
        }
    }
}

impl SigningConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_MAX_RECSIGS_AGE`: Recovered signature retention in seconds (default: 604800)
    /// - `QC_SESSION_TIMEOUT`: Session idle timeout in seconds (default: 60)
    /// - `QC_CLEANUP_INTERVAL`: Cleanup spacing in seconds (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_recsigs_age_secs: env_u64("QC_MAX_RECSIGS_AGE", defaults.max_recsigs_age_secs),
            session_timeout_secs: env_u64("QC_SESSION_TIMEOUT", defaults.session_timeout_secs),
            cleanup_interval_secs: env_u64("QC_CLEANUP_INTERVAL", defaults.cleanup_interval_secs),
            ..defaults
        }
    }

    /// Configuration tracking a single LLMQ type.
    pub fn for_params(params: LlmqParams) -> Self {
        Self {
            llmq_params: vec![params],
            ..Self::default()
        }
    }

    /// Replace or add the parameters of one type.
    pub fn with_params(mut self, params: LlmqParams) -> Self {
        self.llmq_params.retain(|p| p.llmq_type != params.llmq_type);
        self.llmq_params.push(params);
        self
    }

    pub fn params(&self, llmq_type: LlmqType) -> Option<&LlmqParams> {
        self.llmq_params.iter().find(|p| p.llmq_type == llmq_type)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SigningConfig::default();
        assert_eq!(config.max_recsigs_age_secs, 604_800);
        assert_eq!(config.cleanup_interval_secs, 5);
        assert!(config.params(LlmqType::LlmqTest).is_some());
        assert!(config.params(LlmqType::Llmq400_60).is_some());
    }

    #[test]
    fn test_with_params_overrides_type() {
        let params = LlmqParams {
            size: 5,
            threshold: 3,
            ..LlmqType::LlmqTest.default_params()
        };
        let config = SigningConfig::default().with_params(params.clone());

        assert_eq!(config.llmq_params.len(), 2);
        assert_eq!(config.params(LlmqType::LlmqTest), Some(&params));
    }

    #[test]
    fn test_env_parse_falls_back() {
        assert_eq!(env_u64("QC_TEST_UNSET_VARIABLE_FOR_CONFIG", 42), 42);
    }
}
