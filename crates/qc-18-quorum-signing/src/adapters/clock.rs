//! Manually advanced clock

use crate::ports::TimeSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, manually advanced time in seconds.
///
/// Clones observe the same time, so one clock can drive a whole simulated
/// network.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_time() {
        let clock = ManualClock::new(1000);
        let other = clock.clone();

        clock.advance(5);
        assert_eq!(other.now(), 1005);

        other.set(7);
        assert_eq!(clock.now(), 7);
    }
}
