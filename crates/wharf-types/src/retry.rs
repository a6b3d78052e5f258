//! Retry queue policy configuration.

use std::time::Duration;

pub const DEFAULT_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_SIZE: usize = 64;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_PERIOD_SECS: u64 = 30;

/// Rules governing how failed batches are tracked and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryQueueConfig {
    /// How often the retry queue scans the ledger, and how old a failure
    /// must be before it is resubmitted.
    pub interval: Duration,
    /// Maximum distinct batches the ledger is expected to hold.
    pub size: usize,
    /// Per-batch failure cap before giving up.
    pub max_attempts: u32,
    /// Delay before restarting a load whose commit failed.
    pub backoff_period: Duration,
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            size: DEFAULT_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_period: Duration::from_secs(DEFAULT_BACKOFF_PERIOD_SECS),
        }
    }
}

impl RetryQueueConfig {
    /// `true` if a batch that has failed `attempts` times should no longer
    /// be tracked.
    #[must_use]
    pub fn exceeded(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }
}
