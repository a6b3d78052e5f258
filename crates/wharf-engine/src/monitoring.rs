//! Operator alerts and the default `tracing`-backed monitoring sink.

use std::fmt;

use chrono::{DateTime, Utc};
use wharf_types::{BatchLocation, DiscoveredBatch};

use crate::env::Monitoring;

/// Condition that needs operator attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// A batch exceeded its retry attempts and will not be retried again.
    GaveUp {
        base: BatchLocation,
        attempts: u32,
        last_error: String,
    },
    /// The failure ledger holds more batches than its configured size.
    CapacityExceeded { tracked: usize, size: usize },
    /// A tracked batch could not be rediscovered for a retry.
    RediscoveryFailed { base: BatchLocation, error: String },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GaveUp {
                base,
                attempts,
                last_error,
            } => write!(
                f,
                "giving up on {base} after {attempts} attempts: {last_error}"
            ),
            Self::CapacityExceeded { tracked, size } => write!(
                f,
                "retry queue tracks {tracked} batches, configured size is {size}"
            ),
            Self::RediscoveryFailed { base, error } => {
                write!(f, "cannot rediscover {base} for retry: {error}")
            }
        }
    }
}

/// Monitoring sink that writes everything to the `tracing` pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitoring;

impl Monitoring for TracingMonitoring {
    fn tick(&self, batch: &DiscoveredBatch, loaded_at: DateTime<Utc>) {
        let latency_secs = (loaded_at - batch.origin.timestamps.job_completed).num_seconds();
        tracing::info!(
            base = %batch.base(),
            shredded_types = batch.shredded_types.len(),
            latency_secs,
            "Batch loaded"
        );
    }

    fn alert(&self, alert: &Alert) {
        tracing::error!(alert = %alert, "Loader alert");
    }

    fn report_attempts(&self, attempts: u64) {
        tracing::info!(attempts, "Load attempts since last report");
    }
}
