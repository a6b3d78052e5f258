//! Processing-lease keep-alive.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::message::ExtendLease;

pub const DEFAULT_EXTENSION_SECS: u64 = 300;
pub const DEFAULT_CHECK_EVERY_SECS: u64 = 60;

/// How a running load keeps its source lease alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// Lease time requested on each extension.
    pub extension: Duration,
    /// Time between extensions. Must be shorter than `extension`.
    pub check_every: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            extension: Duration::from_secs(DEFAULT_EXTENSION_SECS),
            check_every: Duration::from_secs(DEFAULT_CHECK_EVERY_SECS),
        }
    }
}

/// Drive `work` to completion, extending the lease every
/// `config.check_every` while it runs.
///
/// Extension failures are logged; they never interrupt `work`.
pub async fn with_lease_extension<F>(extend: &ExtendLease, config: LeaseConfig, work: F) -> F::Output
where
    F: Future,
{
    tokio::pin!(work);
    let mut ticker = interval_at(Instant::now() + config.check_every, config.check_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            output = &mut work => return output,
            _ = ticker.tick() => {
                let extension_secs = config.extension.as_secs();
                match extend.extend(config.extension).await {
                    Ok(()) => tracing::debug!(extension_secs, "Extended processing lease"),
                    Err(e) => tracing::warn!(
                        extension_secs,
                        error = %format!("{e:#}"),
                        "Failed to extend processing lease"
                    ),
                }
            }
        }
    }
}
