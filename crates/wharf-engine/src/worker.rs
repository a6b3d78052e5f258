//! Consumer loop feeding batch messages through the loader.
//!
//! The worker owns the policy around a single `load`: lease keep-alive,
//! message counting, and handing failures to the ledger. Several workers
//! may share one [`SharedState`](wharf_state::SharedState), for example
//! one draining the primary notification source and one draining the
//! retry queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wharf_state::{ledger, StateError};
use wharf_types::{FailureDisposition, RetryQueueConfig};

use crate::env::{Clock, Monitoring, Sleeper, Warehouse};
use crate::errors::LoadError;
use crate::lease::{with_lease_extension, LeaseConfig};
use crate::load::{LoadOutcome, Loader};
use crate::message::BatchMessage;
use crate::monitoring::Alert;

const PAUSE_POLL: Duration = Duration::from_secs(5);

/// What happened to one processed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    Loaded(LoadOutcome),
    /// The load failed and the failure was recorded in the ledger.
    Failed(FailureDisposition),
}

pub struct Worker<W, M, C, S> {
    loader: Arc<Loader<W, M, C, S>>,
    retry: RetryQueueConfig,
    lease: LeaseConfig,
}

impl<W, M, C, S> Worker<W, M, C, S>
where
    W: Warehouse,
    M: Monitoring,
    C: Clock,
    S: Sleeper,
{
    pub fn new(loader: Arc<Loader<W, M, C, S>>, retry: RetryQueueConfig, lease: LeaseConfig) -> Self {
        Self {
            loader,
            retry,
            lease,
        }
    }

    /// Load one message and settle its bookkeeping.
    ///
    /// A failed load is recorded with [`ledger::add_failure`]; a give-up
    /// raises [`Alert::GaveUp`]. Either way the source message is then
    /// acknowledged, since the retry queue now owns the batch.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the shared state is unusable.
    pub async fn process(&self, mut message: BatchMessage) -> Result<Processed, StateError> {
        let state = Arc::clone(self.loader.state());
        while state.is_paused()? {
            self.loader.sleeper().sleep(PAUSE_POLL).await;
        }
        state.increment_messages()?;

        let base = message.batch.base().clone();
        let extend = message.extend.clone();
        let result = with_lease_extension(
            &extend,
            self.lease,
            self.loader.load(state.as_ref(), &mut message),
        )
        .await;
        state.finish_load(&base)?;

        match result {
            Ok(outcome) => {
                if let Some(previous) = ledger::clear_failure(&state, &base)? {
                    tracing::info!(
                        base = %base,
                        previous_attempts = previous.attempts,
                        "Previously failed batch recovered"
                    );
                }
                Ok(Processed::Loaded(outcome))
            }
            Err(LoadError::State(e)) => Err(e),
            Err(e) => {
                let error = e.to_string();
                let disposition = ledger::add_failure(
                    &self.retry,
                    &state,
                    &base,
                    &error,
                    self.loader.clock().now(),
                )?;
                match disposition {
                    FailureDisposition::Tracked { attempts } => tracing::warn!(
                        base = %base,
                        attempts,
                        max_attempts = self.retry.max_attempts,
                        error = %error,
                        "Load failed, batch added to retry queue"
                    ),
                    FailureDisposition::GaveUp { attempts } => {
                        tracing::error!(
                            base = %base,
                            attempts,
                            error = %error,
                            "Load failed too many times, no further retries"
                        );
                        self.loader.monitoring().alert(&Alert::GaveUp {
                            base: base.clone(),
                            attempts,
                            last_error: error,
                        });
                    }
                }
                if let Err(e) = message.ack.acknowledge().await {
                    tracing::error!(
                        base = %base,
                        error = %format!("{e:#}"),
                        "Failed to acknowledge message after recording failure"
                    );
                }
                Ok(Processed::Failed(disposition))
            }
        }
    }

    /// Process messages one at a time until the channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the shared state is unusable.
    pub async fn run(self, mut source: mpsc::Receiver<BatchMessage>) -> Result<(), StateError> {
        while let Some(message) = source.recv().await {
            self.process(message).await?;
        }
        tracing::info!("Message source closed, worker stopping");
        Ok(())
    }
}
