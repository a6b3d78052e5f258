//! Retry queue driver.
//!
//! Periodically scans the failure ledger for batches whose last failure is
//! older than the retry interval, rediscovers them, and resubmits them to
//! the workers. Also drains the global attempt counter into monitoring.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use wharf_state::{ledger, SharedState, StateError};
use wharf_types::{BatchLocation, DiscoveredBatch, FailureDisposition, RetryQueueConfig};

use crate::env::{Clock, Monitoring};
use crate::message::BatchMessage;
use crate::monitoring::Alert;

/// Rebuilds a [`DiscoveredBatch`] from its storage location.
pub trait Rediscover: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns an error if the batch can no longer be found or read.
    fn rediscover(
        &self,
        base: &BatchLocation,
    ) -> impl Future<Output = anyhow::Result<DiscoveredBatch>> + Send;
}

pub struct RetryQueue<R, M, C> {
    config: RetryQueueConfig,
    state: Arc<SharedState>,
    rediscover: Arc<R>,
    monitoring: Arc<M>,
    clock: C,
}

impl<R, M, C> RetryQueue<R, M, C>
where
    R: Rediscover,
    M: Monitoring,
    C: Clock,
{
    pub fn new(
        config: RetryQueueConfig,
        state: Arc<SharedState>,
        rediscover: Arc<R>,
        monitoring: Arc<M>,
        clock: C,
    ) -> Self {
        Self {
            config,
            state,
            rediscover,
            monitoring,
            clock,
        }
    }

    /// Run one scan cycle and return the messages to resubmit.
    ///
    /// Nothing is resubmitted while the loader is paused. A batch that
    /// cannot be rediscovered counts as another failure in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the shared state is unusable.
    pub async fn scan(&self) -> Result<Vec<BatchMessage>, StateError> {
        self.monitoring
            .report_attempts(self.state.get_and_reset_attempts()?);

        if ledger::is_over_capacity(&self.config, &self.state)? {
            self.monitoring.alert(&Alert::CapacityExceeded {
                tracked: ledger::failure_count(&self.state)?,
                size: self.config.size,
            });
        }

        if self.state.is_paused()? {
            tracing::info!("Loader paused, skipping retry scan");
            return Ok(Vec::new());
        }

        let due = ledger::due_failures(&self.config, &self.state, self.clock.now())?;
        let mut messages = Vec::with_capacity(due.len());
        for (base, failure) in due {
            match self.rediscover.rediscover(&base).await {
                Ok(batch) => {
                    tracing::info!(
                        base = %base,
                        attempts = failure.attempts,
                        last_error = %failure.last_error,
                        "Resubmitting failed batch"
                    );
                    messages.push(BatchMessage::unsourced(batch));
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    tracing::warn!(base = %base, error = %error, "Rediscovery failed");
                    self.monitoring.alert(&Alert::RediscoveryFailed {
                        base: base.clone(),
                        error: error.clone(),
                    });
                    let disposition = ledger::add_failure(
                        &self.config,
                        &self.state,
                        &base,
                        &error,
                        self.clock.now(),
                    )?;
                    if let FailureDisposition::GaveUp { attempts } = disposition {
                        self.monitoring.alert(&Alert::GaveUp {
                            base,
                            attempts,
                            last_error: error,
                        });
                    }
                }
            }
        }
        Ok(messages)
    }

    /// Scan every `config.interval` and forward resubmissions to `sink`
    /// until every receiver is gone.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if the shared state is unusable.
    pub async fn run(self, sink: mpsc::Sender<BatchMessage>) -> Result<(), StateError> {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be due yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = sink.closed() => {
                    tracing::info!("Retry queue consumers gone, stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    for message in self.scan().await? {
                        if sink.send(message).await.is_err() {
                            tracing::info!("Retry queue consumers gone, stopping");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
