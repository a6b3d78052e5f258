//! Capabilities injected into the load engine.
//!
//! Every side effect of the protocol goes through one of these traits so
//! tests can substitute deterministic doubles for the warehouse, monitoring,
//! wall clock, and timers.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use wharf_state::SharedState;
use wharf_types::{BatchLocation, DiscoveredBatch, ManifestRecord, Stage, Statement};

use crate::monitoring::Alert;

/// What the warehouse returned for a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementResult {
    /// The statement ran and produced no rows of interest.
    Applied,
    /// Answer to [`Statement::CheckManifest`].
    Manifest(Option<ManifestRecord>),
}

/// Executes statements against a warehouse connection.
///
/// Statements of one `load` arrive strictly in order; an implementation
/// backs them with a single connection so `Begin`..`Commit` share one
/// transaction.
pub trait Warehouse: Send + Sync + 'static {
    /// Execute one statement.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the statement failed.
    fn execute(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = anyhow::Result<StatementResult>> + Send;
}

/// Observability sink for load outcomes.
pub trait Monitoring: Send + Sync + 'static {
    /// A batch committed.
    fn tick(&self, batch: &DiscoveredBatch, loaded_at: DateTime<Utc>);

    /// Something an operator must look at.
    fn alert(&self, alert: &Alert);

    /// Load attempts counted since the previous report.
    fn report_attempts(&self, attempts: u64);
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Timer used for backoff.
pub trait Sleeper: Send + Sync + 'static {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Liveness callback invoked as the protocol moves between stages.
///
/// Reporting never fails from the caller's point of view.
pub trait StageReporter: Send + Sync {
    fn report(&self, base: &BatchLocation, stage: Stage);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

impl StageReporter for SharedState {
    fn report(&self, base: &BatchLocation, stage: Stage) {
        tracing::debug!(base = %base, stage = %stage, "Load stage");
        if let Err(e) = self.set_stage(base, stage, Utc::now()) {
            tracing::error!(base = %base, error = %e, "Failed to record load stage");
        }
    }
}
