//! Exactly-once load protocol.
//!
//! One protocol run is `Begin`, `CheckManifest`, then either `Abort` (the
//! batch is already in the manifest) or the copy statements,
//! `AppendManifest`, and `Commit`. A failed commit is aborted, backed off,
//! and the whole run is repeated once. Copy statements are only issued
//! after the manifest check in the same transaction came back empty.

use std::sync::Arc;
use std::time::Duration;

use wharf_state::SharedState;
use wharf_types::{
    BatchLocation, CopyParams, DiscoveredBatch, ManifestRecord, Stage, Statement, StatementKind,
};

use crate::env::{Clock, Monitoring, Sleeper, StageReporter, StatementResult, Warehouse};
use crate::errors::LoadError;
use crate::message::BatchMessage;
use crate::transaction::Transaction;

/// Protocol runs per `load` call: the first one plus one retry after a
/// failed commit.
const MAX_COMMIT_ATTEMPTS: u32 = 2;

/// Warehouse-side settings used to build copy statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSettings {
    pub region: String,
    pub role_arn: String,
    /// Delay between an aborted commit and the protocol restart.
    pub backoff_period: Duration,
}

/// Result of a successful `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The batch committed on protocol run number `attempts`.
    Loaded { attempts: u32 },
    /// The manifest already had the batch; nothing was copied.
    Skipped { record: Box<ManifestRecord> },
}

/// How a single protocol run ended without a load-level error.
enum RunOutcome {
    Committed,
    AlreadyLoaded(ManifestRecord),
}

/// How a single protocol run failed.
enum RunError {
    /// Commit failed; the transaction was aborted and the run may be
    /// repeated.
    Commit(anyhow::Error),
    /// Anything else; surfaced to the caller as-is.
    Fatal(LoadError),
}

impl From<LoadError> for RunError {
    fn from(e: LoadError) -> Self {
        Self::Fatal(e)
    }
}

/// Drives the load protocol against injected capabilities.
pub struct Loader<W, M, C, S> {
    warehouse: Arc<W>,
    monitoring: Arc<M>,
    clock: C,
    sleeper: S,
    state: Arc<SharedState>,
    settings: LoadSettings,
}

impl<W, M, C, S> Loader<W, M, C, S>
where
    W: Warehouse,
    M: Monitoring,
    C: Clock,
    S: Sleeper,
{
    pub fn new(
        warehouse: Arc<W>,
        monitoring: Arc<M>,
        clock: C,
        sleeper: S,
        state: Arc<SharedState>,
        settings: LoadSettings,
    ) -> Self {
        Self {
            warehouse,
            monitoring,
            clock,
            sleeper,
            state,
            settings,
        }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    #[must_use]
    pub fn monitoring(&self) -> &Arc<M> {
        &self.monitoring
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Load one batch exactly once.
    ///
    /// On a commit or a manifest skip the message is acknowledged; a failing
    /// acknowledgment is logged and never undoes the load. On error the
    /// message is left unacknowledged for the caller to handle.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Statement`] when a non-commit statement fails,
    /// [`LoadError::Commit`] when the commit failed on both protocol runs,
    /// and [`LoadError::State`] when the shared state is poisoned.
    pub async fn load(
        &self,
        reporter: &dyn StageReporter,
        message: &mut BatchMessage,
    ) -> Result<LoadOutcome, LoadError> {
        let batch = &message.batch;
        let base = batch.base();
        tracing::info!(
            base = %base,
            shredded_types = batch.shredded_types.len(),
            "Loading batch"
        );

        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            match self.run_protocol(reporter, batch).await {
                Ok(RunOutcome::Committed) => break LoadOutcome::Loaded { attempts: attempt },
                Ok(RunOutcome::AlreadyLoaded(record)) => {
                    break LoadOutcome::Skipped {
                        record: Box::new(record),
                    }
                }
                Err(RunError::Commit(cause)) if attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(
                        base = %base,
                        attempt,
                        backoff = ?self.settings.backoff_period,
                        error = %format!("{cause:#}"),
                        "Commit failed, transaction aborted, will retry"
                    );
                    reporter.report(base, Stage::BackingOff);
                    self.sleeper.sleep(self.settings.backoff_period).await;
                }
                Err(RunError::Commit(cause)) => {
                    tracing::error!(
                        base = %base,
                        attempt,
                        error = %format!("{cause:#}"),
                        "Commit failed on retry, giving up this load"
                    );
                    return Err(LoadError::Commit {
                        base: base.clone(),
                        attempts: attempt,
                        cause,
                    });
                }
                Err(RunError::Fatal(e)) => return Err(e),
            }
        };

        match &outcome {
            LoadOutcome::Loaded { attempts } => {
                let loaded_at = self.clock.now();
                self.state.increment_loaded()?;
                self.monitoring.tick(batch, loaded_at);
                tracing::info!(base = %base, attempts, "Batch committed");
            }
            LoadOutcome::Skipped { record } => {
                tracing::info!(
                    base = %base,
                    ingested_at = %record.ingested_at,
                    "Batch already in manifest, skipping"
                );
            }
        }

        if let Err(e) = message.ack.acknowledge().await {
            tracing::error!(
                base = %message.batch.base(),
                error = %format!("{e:#}"),
                "Failed to acknowledge message after load"
            );
        }

        Ok(outcome)
    }

    /// One pass over the protocol inside a single transaction.
    async fn run_protocol(
        &self,
        reporter: &dyn StageReporter,
        batch: &DiscoveredBatch,
    ) -> Result<RunOutcome, RunError> {
        let base = batch.base();

        reporter.report(base, Stage::Begin);
        self.state.increment_attempts().map_err(LoadError::from)?;
        let mut tx = Transaction::begin(&self.warehouse, base)
            .await
            .map_err(|cause| statement_error(base, StatementKind::Begin, cause))?;

        reporter.report(base, Stage::CheckManifest);
        let check = Statement::CheckManifest { base: base.clone() };
        let existing = match tx.execute(&check).await {
            Ok(StatementResult::Manifest(existing)) => existing,
            Ok(StatementResult::Applied) => {
                tx.abort().await;
                return Err(LoadError::UnexpectedResult {
                    base: base.clone(),
                    kind: StatementKind::CheckManifest,
                }
                .into());
            }
            Err(cause) => {
                tx.abort().await;
                return Err(statement_error(base, StatementKind::CheckManifest, cause).into());
            }
        };

        if let Some(record) = existing {
            reporter.report(base, Stage::Abort);
            tx.abort().await;
            return Ok(RunOutcome::AlreadyLoaded(record));
        }

        for (entity, statement) in self.copy_statements(batch) {
            reporter.report(base, Stage::Copy(entity));
            if let Err(cause) = tx.execute(&statement).await {
                tx.abort().await;
                return Err(statement_error(base, statement.kind(), cause).into());
            }
        }

        reporter.report(base, Stage::AppendManifest);
        let append = Statement::AppendManifest {
            base: base.clone(),
            origin: Box::new(batch.origin.clone()),
        };
        if let Err(cause) = tx.execute(&append).await {
            tx.abort().await;
            return Err(statement_error(base, StatementKind::AppendManifest, cause).into());
        }

        reporter.report(base, Stage::Commit);
        match tx.commit().await {
            Ok(()) => Ok(RunOutcome::Committed),
            Err(cause) => {
                reporter.report(base, Stage::Abort);
                tx.abort().await;
                Err(RunError::Commit(cause))
            }
        }
    }

    /// Copy statements in load order: primary events first, then each
    /// shredded type in discovery order. Paired with the entity name used
    /// for stage reporting.
    fn copy_statements(&self, batch: &DiscoveredBatch) -> Vec<(String, Statement)> {
        let params = |source: String| CopyParams {
            source,
            region: self.settings.region.clone(),
            role_arn: self.settings.role_arn.clone(),
            compression: batch.compression,
        };

        let mut statements = Vec::with_capacity(batch.shredded_types.len() + 1);
        statements.push((
            "events".to_string(),
            Statement::CopyEvents {
                params: params(batch.events_path()),
            },
        ));
        for shredded_type in &batch.shredded_types {
            statements.push((
                shredded_type.schema.table_name(),
                Statement::CopyShreddedType {
                    params: params(shredded_type.path(batch.base())),
                    shredded_type: shredded_type.clone(),
                },
            ));
        }
        statements
    }
}

fn statement_error(base: &BatchLocation, kind: StatementKind, cause: anyhow::Error) -> LoadError {
    LoadError::Statement {
        base: base.clone(),
        kind,
        cause,
    }
}
