//! Failure ledger operations.
//!
//! The ledger records which batches failed, how often, and when. It never
//! retries or performs I/O; the retry queue driver scans it and decides
//! what to resubmit.

use chrono::{DateTime, Utc};
use wharf_types::{BatchLocation, FailureDisposition, LoadFailure, RetryQueueConfig};

use crate::control::SharedState;
use crate::error;

/// Record a failed load of `base`.
///
/// Creates a record with one attempt for an untracked batch, otherwise
/// increments its attempts. When the attempts would exceed
/// `config.max_attempts` the record is removed and
/// [`FailureDisposition::GaveUp`] is returned so the caller can escalate.
///
/// The global load-attempt counter is not touched.
///
/// # Errors
///
/// Returns [`StateError::LockPoisoned`](crate::StateError::LockPoisoned)
/// if a writer panicked.
pub fn add_failure(
    config: &RetryQueueConfig,
    state: &SharedState,
    base: &BatchLocation,
    error: &str,
    now: DateTime<Utc>,
) -> error::Result<FailureDisposition> {
    let (disposition, tracked) = state.update(|s| {
        let disposition = match s.failures.remove(base) {
            None => {
                s.failures
                    .insert(base.clone(), LoadFailure::first(error, now));
                FailureDisposition::Tracked { attempts: 1 }
            }
            Some(existing) => {
                let updated = existing.record(error, now);
                let attempts = updated.attempts;
                if config.exceeded(attempts) {
                    FailureDisposition::GaveUp { attempts }
                } else {
                    s.failures.insert(base.clone(), updated);
                    FailureDisposition::Tracked { attempts }
                }
            }
        };
        (disposition, s.failures.len())
    })?;

    if disposition.added() && tracked > config.size {
        tracing::warn!(
            base = %base,
            tracked,
            size = config.size,
            "Retry queue is over capacity"
        );
    }

    Ok(disposition)
}

/// Stop tracking `base`, typically after it finally loaded.
///
/// Returns the removed record, if any.
///
/// # Errors
///
/// Returns [`StateError::LockPoisoned`](crate::StateError::LockPoisoned)
/// if a writer panicked.
pub fn clear_failure(
    state: &SharedState,
    base: &BatchLocation,
) -> error::Result<Option<LoadFailure>> {
    state.update(|s| s.failures.remove(base))
}

/// # Errors
///
/// Returns [`StateError::LockPoisoned`](crate::StateError::LockPoisoned)
/// if a writer panicked.
pub fn get_failure(
    state: &SharedState,
    base: &BatchLocation,
) -> error::Result<Option<LoadFailure>> {
    state.update(|s| s.failures.get(base).cloned())
}

/// # Errors
///
/// Returns [`StateError::LockPoisoned`](crate::StateError::LockPoisoned)
/// if a writer panicked.
pub fn failure_count(state: &SharedState) -> error::Result<usize> {
    state.update(|s| s.failures.len())
}

/// `true` if the ledger holds more batches than `config.size`.
///
/// # Errors
///
/// Returns [`StateError::LockPoisoned`](crate::StateError::LockPoisoned)
/// if a writer panicked.
pub fn is_over_capacity(config: &RetryQueueConfig, state: &SharedState) -> error::Result<bool> {
    Ok(failure_count(state)? > config.size)
}

/// Tracked failures whose last occurrence is at least `config.interval`
/// before `now`, oldest first.
///
/// # Errors
///
/// Returns [`StateError::LockPoisoned`](crate::StateError::LockPoisoned)
/// if a writer panicked.
pub fn due_failures(
    config: &RetryQueueConfig,
    state: &SharedState,
    now: DateTime<Utc>,
) -> error::Result<Vec<(BatchLocation, LoadFailure)>> {
    let mut due = state.update(|s| {
        s.failures
            .iter()
            .filter(|(_, failure)| {
                (now - failure.last_occurred_at)
                    .to_std()
                    .is_ok_and(|age| age >= config.interval)
            })
            .map(|(base, failure)| (base.clone(), failure.clone()))
            .collect::<Vec<_>>()
    })?;
    due.sort_by_key(|(_, failure)| failure.last_occurred_at);
    Ok(due)
}
