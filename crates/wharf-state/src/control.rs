//! Shared engine state.
//!
//! Uses a single `Mutex<EngineState>` so every read-then-write is one
//! indivisible unit. The lock is only taken inside synchronous methods and
//! is never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use wharf_types::{BatchLocation, LoadFailure, LoadProgress, LoadStatus, Stage};

use crate::error::{self, StateError};

/// Snapshot of the loader's process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    /// Reason the loader was paused, if it is.
    pub paused: Option<String>,
    /// Loads currently running, keyed by batch location.
    pub in_flight: BTreeMap<BatchLocation, LoadProgress>,
    /// Load attempts since the last [`SharedState::get_and_reset_attempts`].
    pub attempts: u64,
    /// Batches committed since start.
    pub loaded: u64,
    /// Messages received since start, from any source.
    pub messages: u64,
    /// Failure ledger keyed by batch location.
    pub failures: BTreeMap<BatchLocation, LoadFailure>,
}

impl EngineState {
    /// Derived loader status. A pause outlives any load that was already
    /// running when it was issued.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        if let Some(reason) = &self.paused {
            return LoadStatus::Paused {
                reason: reason.clone(),
            };
        }
        self.in_flight
            .iter()
            .min_by_key(|(_, progress)| progress.since)
            .map_or(LoadStatus::Idle, |(base, progress)| LoadStatus::Loading {
                base: base.clone(),
                stage: progress.stage.clone(),
                since: progress.since,
            })
    }
}

/// Concurrency-safe handle to [`EngineState`].
///
/// Share it behind an `Arc` between the workers and the retry queue.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<EngineState>,
}

impl SharedState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, EngineState>> {
        self.inner.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Clone the current state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn get(&self) -> error::Result<EngineState> {
        Ok(self.lock()?.clone())
    }

    /// Apply `transform` atomically and return its result.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn update<T>(&self, transform: impl FnOnce(&mut EngineState) -> T) -> error::Result<T> {
        let mut guard = self.lock()?;
        Ok(transform(&mut guard))
    }

    /// Return the global attempt counter and reset it to zero.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn get_and_reset_attempts(&self) -> error::Result<u64> {
        self.update(|state| std::mem::take(&mut state.attempts))
    }

    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn increment_attempts(&self) -> error::Result<u64> {
        self.update(|state| {
            state.attempts += 1;
            state.attempts
        })
    }

    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn increment_messages(&self) -> error::Result<u64> {
        self.update(|state| {
            state.messages += 1;
            state.messages
        })
    }

    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn increment_loaded(&self) -> error::Result<u64> {
        self.update(|state| {
            state.loaded += 1;
            state.loaded
        })
    }

    /// Record that `base` has entered `stage`.
    ///
    /// `since` is kept from the first stage of the same batch so it marks
    /// when the load started. Other in-flight loads and a pause are left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn set_stage(
        &self,
        base: &BatchLocation,
        stage: Stage,
        now: DateTime<Utc>,
    ) -> error::Result<()> {
        self.update(|state| {
            state
                .in_flight
                .entry(base.clone())
                .and_modify(|progress| progress.stage = stage.clone())
                .or_insert(LoadProgress { stage, since: now });
        })
    }

    /// Forget the in-flight load of `base` once it has finished, either way.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn finish_load(&self, base: &BatchLocation) -> error::Result<()> {
        self.update(|state| {
            state.in_flight.remove(base);
        })
    }

    /// Pause the loader, e.g. while the warehouse is under maintenance.
    ///
    /// Loads already running finish; no new load or retry starts until
    /// [`resume`](Self::resume).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn pause(&self, reason: impl Into<String>) -> error::Result<()> {
        let reason = reason.into();
        self.update(|state| state.paused = Some(reason))
    }

    /// Lift a pause. Has no effect on a loader that is not paused.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn resume(&self) -> error::Result<()> {
        self.update(|state| state.paused = None)
    }

    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn is_paused(&self) -> error::Result<bool> {
        Ok(self.lock()?.paused.is_some())
    }
}
