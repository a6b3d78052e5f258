//! Load failure tracking model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated failure history of one batch.
///
/// `first_occurred_at <= last_occurred_at` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Most recent failure cause.
    pub last_error: String,
    /// Number of failures recorded for this batch while tracked.
    pub attempts: u32,
    pub first_occurred_at: DateTime<Utc>,
    pub last_occurred_at: DateTime<Utc>,
}

impl LoadFailure {
    /// First recorded failure of a batch.
    #[must_use]
    pub fn first(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            last_error: error.into(),
            attempts: 1,
            first_occurred_at: now,
            last_occurred_at: now,
        }
    }

    /// Fold another failure into this record.
    ///
    /// `last_occurred_at` never moves backwards, even if `now` does.
    #[must_use]
    pub fn record(self, error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            last_error: error.into(),
            attempts: self.attempts.saturating_add(1),
            first_occurred_at: self.first_occurred_at,
            last_occurred_at: self.last_occurred_at.max(now),
        }
    }
}

/// Outcome of recording a failure in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum FailureDisposition {
    /// The batch is tracked and will be retried by the queue.
    Tracked { attempts: u32 },
    /// Attempts exceeded the maximum; the batch was dropped from the ledger.
    GaveUp { attempts: u32 },
}

impl FailureDisposition {
    /// `true` if the failure was recorded for a later retry.
    #[must_use]
    pub fn added(self) -> bool {
        matches!(self, Self::Tracked { .. })
    }

    #[must_use]
    pub fn attempts(self) -> u32 {
        match self {
            Self::Tracked { attempts } | Self::GaveUp { attempts } => attempts,
        }
    }
}
