//! Load error model.

use wharf_state::StateError;
use wharf_types::{BatchLocation, StatementKind};

/// Failure of a single `load` invocation.
///
/// Warehouse-side causes are opaque `anyhow` errors; the variant records
/// which step of the protocol produced them.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A non-commit statement failed. Not retried inside `load`.
    #[error("{kind} failed for {base}: {cause:#}")]
    Statement {
        base: BatchLocation,
        kind: StatementKind,
        cause: anyhow::Error,
    },
    /// Commit failed on every attempt, including the automatic retry.
    #[error("commit failed for {base} after {attempts} attempts: {cause:#}")]
    Commit {
        base: BatchLocation,
        attempts: u32,
        cause: anyhow::Error,
    },
    /// The warehouse answered a statement with the wrong kind of result.
    #[error("unexpected warehouse result for {kind} on {base}")]
    UnexpectedResult {
        base: BatchLocation,
        kind: StatementKind,
    },
    /// Shared engine state is unusable.
    #[error(transparent)]
    State(#[from] StateError),
}

impl LoadError {
    /// Returns `true` if the load exhausted its commit retry.
    #[must_use]
    pub fn is_commit_failure(&self) -> bool {
        matches!(self, Self::Commit { .. })
    }

    /// Statement kind that failed, if the failure came from the warehouse.
    #[must_use]
    pub fn statement_kind(&self) -> Option<StatementKind> {
        match self {
            Self::Statement { kind, .. } | Self::UnexpectedResult { kind, .. } => Some(*kind),
            Self::Commit { .. } => Some(StatementKind::Commit),
            Self::State(_) => None,
        }
    }
}
