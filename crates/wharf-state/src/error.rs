//! Engine state error types.

/// Errors produced by [`SharedState`](crate::SharedState) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Internal mutex was poisoned by a panicked thread.
    #[error("engine state lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
