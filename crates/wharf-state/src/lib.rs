//! Process-wide engine state for the wharf loader.
//!
//! Provides [`SharedState`], the single mutual-exclusion boundary around
//! the global attempt counter, loader status, and the failure ledger, and
//! the [`ledger`] operations the retry queue is built on.

#![warn(clippy::pedantic)]

pub mod control;
pub mod error;
pub mod ledger;

pub use control::{EngineState, SharedState};
pub use error::StateError;
