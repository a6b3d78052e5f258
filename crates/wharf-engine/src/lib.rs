//! Exactly-once batch loading for the wharf loader.
//!
//! [`Loader`] runs the transaction protocol for one batch, [`Worker`]
//! wraps it with lease keep-alive and failure bookkeeping, and
//! [`RetryQueue`] resubmits failed batches from the ledger.

pub mod config;
pub mod env;
pub mod errors;
pub mod lease;
pub mod load;
pub mod message;
pub mod monitoring;
pub mod retry_queue;
mod transaction;
pub mod worker;

pub use env::{
    Clock, Monitoring, Sleeper, StageReporter, StatementResult, SystemClock, TokioSleeper,
    Warehouse,
};
pub use errors::LoadError;
pub use lease::LeaseConfig;
pub use load::{LoadOutcome, LoadSettings, Loader};
pub use message::{Ack, BatchMessage, ExtendLease};
pub use monitoring::{Alert, TracingMonitoring};
pub use retry_queue::{Rediscover, RetryQueue};
pub use worker::{Processed, Worker};
