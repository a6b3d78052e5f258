//! Shared wharf model types: batches, warehouse statements, manifest
//! records, load failures, and retry policy.
//!
//! Pure data with no I/O, so the state, engine, and CLI crates can share
//! them without circular dependencies.

pub mod batch;
pub mod failure;
pub mod manifest;
pub mod retry;
pub mod stage;
pub mod statement;

pub use batch::{
    BatchLocation, Compression, DiscoveredBatch, OriginRecord, Processor, SchemaKey,
    ShreddedType, Timestamps, TypeFormat,
};
pub use failure::{FailureDisposition, LoadFailure};
pub use manifest::ManifestRecord;
pub use retry::RetryQueueConfig;
pub use stage::{LoadProgress, LoadStatus, Stage};
pub use statement::{CopyParams, Statement, StatementKind};
