//! Manifest record model.
//!
//! The manifest is a warehouse-resident table with one row per batch that
//! has been durably applied. A row exists iff the batch's copy statements
//! committed at least once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::{BatchLocation, OriginRecord};

/// One row of the manifest table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub base: BatchLocation,
    pub ingested_at: DateTime<Utc>,
    pub origin: OriginRecord,
}

impl ManifestRecord {
    #[must_use]
    pub fn new(origin: OriginRecord, ingested_at: DateTime<Utc>) -> Self {
        Self {
            base: origin.base.clone(),
            ingested_at,
            origin,
        }
    }

    /// Serialized copy of the origin record, as stored in the manifest row.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin record cannot be encoded.
    pub fn origin_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.origin)
    }

    /// Rebuild a record from a stored manifest row.
    ///
    /// # Errors
    ///
    /// Returns an error if `origin_json` is not a valid origin record.
    pub fn from_row(
        base: BatchLocation,
        ingested_at: DateTime<Utc>,
        origin_json: &str,
    ) -> serde_json::Result<Self> {
        let origin = serde_json::from_str(origin_json)?;
        Ok(Self {
            base,
            ingested_at,
            origin,
        })
    }
}
