//! Load stage and loader status model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::BatchLocation;

/// Step of the load protocol currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "entity", rename_all = "snake_case")]
pub enum Stage {
    Begin,
    CheckManifest,
    /// Copying one data entity (`events` or a shredded type's table).
    Copy(String),
    AppendManifest,
    Commit,
    Abort,
    /// Sleeping before restarting after a failed commit.
    BackingOff,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("begin"),
            Self::CheckManifest => f.write_str("check_manifest"),
            Self::Copy(entity) => write!(f, "copy({entity})"),
            Self::AppendManifest => f.write_str("append_manifest"),
            Self::Commit => f.write_str("commit"),
            Self::Abort => f.write_str("abort"),
            Self::BackingOff => f.write_str("backing_off"),
        }
    }
}

/// Progress of one in-flight load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub stage: Stage,
    /// When the load of this batch started.
    pub since: DateTime<Utc>,
}

/// What the loader is doing right now.
///
/// `Paused` takes precedence over in-flight loads; `Loading` shows the
/// longest-running one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading {
        base: BatchLocation,
        stage: Stage,
        since: DateTime<Utc>,
    },
    Paused {
        reason: String,
    },
}
