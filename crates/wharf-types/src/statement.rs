//! Warehouse statement model.
//!
//! [`Statement`] is the full vocabulary the load engine speaks to a
//! warehouse. Rendering into a concrete SQL dialect is the executor's job.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::{BatchLocation, Compression, OriginRecord, ShreddedType};

/// Parameters shared by every copy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyParams {
    /// Folder the warehouse reads from.
    pub source: String,
    pub region: String,
    /// Role the warehouse assumes to read `source`.
    pub role_arn: String,
    pub compression: Compression,
}

/// A single operation issued to the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Begin,
    CheckManifest {
        base: BatchLocation,
    },
    CopyEvents {
        params: CopyParams,
    },
    CopyShreddedType {
        shredded_type: ShreddedType,
        params: CopyParams,
    },
    AppendManifest {
        base: BatchLocation,
        origin: Box<OriginRecord>,
    },
    Commit,
    Abort,
}

impl Statement {
    /// Payload-free discriminant of this statement.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Begin => StatementKind::Begin,
            Self::CheckManifest { .. } => StatementKind::CheckManifest,
            Self::CopyEvents { .. } => StatementKind::CopyEvents,
            Self::CopyShreddedType { .. } => StatementKind::CopyShreddedType,
            Self::AppendManifest { .. } => StatementKind::AppendManifest,
            Self::Commit => StatementKind::Commit,
            Self::Abort => StatementKind::Abort,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckManifest { base } => write!(f, "CHECK MANIFEST {base}"),
            Self::CopyEvents { params } => {
                write!(f, "COPY events FROM {} ({})", params.source, params.compression)
            }
            Self::CopyShreddedType {
                shredded_type,
                params,
            } => write!(
                f,
                "COPY {} FROM {} ({}, {})",
                shredded_type.schema.table_name(),
                params.source,
                shredded_type.format,
                params.compression
            ),
            Self::AppendManifest { base, .. } => write!(f, "APPEND MANIFEST {base}"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Discriminant of [`Statement`], used in logs, errors, and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Begin,
    CheckManifest,
    CopyEvents,
    CopyShreddedType,
    AppendManifest,
    Commit,
    Abort,
}

impl StatementKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "BEGIN",
            Self::CheckManifest => "CHECK MANIFEST",
            Self::CopyEvents => "COPY EVENTS",
            Self::CopyShreddedType => "COPY SHREDDED TYPE",
            Self::AppendManifest => "APPEND MANIFEST",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
