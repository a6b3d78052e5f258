//! Discovered batch model.
//!
//! A batch is a folder of processed event data in object storage,
//! announced complete by an upstream [`OriginRecord`]. Discovery turns the
//! notification into a [`DiscoveredBatch`], which the load engine consumes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Storage location of a batch (its `base` folder).
///
/// Always carries a trailing `/` so sub-paths can be appended directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BatchLocation(String);

impl BatchLocation {
    /// Create a new batch location, normalizing the trailing slash.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self(base)
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a relative path to this location.
    #[must_use]
    pub fn join(&self, relative: &str) -> String {
        format!("{}{}", self.0, relative.trim_start_matches('/'))
    }
}

impl fmt::Display for BatchLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BatchLocation {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for BatchLocation {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<BatchLocation> for String {
    fn from(value: BatchLocation) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Compression and formats
// ---------------------------------------------------------------------------

/// Compression applied to every file in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk format of a shredded type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFormat {
    Json,
    Tsv,
}

impl TypeFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Tsv => "tsv",
        }
    }
}

impl fmt::Display for TypeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Shredded types
// ---------------------------------------------------------------------------

/// Vendor/name/model triple identifying a self-describing schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaKey {
    pub vendor: String,
    pub name: String,
    pub model: u32,
}

impl SchemaKey {
    #[must_use]
    pub fn new(vendor: impl Into<String>, name: impl Into<String>, model: u32) -> Self {
        Self {
            vendor: vendor.into(),
            name: name.into(),
            model,
        }
    }

    /// Warehouse table name for this schema, e.g.
    /// `com.acme/LinkClick` model 1 becomes `com_acme_link_click_1`.
    #[must_use]
    pub fn table_name(&self) -> String {
        format!(
            "{}_{}_{}",
            snake_case(&self.vendor),
            snake_case(&self.name),
            self.model
        )
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vendor, self.name, self.model)
    }
}

fn snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower = false;
    for ch in input.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        } else {
            out.push('_');
            prev_lower = false;
        }
    }
    out
}

/// A secondary typed data stream inside a batch, loaded by its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShreddedType {
    pub schema: SchemaKey,
    pub format: TypeFormat,
}

impl ShreddedType {
    #[must_use]
    pub fn new(schema: SchemaKey, format: TypeFormat) -> Self {
        Self { schema, format }
    }

    /// Folder holding this type's files under `base`.
    #[must_use]
    pub fn path(&self, base: &BatchLocation) -> String {
        base.join(&format!(
            "output=good/vendor={}/name={}/format={}/model={}/",
            self.schema.vendor, self.schema.name, self.format, self.schema.model
        ))
    }
}

// ---------------------------------------------------------------------------
// Origin record
// ---------------------------------------------------------------------------

/// Processing timestamps carried by the completion notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub job_started: DateTime<Utc>,
    pub job_completed: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_collector_tstamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_collector_tstamp: Option<DateTime<Utc>>,
}

/// Identity of the upstream processor that produced the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    pub artifact: String,
    pub version: String,
}

/// The notification announcing that a batch is complete.
///
/// A serialized copy is stored in the manifest when the batch loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginRecord {
    pub base: BatchLocation,
    #[serde(default)]
    pub types: Vec<ShreddedType>,
    pub timestamps: Timestamps,
    #[serde(default)]
    pub compression: Compression,
    pub processor: Processor,
}

/// A batch ready to be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredBatch {
    pub origin: OriginRecord,
    /// Sub-entities in the order discovery supplied them.
    pub shredded_types: Vec<ShreddedType>,
    pub compression: Compression,
}

impl DiscoveredBatch {
    /// Build a batch that loads every type announced by `origin`.
    #[must_use]
    pub fn from_origin(origin: OriginRecord) -> Self {
        Self {
            shredded_types: origin.types.clone(),
            compression: origin.compression,
            origin,
        }
    }

    #[must_use]
    pub fn base(&self) -> &BatchLocation {
        &self.origin.base
    }

    /// Folder holding the primary event set.
    #[must_use]
    pub fn events_path(&self) -> String {
        self.base().join("output=good/")
    }
}
