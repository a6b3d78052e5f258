//! Loader configuration file types.

use std::time::Duration;

use serde::Deserialize;
use wharf_types::retry::{
    DEFAULT_BACKOFF_PERIOD_SECS, DEFAULT_INTERVAL_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_SIZE,
};
use wharf_types::RetryQueueConfig;

use crate::lease::{LeaseConfig, DEFAULT_CHECK_EVERY_SECS, DEFAULT_EXTENSION_SECS};
use crate::load::LoadSettings;

/// Top-level loader configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    pub version: String,
    /// Region of the storage bucket the warehouse copies from.
    pub region: String,
    pub storage: StorageConfig,
    #[serde(default = "default_backoff_period_secs")]
    pub backoff_period_secs: u64,
    #[serde(default)]
    pub retry_queue: RetryQueueSection,
    #[serde(default)]
    pub lease: LeaseSection,
}

/// Target warehouse settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Schema holding the events, shredded, and manifest tables.
    pub schema: String,
    /// Role the warehouse assumes to read batch files.
    pub role_arn: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryQueueSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryQueueSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            size: DEFAULT_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaseSection {
    #[serde(default = "default_extension_secs")]
    pub extension_secs: u64,
    #[serde(default = "default_check_every_secs")]
    pub check_every_secs: u64,
}

impl Default for LeaseSection {
    fn default() -> Self {
        Self {
            extension_secs: DEFAULT_EXTENSION_SECS,
            check_every_secs: DEFAULT_CHECK_EVERY_SECS,
        }
    }
}

fn default_backoff_period_secs() -> u64 {
    DEFAULT_BACKOFF_PERIOD_SECS
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_size() -> usize {
    DEFAULT_SIZE
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_extension_secs() -> u64 {
    DEFAULT_EXTENSION_SECS
}

fn default_check_every_secs() -> u64 {
    DEFAULT_CHECK_EVERY_SECS
}

impl LoaderConfig {
    #[must_use]
    pub fn retry_queue_config(&self) -> RetryQueueConfig {
        RetryQueueConfig {
            interval: Duration::from_secs(self.retry_queue.interval_secs),
            size: self.retry_queue.size,
            max_attempts: self.retry_queue.max_attempts,
            backoff_period: Duration::from_secs(self.backoff_period_secs),
        }
    }

    #[must_use]
    pub fn lease_config(&self) -> LeaseConfig {
        LeaseConfig {
            extension: Duration::from_secs(self.lease.extension_secs),
            check_every: Duration::from_secs(self.lease.check_every_secs),
        }
    }

    #[must_use]
    pub fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            region: self.region.clone(),
            role_arn: self.storage.role_arn.clone(),
            backoff_period: Duration::from_secs(self.backoff_period_secs),
        }
    }
}
