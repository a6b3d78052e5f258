//! Semantic validation for parsed loader configuration values.

use anyhow::{bail, Result};

use crate::config::types::LoaderConfig;

/// Validate a parsed loader configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the config.
pub fn validate_config(config: &LoaderConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported config version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.region.trim().is_empty() {
        errors.push("region must not be empty".to_string());
    }

    if config.storage.schema.trim().is_empty() {
        errors.push("storage.schema must not be empty".to_string());
    }

    if config.storage.role_arn.trim().is_empty() {
        errors.push("storage.role_arn must not be empty".to_string());
    } else if !config.storage.role_arn.starts_with("arn:") {
        errors.push(format!(
            "storage.role_arn '{}' is not an ARN",
            config.storage.role_arn
        ));
    }

    let retry = &config.retry_queue;
    if retry.interval_secs == 0 {
        errors.push("retry_queue.interval_secs must be at least 1".to_string());
    }
    if retry.size == 0 {
        errors.push("retry_queue.size must be at least 1".to_string());
    }
    if retry.max_attempts == 0 {
        errors.push("retry_queue.max_attempts must be at least 1".to_string());
    }

    let lease = &config.lease;
    if lease.check_every_secs == 0 {
        errors.push("lease.check_every_secs must be at least 1".to_string());
    }
    if lease.check_every_secs >= lease.extension_secs {
        errors.push(format!(
            "lease.check_every_secs ({}) must be less than lease.extension_secs ({})",
            lease.check_every_secs, lease.extension_secs
        ));
    }

    if !errors.is_empty() {
        bail!("Config validation failed:\n  - {}", errors.join("\n  - "));
    }

    Ok(())
}
