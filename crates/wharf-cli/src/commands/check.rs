use std::path::Path;

use anyhow::{Context, Result};

use wharf_engine::config::{parser, validator};

/// Execute the `check` command: validate the loader config and print the
/// effective retry and lease policy.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;

    validator::validate_config(&config)?;
    println!("Config structure:  OK");

    let retry = config.retry_queue_config();
    let lease = config.lease_config();
    println!("{:18} {}", "Region:", config.region);
    println!("{:18} {}", "Schema:", config.storage.schema);
    println!("{:18} {}s", "Commit backoff:", retry.backoff_period.as_secs());
    println!("{:18} {}s", "Retry interval:", retry.interval.as_secs());
    println!("{:18} {}", "Retry size:", retry.size);
    println!("{:18} {}", "Max attempts:", retry.max_attempts);
    println!(
        "{:18} {}s every {}s",
        "Lease extension:",
        lease.extension.as_secs(),
        lease.check_every.as_secs()
    );

    println!("\nAll checks passed.");
    Ok(())
}
