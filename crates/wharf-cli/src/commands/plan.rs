use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use wharf_engine::config::{parser, validator};
use wharf_engine::{
    BatchMessage, LoadOutcome, Loader, Processed, StatementResult, SystemClock, TokioSleeper,
    TracingMonitoring, Warehouse, Worker,
};
use wharf_state::SharedState;
use wharf_types::{BatchLocation, DiscoveredBatch, ManifestRecord, OriginRecord, Statement};

/// Stored manifest row: ingestion time and the origin record as JSON.
type ManifestRow = (DateTime<Utc>, String);

/// Warehouse stand-in that prints each statement and keeps manifest rows in
/// memory, so repeated notifications in one plan show up as skips.
#[derive(Default)]
struct DryRunWarehouse {
    manifest: Mutex<BTreeMap<BatchLocation, ManifestRow>>,
    pending: Mutex<Option<(BatchLocation, ManifestRow)>>,
}

impl DryRunWarehouse {
    fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
        mutex
            .lock()
            .map_err(|_| anyhow::anyhow!("dry-run warehouse lock poisoned"))
    }

    fn lookup(&self, base: &BatchLocation) -> Result<Option<ManifestRecord>> {
        let Some((ingested_at, origin_json)) = Self::lock(&self.manifest)?.get(base).cloned()
        else {
            return Ok(None);
        };
        let record = ManifestRecord::from_row(base.clone(), ingested_at, &origin_json)
            .with_context(|| format!("corrupt manifest row for {base}"))?;
        Ok(Some(record))
    }
}

impl Warehouse for DryRunWarehouse {
    async fn execute(&self, statement: &Statement) -> Result<StatementResult> {
        println!("    {statement}");
        match statement {
            Statement::CheckManifest { base } => Ok(StatementResult::Manifest(self.lookup(base)?)),
            Statement::AppendManifest { origin, .. } => {
                let record = ManifestRecord::new((**origin).clone(), Utc::now());
                let row = (record.ingested_at, record.origin_json()?);
                *Self::lock(&self.pending)? = Some((record.base, row));
                Ok(StatementResult::Applied)
            }
            Statement::Commit => {
                let pending = Self::lock(&self.pending)?.take();
                if let Some((base, row)) = pending {
                    Self::lock(&self.manifest)?.insert(base, row);
                }
                Ok(StatementResult::Applied)
            }
            Statement::Abort => {
                Self::lock(&self.pending)?.take();
                Ok(StatementResult::Applied)
            }
            Statement::Begin
            | Statement::CopyEvents { .. }
            | Statement::CopyShreddedType { .. } => Ok(StatementResult::Applied),
        }
    }
}

fn read_notifications(path: &Path) -> Result<Vec<OriginRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batches file: {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid batch notification", path.display(), i + 1))
        })
        .collect()
}

/// Execute the `plan` command: run every notification through the load
/// protocol against a dry-run warehouse.
pub async fn execute(config_path: &Path, batches_path: &Path) -> Result<()> {
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    validator::validate_config(&config)?;

    let notifications = read_notifications(batches_path)?;

    let state = Arc::new(SharedState::new());
    let loader = Arc::new(Loader::new(
        Arc::new(DryRunWarehouse::default()),
        Arc::new(TracingMonitoring),
        SystemClock,
        TokioSleeper,
        Arc::clone(&state),
        config.load_settings(),
    ));
    let worker = Worker::new(loader, config.retry_queue_config(), config.lease_config());

    for origin in notifications {
        let batch = DiscoveredBatch::from_origin(origin);
        println!("{}", batch.base());
        let status = match worker.process(BatchMessage::unsourced(batch)).await? {
            Processed::Loaded(LoadOutcome::Loaded { .. }) => "LOADED".to_string(),
            Processed::Loaded(LoadOutcome::Skipped { .. }) => {
                "SKIPPED (already in manifest)".to_string()
            }
            Processed::Failed(disposition) => format!(
                "FAILED (attempt {}, {})",
                disposition.attempts(),
                if disposition.added() {
                    "queued for retry"
                } else {
                    "gave up"
                }
            ),
        };
        println!("  => {status}");
    }

    let summary = state.get()?;
    println!(
        "\n{} notifications, {} loaded, {} load attempts",
        summary.messages, summary.loaded, summary.attempts
    );
    Ok(())
}
