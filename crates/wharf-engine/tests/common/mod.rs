//! Deterministic test doubles for the loader capabilities.
//!
//! Every double writes into one shared [`Recorder`] so tests can assert the
//! exact interleaving of statements, monitoring ticks, sleeps, and acks.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use wharf_engine::{
    Ack, Alert, BatchMessage, Clock, ExtendLease, LoadSettings, Loader, Monitoring, Rediscover,
    Sleeper, StageReporter, StatementResult, Warehouse,
};
use wharf_state::SharedState;
use wharf_types::{
    BatchLocation, Compression, DiscoveredBatch, ManifestRecord, OriginRecord, Processor,
    SchemaKey, ShreddedType, Stage, Statement, StatementKind, Timestamps, TypeFormat,
};

pub const BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Statement(StatementKind),
    Tick(BatchLocation),
    Ack(BatchLocation),
    Sleep(Duration),
    Alert(Alert),
    Attempts(u64),
}

#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<StatementKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Statement(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Alert(alert) => Some(alert),
                _ => None,
            })
            .collect()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Warehouse
// ---------------------------------------------------------------------------

type StatementHook = Box<dyn Fn(StatementKind) + Send + Sync>;

/// In-memory warehouse with a manifest table and injectable failures.
pub struct FakeWarehouse {
    recorder: Arc<Recorder>,
    manifest: Mutex<BTreeMap<BatchLocation, ManifestRecord>>,
    pending: Mutex<Option<ManifestRecord>>,
    commit_failures: AtomicU32,
    fail_on: Mutex<Option<StatementKind>>,
    on_statement: Mutex<Option<StatementHook>>,
    /// Copy statements issued, with their full payload.
    pub copies: Mutex<Vec<Statement>>,
}

impl FakeWarehouse {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self {
            recorder,
            manifest: Mutex::new(BTreeMap::new()),
            pending: Mutex::new(None),
            commit_failures: AtomicU32::new(0),
            fail_on: Mutex::new(None),
            on_statement: Mutex::new(None),
            copies: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` commits.
    pub fn fail_commits(&self, n: u32) {
        self.commit_failures.store(n, Ordering::SeqCst);
    }

    /// Fail every statement of `kind`.
    pub fn fail_on(&self, kind: StatementKind) {
        *self.fail_on.lock().unwrap() = Some(kind);
    }

    /// Run `hook` as each statement arrives, before it is applied.
    pub fn on_statement(&self, hook: impl Fn(StatementKind) + Send + Sync + 'static) {
        *self.on_statement.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn heal(&self) {
        *self.fail_on.lock().unwrap() = None;
        self.commit_failures.store(0, Ordering::SeqCst);
    }

    pub fn preload(&self, origin: OriginRecord) {
        let record = ManifestRecord::new(origin, t0());
        self.manifest
            .lock()
            .unwrap()
            .insert(record.base.clone(), record);
    }

    pub fn manifest_len(&self) -> usize {
        self.manifest.lock().unwrap().len()
    }

    pub fn contains(&self, base: &BatchLocation) -> bool {
        self.manifest.lock().unwrap().contains_key(base)
    }
}

impl Warehouse for FakeWarehouse {
    async fn execute(&self, statement: &Statement) -> anyhow::Result<StatementResult> {
        let kind = statement.kind();
        self.recorder.push(Event::Statement(kind));
        if let Some(hook) = self.on_statement.lock().unwrap().as_ref() {
            hook(kind);
        }

        if *self.fail_on.lock().unwrap() == Some(kind) {
            anyhow::bail!("injected {kind} failure");
        }

        match statement {
            Statement::CheckManifest { base } => Ok(StatementResult::Manifest(
                self.manifest.lock().unwrap().get(base).cloned(),
            )),
            Statement::CopyEvents { .. } | Statement::CopyShreddedType { .. } => {
                self.copies.lock().unwrap().push(statement.clone());
                Ok(StatementResult::Applied)
            }
            Statement::AppendManifest { origin, .. } => {
                *self.pending.lock().unwrap() = Some(ManifestRecord::new((**origin).clone(), t0()));
                Ok(StatementResult::Applied)
            }
            Statement::Commit => {
                let remaining = self.commit_failures.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.commit_failures.store(remaining - 1, Ordering::SeqCst);
                    anyhow::bail!("serializable isolation violation");
                }
                if let Some(record) = self.pending.lock().unwrap().take() {
                    self.manifest
                        .lock()
                        .unwrap()
                        .insert(record.base.clone(), record);
                }
                Ok(StatementResult::Applied)
            }
            Statement::Abort => {
                self.pending.lock().unwrap().take();
                Ok(StatementResult::Applied)
            }
            Statement::Begin => Ok(StatementResult::Applied),
        }
    }
}

// ---------------------------------------------------------------------------
// Monitoring, clock, sleeper, reporter
// ---------------------------------------------------------------------------

pub struct FakeMonitoring(pub Arc<Recorder>);

impl Monitoring for FakeMonitoring {
    fn tick(&self, batch: &DiscoveredBatch, _loaded_at: DateTime<Utc>) {
        self.0.push(Event::Tick(batch.base().clone()));
    }

    fn alert(&self, alert: &Alert) {
        self.0.push(Event::Alert(alert.clone()));
    }

    fn report_attempts(&self, attempts: u64) {
        self.0.push(Event::Attempts(attempts));
    }
}

/// Clock frozen at a settable instant.
#[derive(Clone)]
pub struct FakeClock(Arc<Mutex<DateTime<Utc>>>);

impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Records the requested delay and returns immediately.
pub struct FakeSleeper(pub Arc<Recorder>);

impl Sleeper for FakeSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.0.push(Event::Sleep(duration));
        std::future::ready(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub stages: Mutex<Vec<Stage>>,
}

impl RecordingReporter {
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.lock().unwrap().clone()
    }
}

impl StageReporter for RecordingReporter {
    fn report(&self, _base: &BatchLocation, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }
}

// ---------------------------------------------------------------------------
// Rediscovery
// ---------------------------------------------------------------------------

/// Rediscovers any base it has not been told to fail on.
#[derive(Default)]
pub struct FakeRediscover {
    pub missing: Mutex<Vec<BatchLocation>>,
}

impl Rediscover for FakeRediscover {
    async fn rediscover(&self, base: &BatchLocation) -> anyhow::Result<DiscoveredBatch> {
        if self.missing.lock().unwrap().contains(base) {
            anyhow::bail!("shredding_complete.json not found under {base}");
        }
        Ok(batch(base.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn origin(base: &str, types: Vec<ShreddedType>) -> OriginRecord {
    OriginRecord {
        base: BatchLocation::new(base),
        types,
        timestamps: Timestamps {
            job_started: t0() - chrono::Duration::minutes(10),
            job_completed: t0() - chrono::Duration::minutes(5),
            min_collector_tstamp: None,
            max_collector_tstamp: None,
        },
        compression: Compression::Gzip,
        processor: Processor {
            artifact: "shredder".into(),
            version: "1.2.0".into(),
        },
    }
}

pub fn link_click() -> ShreddedType {
    ShreddedType::new(SchemaKey::new("com.acme", "link_click", 1), TypeFormat::Tsv)
}

/// A batch with a single shredded type.
pub fn batch(base: &str) -> DiscoveredBatch {
    DiscoveredBatch::from_origin(origin(base, vec![link_click()]))
}

pub fn settings() -> LoadSettings {
    LoadSettings {
        region: "eu-central-1".into(),
        role_arn: "arn:aws:iam::123456789012:role/loader".into(),
        backoff_period: BACKOFF,
    }
}

/// A message whose ack records into `recorder`.
pub fn message(batch: DiscoveredBatch, recorder: &Arc<Recorder>) -> BatchMessage {
    let base = batch.base().clone();
    let recorder = Arc::clone(recorder);
    let ack = Ack::new(move || async move {
        recorder.push(Event::Ack(base));
        Ok::<(), anyhow::Error>(())
    });
    BatchMessage::new(batch, ack, ExtendLease::noop())
}

/// A message whose ack always fails.
pub fn message_with_failing_ack(batch: DiscoveredBatch) -> BatchMessage {
    let ack = Ack::new(|| async { Err::<(), _>(anyhow::anyhow!("receipt handle expired")) });
    BatchMessage::new(batch, ack, ExtendLease::noop())
}

pub type TestLoader = Loader<FakeWarehouse, FakeMonitoring, FakeClock, FakeSleeper>;

pub struct Harness {
    pub recorder: Arc<Recorder>,
    pub warehouse: Arc<FakeWarehouse>,
    pub state: Arc<SharedState>,
    pub clock: FakeClock,
    pub loader: Arc<TestLoader>,
}

impl Harness {
    pub fn new() -> Self {
        let recorder = Arc::new(Recorder::default());
        let warehouse = Arc::new(FakeWarehouse::new(Arc::clone(&recorder)));
        let state = Arc::new(SharedState::new());
        let clock = FakeClock::at(t0());
        let loader = Arc::new(Loader::new(
            Arc::clone(&warehouse),
            Arc::new(FakeMonitoring(Arc::clone(&recorder))),
            clock.clone(),
            FakeSleeper(Arc::clone(&recorder)),
            Arc::clone(&state),
            settings(),
        ));
        Self {
            recorder,
            warehouse,
            state,
            clock,
            loader,
        }
    }
}
