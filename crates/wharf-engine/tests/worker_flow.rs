//! Worker bookkeeping around loads: ledger updates, give-up alerts, and
//! the consumer loop.

mod common;

use std::sync::Arc;

use common::{batch, message, Event, Harness};
use tokio::sync::mpsc;
use wharf_engine::{Alert, LeaseConfig, LoadOutcome, Processed, Worker};
use wharf_state::ledger;
use wharf_types::{FailureDisposition, LoadStatus, RetryQueueConfig, StatementKind};

fn worker(h: &Harness, max_attempts: u32) -> Worker<
    common::FakeWarehouse,
    common::FakeMonitoring,
    common::FakeClock,
    common::FakeSleeper,
> {
    let retry = RetryQueueConfig {
        max_attempts,
        ..RetryQueueConfig::default()
    };
    Worker::new(Arc::clone(&h.loader), retry, LeaseConfig::default())
}

#[tokio::test]
async fn successful_load_counts_message_and_returns_to_idle() {
    let h = Harness::new();
    let w = worker(&h, 3);

    let processed = w
        .process(message(batch("s3://bucket/run=1"), &h.recorder))
        .await
        .unwrap();

    assert_eq!(processed, Processed::Loaded(LoadOutcome::Loaded { attempts: 1 }));
    let state = h.state.get().unwrap();
    assert_eq!(state.messages, 1);
    assert_eq!(state.loaded, 1);
    assert_eq!(state.status(), LoadStatus::Idle);
    assert!(state.in_flight.is_empty());
    assert!(state.failures.is_empty());
}

#[tokio::test]
async fn failed_load_is_tracked_and_source_acked() {
    let h = Harness::new();
    h.warehouse.fail_on(StatementKind::CopyEvents);
    let w = worker(&h, 3);
    let b = batch("s3://bucket/run=1");
    let base = b.base().clone();

    let processed = w.process(message(b, &h.recorder)).await.unwrap();

    assert_eq!(
        processed,
        Processed::Failed(FailureDisposition::Tracked { attempts: 1 })
    );
    let failure = ledger::get_failure(&h.state, &base).unwrap().unwrap();
    assert_eq!(failure.attempts, 1);
    assert!(failure.last_error.contains("COPY EVENTS"), "got: {}", failure.last_error);
    assert_eq!(failure.first_occurred_at, common::t0());
    assert!(h.recorder.events().contains(&Event::Ack(base)));
}

#[tokio::test]
async fn repeated_failures_give_up_with_alert() {
    let h = Harness::new();
    h.warehouse.fail_commits(u32::MAX);
    let w = worker(&h, 2);
    let base = batch("s3://bucket/run=1").base().clone();

    for expected in 1..=2 {
        let processed = w
            .process(message(batch("s3://bucket/run=1"), &h.recorder))
            .await
            .unwrap();
        assert_eq!(
            processed,
            Processed::Failed(FailureDisposition::Tracked { attempts: expected })
        );
        h.clock.advance(chrono::Duration::minutes(15));
    }
    assert!(h.recorder.alerts().is_empty());

    let processed = w
        .process(message(batch("s3://bucket/run=1"), &h.recorder))
        .await
        .unwrap();

    assert_eq!(
        processed,
        Processed::Failed(FailureDisposition::GaveUp { attempts: 3 })
    );
    assert!(ledger::get_failure(&h.state, &base).unwrap().is_none());
    match h.recorder.alerts().as_slice() {
        [Alert::GaveUp {
            base: alerted,
            attempts,
            last_error,
        }] => {
            assert_eq!(alerted, &base);
            assert_eq!(*attempts, 3);
            assert!(last_error.contains("commit failed"), "got: {last_error}");
        }
        other => panic!("expected one give-up alert, got {other:?}"),
    }
}

#[tokio::test]
async fn recovered_batch_is_cleared_from_ledger() {
    let h = Harness::new();
    h.warehouse.fail_on(StatementKind::AppendManifest);
    let w = worker(&h, 3);
    let base = batch("s3://bucket/run=1").base().clone();

    w.process(message(batch("s3://bucket/run=1"), &h.recorder))
        .await
        .unwrap();
    assert_eq!(ledger::failure_count(&h.state).unwrap(), 1);

    h.warehouse.heal();
    let processed = w
        .process(message(batch("s3://bucket/run=1"), &h.recorder))
        .await
        .unwrap();

    assert!(matches!(processed, Processed::Loaded(_)));
    assert!(ledger::get_failure(&h.state, &base).unwrap().is_none());
}

#[tokio::test]
async fn global_attempts_and_ledger_attempts_are_independent() {
    let h = Harness::new();
    h.warehouse.fail_commits(2);
    let w = worker(&h, 3);

    w.process(message(batch("s3://bucket/run=1"), &h.recorder))
        .await
        .unwrap();

    // Two protocol runs, one recorded failure.
    let base = batch("s3://bucket/run=1").base().clone();
    assert_eq!(
        ledger::get_failure(&h.state, &base).unwrap().unwrap().attempts,
        1
    );
    assert_eq!(h.state.get_and_reset_attempts().unwrap(), 2);
    assert_eq!(h.state.get_and_reset_attempts().unwrap(), 0);
    assert_eq!(ledger::failure_count(&h.state).unwrap(), 1);
}

#[tokio::test]
async fn run_drains_channel_until_closed() {
    let h = Harness::new();
    let w = worker(&h, 3);
    let (tx, rx) = mpsc::channel(8);

    for i in 0..3 {
        tx.send(message(batch(&format!("s3://bucket/run={i}")), &h.recorder))
            .await
            .unwrap();
    }
    // Duplicate of run=0.
    tx.send(message(batch("s3://bucket/run=0"), &h.recorder))
        .await
        .unwrap();
    drop(tx);

    w.run(rx).await.unwrap();

    let state = h.state.get().unwrap();
    assert_eq!(state.messages, 4);
    assert_eq!(state.loaded, 3);
    assert_eq!(h.warehouse.manifest_len(), 3);
    let acks = h
        .recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Ack(_)))
        .count();
    assert_eq!(acks, 4);
}

#[tokio::test]
async fn notification_fixture_loads_each_batch_once() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures/batches/notifications.jsonl");
    let content = std::fs::read_to_string(path).unwrap();
    let h = Harness::new();
    let w = worker(&h, 3);

    let mut outcomes = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let origin: wharf_types::OriginRecord = serde_json::from_str(line).unwrap();
        let b = wharf_types::DiscoveredBatch::from_origin(origin);
        outcomes.push(w.process(message(b, &h.recorder)).await.unwrap());
    }

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(
        outcomes[2],
        Processed::Loaded(LoadOutcome::Skipped { .. })
    ));
    assert_eq!(h.warehouse.manifest_len(), 2);
    assert_eq!(h.state.get().unwrap().loaded, 2);
}

#[tokio::test]
async fn pause_issued_mid_load_outlives_the_load() {
    let h = Harness::new();
    let state = Arc::clone(&h.state);
    h.warehouse.on_statement(move |kind| {
        if kind == StatementKind::CheckManifest {
            state.pause("warehouse maintenance").unwrap();
        }
    });
    let w = worker(&h, 3);

    let processed = w
        .process(message(batch("s3://bucket/run=1"), &h.recorder))
        .await
        .unwrap();

    // The running load still commits; only new work is held back.
    assert_eq!(processed, Processed::Loaded(LoadOutcome::Loaded { attempts: 1 }));
    assert!(h.state.is_paused().unwrap());
    let state = h.state.get().unwrap();
    assert_eq!(
        state.status(),
        LoadStatus::Paused {
            reason: "warehouse maintenance".into()
        }
    );
    assert!(state.in_flight.is_empty());
}

#[tokio::test]
async fn finishing_one_load_leaves_another_in_flight() {
    let h = Harness::new();
    let w = worker(&h, 3);
    let other = batch("s3://bucket/run=2").base().clone();
    h.state
        .set_stage(&other, wharf_types::Stage::Copy("events".into()), common::t0())
        .unwrap();

    w.process(message(batch("s3://bucket/run=1"), &h.recorder))
        .await
        .unwrap();

    let state = h.state.get().unwrap();
    assert_eq!(state.in_flight.len(), 1);
    match state.status() {
        LoadStatus::Loading { base, stage, .. } => {
            assert_eq!(base, other);
            assert_eq!(stage, wharf_types::Stage::Copy("events".into()));
        }
        status => panic!("expected the other load to still show, got {status:?}"),
    }
}
