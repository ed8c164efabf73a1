// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lock::LockConfig;
use crate::test_helpers::Harness;
use crate::workflow::TurnReport;
use deespec_adapters::cancel_pair;
use deespec_core::{Decision, HolderId, TaskId, TaskStatus};

fn runner(h: &Harness, holder: &str) -> Runner {
    let locks = Arc::new(LockService::new(
        Arc::clone(&h.store),
        h.clock_arc(),
        HolderId::new(holder),
        LockConfig::default(),
    ));
    Runner::new(
        h.resolver(),
        h.engine(),
        locks,
        h.clock_arc(),
        RunnerConfig {
            interval: Duration::from_millis(5),
            shutdown_grace: Duration::from_millis(200),
            ..RunnerConfig::default()
        },
    )
}

#[tokio::test]
async fn tick_with_nothing_ready_is_idle() {
    let h = Harness::new();
    let runner = runner(&h, "w1");
    let outcome = runner.tick(&CancelToken::none()).await.unwrap();
    assert_eq!(outcome, TickOutcome::Idle);
}

#[tokio::test]
async fn tick_drives_one_full_turn_and_releases_the_lock() {
    let h = Harness::new();
    h.create_sbi("s1", 2);
    h.agent.push_output("implementation");
    h.agent.push_output("SUCCEEDED");

    let runner = runner(&h, "w1");
    let outcome = runner.tick(&CancelToken::none()).await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Ran(TurnOutcome::Completed(TurnReport {
            decision: Decision::Succeeded,
            status: TaskStatus::Done,
            turn: 1,
        }))
    );

    // Lock released at end of turn
    assert!(runner.locks.list_run().unwrap().is_empty());

    // Scenario: pick + implement + review appear in the journal
    let steps: Vec<_> = h
        .journal
        .entries_for(&TaskId::new("s1"))
        .unwrap()
        .iter()
        .map(|r| r.step)
        .collect();
    assert_eq!(
        steps,
        [
            deespec_core::Step::Plan,
            deespec_core::Step::Implement,
            deespec_core::Step::Review
        ]
    );
}

#[tokio::test]
async fn tick_skips_when_lock_is_held_elsewhere() {
    let h = Harness::new();
    h.create_sbi("s1", 2);

    let other = Arc::new(LockService::new(
        Arc::clone(&h.store),
        h.clock_arc(),
        HolderId::new("other"),
        LockConfig::default(),
    ));
    other
        .acquire_run(&LockId::new("s1"), chrono::Duration::minutes(5))
        .unwrap()
        .unwrap();

    let runner = runner(&h, "w1");
    let outcome = runner.tick(&CancelToken::none()).await.unwrap();
    assert_eq!(outcome, TickOutcome::LockBusy(LockId::new("s1")));
}

#[tokio::test]
async fn stats_track_totals_and_errors() {
    let h = Harness::new();
    h.create_sbi("s1", 2);
    // Break the implement template so the tick fails as configuration
    std::fs::remove_file(h.ws.prompt_path("REVIEW.md")).unwrap();
    h.agent.push_output("implementation");

    let runner = runner(&h, "w1");
    let err = runner.tick(&CancelToken::none()).await.unwrap_err();
    let stop = runner.record(Err(err));
    assert!(!stop, "configuration errors keep the loop running");

    let stats = runner.stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.failure, 1);
    assert!(stats.last_error.as_deref().unwrap().contains("REVIEW.md"));
    assert!(stats.last_execution.is_some());
}

#[tokio::test]
async fn critical_errors_stop_the_loop() {
    let h = Harness::new();
    let runner = runner(&h, "w1");
    let stop = runner.record(Err(EngineError::Io(std::io::Error::other("disk"))));
    assert!(stop);
}

#[tokio::test]
async fn stats_snapshot_persists_and_loads() {
    let h = Harness::new();
    h.create_sbi("s1", 2);
    h.agent.push_output("implementation");
    h.agent.push_output("SUCCEEDED");

    let path = h.ws.runner_stats_path();
    let runner = runner(&h, "w1").with_stats_path(path.clone());
    let result = runner.tick(&CancelToken::none()).await;
    runner.record(result);

    let stats = load_stats(&path).unwrap().unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats, runner.stats());

    // Garbled or absent snapshots read as None, not as an error
    std::fs::write(&path, "not json").unwrap();
    assert!(load_stats(&path).unwrap().is_none());
    assert!(load_stats(&h.ws.base().join("missing.json"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn run_loop_executes_and_shuts_down_on_cancel() {
    let h = Harness::new();
    h.create_sbi("s1", 2);
    h.agent.push_output("implementation");
    h.agent.push_output("SUCCEEDED");

    let runner = Arc::new(runner(&h, "w1"));
    let (src, token) = cancel_pair();

    let loop_handle = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(token).await })
    };

    // Wait until the turn committed, then stop
    for _ in 0..200 {
        if h.load_sbi("s1").common.status == TaskStatus::Done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    src.cancel();
    tokio::time::timeout(Duration::from_secs(5), loop_handle)
        .await
        .expect("runner must stop promptly")
        .unwrap()
        .unwrap();

    assert_eq!(h.load_sbi("s1").common.status, TaskStatus::Done);
    assert!(runner.stats().total >= 1);
    // No abandoned locks after shutdown
    assert!(runner.locks.list_run().unwrap().is_empty());
}
