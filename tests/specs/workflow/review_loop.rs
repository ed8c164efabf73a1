//! Scenarios: review loop to success, and max-turns exhaustion.

use crate::prelude::Stack;
use deespec_adapters::CancelToken;
use deespec_core::{Decision, TaskId, TaskStatus};
use deespec_engine::TurnOutcome;

#[tokio::test]
async fn needs_changes_then_success() {
    let stack = Stack::new();
    stack.register_sbi("s1", 2, 1, &[]);
    stack.agent.push_output("first attempt");
    stack.agent.push_output("not there yet. NEEDS_CHANGES");
    stack.agent.push_output("second attempt");
    stack.agent.push_output("SUCCEEDED");

    let engine = stack.engine();
    let first = engine
        .run_turn(&TaskId::new("s1"), &CancelToken::none())
        .await
        .unwrap();
    match first {
        TurnOutcome::Completed(report) => {
            assert_eq!(report.decision, Decision::NeedsChanges);
            assert_eq!(report.status, TaskStatus::ReviewAndWip);
        }
        other => panic!("unexpected {other:?}"),
    }

    let second = engine
        .run_turn(&TaskId::new("s1"), &CancelToken::none())
        .await
        .unwrap();
    match second {
        TurnOutcome::Completed(report) => {
            assert_eq!(report.decision, Decision::Succeeded);
            assert_eq!(report.status, TaskStatus::Done);
            assert_eq!(report.turn, 2);
        }
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(stack.load_sbi("s1").execution.current_turn, 2);

    // The journal's statuses walk the allowed graph, REVIEW&WIP included
    let statuses: Vec<TaskStatus> = stack
        .journal
        .entries_for(&TaskId::new("s1"))
        .unwrap()
        .iter()
        .map(|r| r.status)
        .collect();
    assert!(statuses.contains(&TaskStatus::ReviewAndWip));
    assert_eq!(statuses.last(), Some(&TaskStatus::Done));
}

#[tokio::test]
async fn max_turns_reached_fails() {
    let stack = Stack::new();
    stack.register_sbi("s1", 1, 1, &[]);
    stack.agent.push_output("only attempt");
    stack.agent.push_output("NEEDS_CHANGES");

    let outcome = stack
        .engine()
        .run_turn(&TaskId::new("s1"), &CancelToken::none())
        .await
        .unwrap();
    match outcome {
        TurnOutcome::Completed(report) => assert_eq!(report.status, TaskStatus::Failed),
        other => panic!("unexpected {other:?}"),
    }

    let sbi = stack.load_sbi("s1");
    assert_eq!(sbi.common.status, TaskStatus::Failed);
    assert_eq!(
        sbi.execution.last_error.as_deref(),
        Some("max turns reached")
    );
}
