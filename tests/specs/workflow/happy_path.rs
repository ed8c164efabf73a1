//! Scenario: one turn, review succeeds.

use crate::prelude::Stack;
use deespec_adapters::CancelToken;
use deespec_core::{Decision, Step, TaskId, TaskStatus};
use deespec_engine::runner::TickOutcome;
use deespec_engine::TurnOutcome;

#[tokio::test]
async fn single_turn_to_done() {
    let stack = Stack::new();
    stack.register_sbi("s1", 2, 1, &[]);
    stack.agent.push_output("implemented the change");
    stack.agent.push_output("verified. SUCCEEDED");

    let runner = stack.runner("worker-a");
    let outcome = runner.tick(&CancelToken::none()).await.unwrap();

    match outcome {
        TickOutcome::Ran(TurnOutcome::Completed(report)) => {
            assert_eq!(report.decision, Decision::Succeeded);
            assert_eq!(report.status, TaskStatus::Done);
            assert_eq!(report.turn, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let sbi = stack.load_sbi("s1");
    assert_eq!(sbi.common.status, TaskStatus::Done);
    assert_eq!(sbi.execution.current_turn, 1);

    // Journal: plan (with pick artifact), implement, review
    let entries = stack.journal.entries_for(&TaskId::new("s1")).unwrap();
    let steps: Vec<Step> = entries.iter().map(|r| r.step).collect();
    assert_eq!(steps, [Step::Plan, Step::Implement, Step::Review]);
    assert!(entries[0].has_artifact_kind("pick"));
    assert_eq!(entries[2].decision, Some(Decision::Succeeded));

    // Exactly one done marker
    assert!(stack
        .ws
        .sbi_dir(&TaskId::new("s1"))
        .join("done_1.md")
        .is_file());

    // The journal now counts s1 as complete: nothing left to pick
    let outcome = runner.tick(&CancelToken::none()).await.unwrap();
    assert_eq!(outcome, TickOutcome::Idle);
}
