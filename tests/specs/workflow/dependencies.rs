//! Scenario: dependency gating with a single feedback draft.

use crate::prelude::Stack;
use deespec_adapters::CancelToken;
use deespec_core::TaskId;
use deespec_engine::runner::TickOutcome;
use deespec_engine::{IncompleteReason, PickOutcome};

#[tokio::test]
async fn dependent_task_waits_for_its_dependency() {
    let stack = Stack::new();
    stack.register_sbi("s1", 2, 1, &[]);
    stack.register_sbi("s2", 2, 2, &["s1"]);

    // s1 is ready and ordered first; s2 is gated behind it
    let resolver = stack.resolver();
    let outcome = resolver.pick().unwrap();
    assert_eq!(
        outcome.selection().unwrap().task_id,
        TaskId::new("s1"),
        "s1 must be picked first"
    );

    // Run s1 to DONE
    stack.agent.push_output("impl s1");
    stack.agent.push_output("SUCCEEDED");
    stack
        .engine()
        .run_turn(&TaskId::new("s1"), &CancelToken::none())
        .await
        .unwrap();

    // Now s2 is the next pick
    let outcome = resolver.pick().unwrap();
    assert_eq!(outcome.selection().unwrap().task_id, TaskId::new("s2"));
}

#[tokio::test]
async fn unresolved_dependency_drafts_feedback_exactly_once() {
    let stack = Stack::new();
    // s2 depends on a task that exists nowhere
    stack.register_sbi("s2", 2, 1, &["s1"]);

    let runner = stack.runner("worker-a");
    let outcome = runner.tick(&CancelToken::none()).await.unwrap();
    assert_eq!(outcome, TickOutcome::Idle);

    let resolver = stack.resolver();
    match resolver.pick().unwrap() {
        PickOutcome::NoTask { reason } => {
            assert_eq!(reason, Some(IncompleteReason::DepUnresolved))
        }
        other => panic!("unexpected {other:?}"),
    }

    // Draft written once, not per pass
    let draft_markers = stack
        .journal
        .read_all()
        .unwrap()
        .iter()
        .filter(|r| r.has_artifact_kind("fb_sbi_draft"))
        .count();
    assert_eq!(draft_markers, 1);
    assert!(stack
        .ws
        .sbi_dir(&TaskId::new("s2"))
        .join("fb_draft.yaml")
        .is_file());

    // Completing s1 (journal-side) unblocks s2
    stack.register_sbi("s1", 2, 1, &[]);
    stack.agent.push_output("impl s1");
    stack.agent.push_output("SUCCEEDED");
    stack
        .engine()
        .run_turn(&TaskId::new("s1"), &CancelToken::none())
        .await
        .unwrap();

    let outcome = resolver.pick().unwrap();
    assert_eq!(outcome.selection().unwrap().task_id, TaskId::new("s2"));
}
