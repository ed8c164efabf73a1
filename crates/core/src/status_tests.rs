// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

const ALL_STATUSES: [TaskStatus; 7] = [
    TaskStatus::Pending,
    TaskStatus::Picked,
    TaskStatus::Implementing,
    TaskStatus::Reviewing,
    TaskStatus::ReviewAndWip,
    TaskStatus::Done,
    TaskStatus::Failed,
];

#[parameterized(
    pending_to_picked = { TaskStatus::Pending, TaskStatus::Picked },
    picked_to_implementing = { TaskStatus::Picked, TaskStatus::Implementing },
    implementing_to_reviewing = { TaskStatus::Implementing, TaskStatus::Reviewing },
    reviewing_to_done = { TaskStatus::Reviewing, TaskStatus::Done },
    reviewing_to_loop = { TaskStatus::Reviewing, TaskStatus::ReviewAndWip },
    loop_to_implementing = { TaskStatus::ReviewAndWip, TaskStatus::Implementing },
    reviewing_to_failed = { TaskStatus::Reviewing, TaskStatus::Failed },
)]
fn allowed_transition(from: TaskStatus, to: TaskStatus) {
    assert!(from.can_transition(to), "{from} -> {to} should be allowed");
}

#[parameterized(
    skip_picked = { TaskStatus::Pending, TaskStatus::Implementing },
    skip_to_done = { TaskStatus::Pending, TaskStatus::Done },
    out_of_done = { TaskStatus::Done, TaskStatus::Implementing },
    done_to_failed = { TaskStatus::Done, TaskStatus::Failed },
    out_of_failed = { TaskStatus::Failed, TaskStatus::Pending },
    backwards = { TaskStatus::Reviewing, TaskStatus::Picked },
)]
fn rejected_transition(from: TaskStatus, to: TaskStatus) {
    assert!(!from.can_transition(to), "{from} -> {to} should be rejected");
}

#[test]
fn terminal_statuses() {
    assert!(TaskStatus::Done.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(!TaskStatus::Reviewing.is_terminal());
}

#[test]
fn in_flight_statuses_match_lock_holding_states() {
    let in_flight: Vec<_> = ALL_STATUSES.iter().filter(|s| s.is_in_flight()).collect();
    assert_eq!(
        in_flight,
        [
            &TaskStatus::Picked,
            &TaskStatus::Implementing,
            &TaskStatus::Reviewing
        ]
    );
}

#[test]
fn status_serde_wire_names() {
    assert_eq!(
        serde_json::to_string(&TaskStatus::ReviewAndWip).unwrap(),
        r#""REVIEW&WIP""#
    );
    assert_eq!(
        serde_json::to_string(&TaskStatus::Pending).unwrap(),
        r#""PENDING""#
    );
    let parsed: TaskStatus = serde_json::from_str(r#""REVIEW&WIP""#).unwrap();
    assert_eq!(parsed, TaskStatus::ReviewAndWip);
}

#[test]
fn step_serde_is_lowercase() {
    assert_eq!(serde_json::to_string(&Step::Implement).unwrap(), r#""implement""#);
    let parsed: Step = serde_json::from_str(r#""plan""#).unwrap();
    assert_eq!(parsed, Step::Plan);
}

#[test]
fn decision_parse_finds_token() {
    assert_eq!(
        Decision::parse("Verdict: SUCCEEDED. All criteria met."),
        Some(Decision::Succeeded)
    );
    assert_eq!(
        Decision::parse("needs_changes - see notes"),
        Some(Decision::NeedsChanges)
    );
    assert_eq!(Decision::parse("the build FAILED"), Some(Decision::Failed));
    assert_eq!(Decision::parse("no verdict here"), None);
}

#[test]
fn decision_parse_first_match_wins() {
    // FAILED appears first even though SUCCEEDED is also present
    assert_eq!(
        Decision::parse("previously FAILED, now SUCCEEDED"),
        Some(Decision::Failed)
    );
    assert_eq!(
        Decision::parse("SUCCEEDED (earlier attempt FAILED)"),
        Some(Decision::Succeeded)
    );
}

#[test]
fn decision_parse_is_case_insensitive() {
    assert_eq!(Decision::parse("Succeeded"), Some(Decision::Succeeded));
    assert_eq!(Decision::parse("Needs_Changes"), Some(Decision::NeedsChanges));
}

proptest! {
    /// No sequence of allowed transitions leaves a terminal status or
    /// reaches Implementing without passing Picked.
    #[test]
    fn transition_paths_respect_guards(moves in proptest::collection::vec(0usize..7, 0..20)) {
        let mut status = TaskStatus::Pending;
        let mut picked_seen = false;
        for m in moves {
            let next = ALL_STATUSES[m];
            if status.can_transition(next) {
                prop_assert!(!status.is_terminal());
                if next == TaskStatus::Picked {
                    picked_seen = true;
                }
                if next == TaskStatus::Implementing {
                    prop_assert!(picked_seen, "reached IMPLEMENTING without PICKED");
                }
                status = next;
            }
        }
    }
}
