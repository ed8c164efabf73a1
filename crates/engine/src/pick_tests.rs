// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::meta::TaskMeta;
use crate::test_helpers::Harness;
use chrono::Duration as ChronoDuration;
use deespec_core::{HolderId, JournalRecord};

fn meta(id: &str, por: Option<u32>, priority: Option<u32>) -> TaskMeta {
    let mut meta = TaskMeta::new(id);
    meta.por = por;
    meta.priority = priority;
    meta
}

fn mark_done(h: &Harness, id: &str) {
    let record = JournalRecord::new(
        h.clock.now_utc(),
        TaskId::new(id),
        1,
        Step::Review,
        TaskStatus::Done,
    )
    .with_artifact(deespec_core::ArtifactRef::path(format!(
        "specs/sbi/{id}/done_1.md"
    )));
    h.journal.append(&record).unwrap();
}

#[test]
fn empty_workspace_yields_no_task() {
    let h = Harness::new();
    let outcome = h.resolver().pick().unwrap();
    assert!(matches!(outcome, PickOutcome::NoTask { reason: None }));
}

#[test]
fn ordering_is_por_then_priority_then_id() {
    let h = Harness::new();
    h.write_meta(&meta("s-late", Some(2), Some(1)));
    h.write_meta(&meta("s-b", Some(1), Some(2)));
    h.write_meta(&meta("s-a", Some(1), Some(2)));
    h.write_meta(&meta("s-unset", None, None)); // sentinel 999 sorts last

    let outcome = h.resolver().pick().unwrap();
    let selection = outcome.selection().unwrap();
    assert_eq!(selection.task_id, TaskId::new("s-a"));
    assert!(selection.pick_reason.contains("por=1"));
}

#[test]
fn selection_appends_plan_record_with_pick_artifact() {
    let h = Harness::new();
    h.create_sbi("s1", 2);

    let outcome = h.resolver().pick().unwrap();
    assert_eq!(outcome.selection().unwrap().task_id, TaskId::new("s1"));

    let entries = h.journal.entries_for(&TaskId::new("s1")).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].step, Step::Plan);
    let pick = &entries[0].artifacts[0];
    assert_eq!(pick.object_kind(), Some("pick"));
    assert_eq!(pick.object_field("task_id"), Some("s1"));
}

#[test]
fn completed_tasks_are_skipped() {
    let h = Harness::new();
    h.write_meta(&meta("s1", Some(1), None));
    h.write_meta(&meta("s2", Some(2), None));
    mark_done(&h, "s1");

    let outcome = h.resolver().pick().unwrap();
    assert_eq!(outcome.selection().unwrap().task_id, TaskId::new("s2"));
}

#[test]
fn dependency_gates_until_done_and_drafts_once() {
    let h = Harness::new();
    let mut m = meta("s2", Some(1), None);
    m.depends_on = vec!["s1".into()];
    h.write_meta(&m);

    // s1 is not complete: no task, one feedback draft
    let resolver = h.resolver();
    let outcome = resolver.pick().unwrap();
    assert!(matches!(
        outcome,
        PickOutcome::NoTask {
            reason: Some(IncompleteReason::DepUnresolved)
        }
    ));
    let draft = h.ws.sbi_dir(&TaskId::new("s2")).join("fb_draft.yaml");
    assert!(draft.is_file());

    // Second pass does not draft again
    let before = h.journal.read_all().unwrap().len();
    resolver.pick().unwrap();
    assert_eq!(h.journal.read_all().unwrap().len(), before);

    // Once s1 completes, s2 becomes pickable
    mark_done(&h, "s1");
    let outcome = resolver.pick().unwrap();
    assert_eq!(outcome.selection().unwrap().task_id, TaskId::new("s2"));
}

#[test]
fn dependency_cycle_is_reported() {
    let h = Harness::new();
    let mut a = meta("s-a", Some(1), None);
    a.depends_on = vec!["s-b".into()];
    let mut b = meta("s-b", Some(1), None);
    b.depends_on = vec!["s-a".into()];
    h.write_meta(&a);
    h.write_meta(&b);

    let outcome = h.resolver().pick().unwrap();
    assert!(matches!(
        outcome,
        PickOutcome::NoTask {
            reason: Some(IncompleteReason::DepCycle)
        }
    ));
}

#[test]
fn cycle_does_not_block_unrelated_tasks() {
    let h = Harness::new();
    let mut a = meta("s-a", Some(1), None);
    a.depends_on = vec!["s-b".into()];
    let mut b = meta("s-b", Some(1), None);
    b.depends_on = vec!["s-a".into()];
    h.write_meta(&a);
    h.write_meta(&b);
    h.write_meta(&meta("s-free", Some(5), None));

    let outcome = h.resolver().pick().unwrap();
    assert_eq!(outcome.selection().unwrap().task_id, TaskId::new("s-free"));
}

#[test]
fn missing_meta_is_reported() {
    let h = Harness::new();
    std::fs::create_dir_all(h.ws.sbi_dir(&TaskId::new("bare"))).unwrap();

    let outcome = h.resolver().pick().unwrap();
    assert!(matches!(
        outcome,
        PickOutcome::NoTask {
            reason: Some(IncompleteReason::MetaMissing)
        }
    ));
    assert!(h
        .journal
        .has_marker_for("fb_sbi_draft", &TaskId::new("bare"))
        .unwrap());
}

#[test]
fn missing_template_is_prompt_error() {
    let h = Harness::new();
    h.write_meta(&meta("s1", None, None));
    std::fs::remove_file(h.ws.prompt_path("WIP.md")).unwrap();

    let outcome = h.resolver().pick().unwrap();
    assert!(matches!(
        outcome,
        PickOutcome::NoTask {
            reason: Some(IncompleteReason::PromptError)
        }
    ));
}

#[cfg(unix)]
#[test]
fn symlinked_spec_dir_is_path_invalid() {
    let h = Harness::new();
    let outside = tempfile::TempDir::new().unwrap();
    crate::meta::save_meta(outside.path(), &meta("sneaky", Some(1), None)).unwrap();
    std::os::unix::fs::symlink(outside.path(), h.ws.sbi_dir(&TaskId::new("sneaky"))).unwrap();

    let outcome = h.resolver().pick().unwrap();
    assert!(matches!(
        outcome,
        PickOutcome::NoTask {
            reason: Some(IncompleteReason::PathInvalid)
        }
    ));
}

#[test]
fn dead_holder_defers_via_journal_guard() {
    let h = Harness::new();
    h.create_sbi("s1", 2);

    let resolver = h.resolver();
    resolver.pick().unwrap(); // appends the plan/pick record

    // A run-lock row exists but its holder is dead (expired, unswept)
    h.store
        .with_tx(|tx| {
            deespec_storage::locks::acquire_run(
                tx,
                &deespec_core::LockId::new("s1"),
                &HolderId::new("dead-worker"),
                ChronoDuration::seconds(10),
                h.clock.now_utc(),
            )
        })
        .unwrap();
    h.clock.advance_secs(11);

    let outcome = resolver.pick().unwrap();
    assert!(matches!(
        outcome,
        PickOutcome::NoTask {
            reason: Some(IncompleteReason::JournalGuard)
        }
    ));
    // Journal-guard deferral never drafts feedback
    assert!(!h
        .journal
        .has_marker_for("fb_sbi_draft", &TaskId::new("s1"))
        .unwrap());

    // After the sweeper reclaims the row the task is pickable again
    h.store
        .with_conn(|c| deespec_storage::locks::sweep_expired(c, h.clock.now_utc()))
        .unwrap();
    let outcome = resolver.pick().unwrap();
    assert_eq!(outcome.selection().unwrap().task_id, TaskId::new("s1"));
}
