// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Store;
use deespec_core::{Clock, Epic, FakeClock, Sbi, TaskStatus};
use tempfile::TempDir;

fn store() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("deespec.db")).unwrap();
    (dir, store)
}

fn clock() -> FakeClock {
    FakeClock::new()
}

#[test]
fn insert_and_get_round_trip() {
    let (_dir, store) = store();
    let c = clock();
    let mut sbi = Sbi::new(TaskId::new("sbi-1"), "Add endpoint", None, &c).unwrap();
    sbi.labels = vec!["backend".into(), "api".into()];
    sbi.priority = Some(2);

    store
        .with_tx(|tx| insert(tx, &AnyTask::Sbi(sbi.clone())))
        .unwrap();

    let loaded = store.with_conn(|conn| get_sbi(conn, &TaskId::new("sbi-1"))).unwrap();
    assert_eq!(loaded, sbi);
}

#[test]
fn insert_links_child_into_parent_list() {
    let (_dir, store) = store();
    let c = clock();
    let epic = Epic::new(TaskId::new("epic-1"), "Billing", &c);
    let pbi = Pbi::new(TaskId::new("pbi-1"), "Invoices", Some(TaskId::new("epic-1")), &c)
        .unwrap();

    store.with_tx(|tx| insert(tx, &AnyTask::Epic(epic))).unwrap();
    store.with_tx(|tx| insert(tx, &AnyTask::Pbi(pbi))).unwrap();

    let parent = store.with_conn(|conn| get(conn, &TaskId::new("epic-1"))).unwrap();
    assert_eq!(parent.child_ids(), [TaskId::new("pbi-1")]);
    // Parent version bumped by the link
    assert_eq!(parent.common().version, 2);

    let child = store.with_conn(|conn| get(conn, &TaskId::new("pbi-1"))).unwrap();
    assert_eq!(child.common().parent_id, Some(TaskId::new("epic-1")));
}

#[test]
fn insert_rejects_hierarchy_violations() {
    let (_dir, store) = store();
    let c = clock();
    let epic = Epic::new(TaskId::new("epic-1"), "Billing", &c);
    store.with_tx(|tx| insert(tx, &AnyTask::Epic(epic))).unwrap();

    // SBI under an EPIC is invalid; bypass the typed constructor by
    // rewriting the parent to simulate a corrupted request.
    let mut sbi = Sbi::new(TaskId::new("sbi-1"), "t", None, &c).unwrap();
    sbi.common.parent_id = Some(TaskId::new("epic-1"));

    let err = store
        .with_tx(|tx| insert(tx, &AnyTask::Sbi(sbi)))
        .unwrap_err();
    assert!(matches!(err, StoreError::Task(_)), "got {err}");
}

#[test]
fn insert_rejects_missing_parent() {
    let (_dir, store) = store();
    let c = clock();
    let pbi = Pbi::new(TaskId::new("pbi-1"), "t", Some(TaskId::new("ghost")), &c).unwrap();
    let err = store
        .with_tx(|tx| insert(tx, &AnyTask::Pbi(pbi)))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "got {err}");
}

#[test]
fn update_cas_succeeds_with_current_version() {
    let (_dir, store) = store();
    let c = clock();
    let mut sbi = Sbi::new(TaskId::new("sbi-1"), "t", None, &c).unwrap();
    store
        .with_tx(|tx| insert(tx, &AnyTask::Sbi(sbi.clone())))
        .unwrap();

    sbi.common.update_status(TaskStatus::Picked, c.now_utc()).unwrap();
    let new_version = store
        .with_tx(|tx| update(tx, &AnyTask::Sbi(sbi.clone()), 1))
        .unwrap();
    assert_eq!(new_version, 2);

    let loaded = store.with_conn(|conn| get_sbi(conn, &TaskId::new("sbi-1"))).unwrap();
    assert_eq!(loaded.common.status, TaskStatus::Picked);
    assert_eq!(loaded.common.version, 2);
}

#[test]
fn update_cas_rejects_stale_version() {
    let (_dir, store) = store();
    let c = clock();
    let sbi = Sbi::new(TaskId::new("sbi-1"), "t", None, &c).unwrap();
    store
        .with_tx(|tx| insert(tx, &AnyTask::Sbi(sbi.clone())))
        .unwrap();
    store
        .with_tx(|tx| update(tx, &AnyTask::Sbi(sbi.clone()), 1))
        .unwrap();

    // Second writer still believes version 1
    let err = store
        .with_tx(|tx| update(tx, &AnyTask::Sbi(sbi.clone()), 1))
        .unwrap_err();
    assert!(err.is_version_conflict(), "got {err}");
}

#[test]
fn update_unknown_task_is_not_found() {
    let (_dir, store) = store();
    let c = clock();
    let sbi = Sbi::new(TaskId::new("ghost"), "t", None, &c).unwrap();
    let err = store
        .with_tx(|tx| update(tx, &AnyTask::Sbi(sbi), 1))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "got {err}");
}

#[test]
fn delete_refuses_live_children() {
    let (_dir, store) = store();
    let c = clock();
    let epic = Epic::new(TaskId::new("epic-1"), "t", &c);
    let pbi = Pbi::new(TaskId::new("pbi-1"), "t", Some(TaskId::new("epic-1")), &c).unwrap();
    store.with_tx(|tx| insert(tx, &AnyTask::Epic(epic))).unwrap();
    store.with_tx(|tx| insert(tx, &AnyTask::Pbi(pbi))).unwrap();

    let err = store
        .with_tx(|tx| delete(tx, &TaskId::new("epic-1")))
        .unwrap_err();
    assert!(matches!(err, StoreError::Task(_)), "got {err}");
}

#[test]
fn delete_unlinks_from_parent() {
    let (_dir, store) = store();
    let c = clock();
    let epic = Epic::new(TaskId::new("epic-1"), "t", &c);
    let pbi = Pbi::new(TaskId::new("pbi-1"), "t", Some(TaskId::new("epic-1")), &c).unwrap();
    store.with_tx(|tx| insert(tx, &AnyTask::Epic(epic))).unwrap();
    store.with_tx(|tx| insert(tx, &AnyTask::Pbi(pbi))).unwrap();

    store
        .with_tx(|tx| delete(tx, &TaskId::new("pbi-1")))
        .unwrap();

    let parent = store.with_conn(|conn| get(conn, &TaskId::new("epic-1"))).unwrap();
    assert!(parent.child_ids().is_empty());
    assert!(store
        .with_conn(|conn| get(conn, &TaskId::new("pbi-1")))
        .is_err());
}

#[test]
fn list_filters_by_kind() {
    let (_dir, store) = store();
    let c = clock();
    store
        .with_tx(|tx| insert(tx, &AnyTask::Epic(Epic::new(TaskId::new("e1"), "t", &c))))
        .unwrap();
    store
        .with_tx(|tx| {
            insert(
                tx,
                &AnyTask::Sbi(Sbi::new(TaskId::new("s1"), "t", None, &c).unwrap()),
            )
        })
        .unwrap();

    let all = store.with_conn(|conn| list(conn, None)).unwrap();
    assert_eq!(all.len(), 2);

    let sbis = store
        .with_conn(|conn| list(conn, Some(TaskKind::Sbi)))
        .unwrap();
    assert_eq!(sbis.len(), 1);
    assert_eq!(sbis[0].common().id, TaskId::new("s1"));
}

#[test]
fn status_counts_groups() {
    let (_dir, store) = store();
    let c = clock();
    for id in ["s1", "s2"] {
        store
            .with_tx(|tx| {
                insert(
                    tx,
                    &AnyTask::Sbi(Sbi::new(TaskId::new(id), "t", None, &c).unwrap()),
                )
            })
            .unwrap();
    }

    let counts = store.with_conn(status_counts).unwrap();
    assert_eq!(counts, vec![(TaskStatus::Pending, 2)]);
}
