//! Scenario: lock contention and crash reclaim across two workers.

use crate::prelude::Stack;
use chrono::Duration as ChronoDuration;
use deespec_core::{Clock, LockId, Task, TaskStatus};

#[test]
fn contention_then_crash_reclaim() {
    let stack = Stack::new();
    stack.register_sbi("s1", 2, 1, &[]);

    let a = stack.lock_service("worker-a");
    let b = stack.lock_service("worker-b");
    let id = LockId::new("s1");
    let ttl = ChronoDuration::seconds(60);

    // A wins; B observes the lock as held (empty, not an error)
    assert!(a.acquire_run(&id, ttl).unwrap().is_some());
    assert!(b.acquire_run(&id, ttl).unwrap().is_none());

    // A crashes: no release, no heartbeat. After TTL + a sweep, B wins.
    stack.clock.advance_secs(61);
    b.sweep_once().unwrap();
    let lock = b.acquire_run(&id, ttl).unwrap().unwrap();
    assert_eq!(lock.holder_id.as_str(), "worker-b");
}

#[test]
fn lock_count_matches_in_flight_tasks() {
    let stack = Stack::new();
    stack.register_sbi("s1", 2, 1, &[]);
    stack.register_sbi("s2", 2, 2, &[]);

    let service = stack.lock_service("worker-a");
    let ttl = ChronoDuration::seconds(60);

    // Simulate two picked tasks: lock held and status in-flight
    for id in ["s1", "s2"] {
        service
            .acquire_run(&LockId::new(id), ttl)
            .unwrap()
            .unwrap();
        let mut sbi = stack.load_sbi(id);
        let prev = sbi.common.version;
        sbi.common
            .update_status(TaskStatus::Picked, stack.clock.now_utc())
            .unwrap();
        stack
            .store
            .with_tx(|tx| {
                deespec_storage::tasks::update(
                    tx,
                    &deespec_core::AnyTask::Sbi(sbi.clone()),
                    prev,
                )
            })
            .unwrap();
    }

    let live_locks = service.list_run().unwrap().len();
    let in_flight = stack
        .store
        .with_conn(|c| deespec_storage::tasks::list(c, None))
        .unwrap()
        .iter()
        .filter(|t| t.status().is_in_flight())
        .count();
    assert_eq!(live_locks, in_flight);

    // Releasing one lock and finishing the task keeps the two in step
    service.release(&LockId::new("s1")).unwrap();
    let mut sbi = stack.load_sbi("s1");
    let prev = sbi.common.version;
    let now = stack.clock.now_utc();
    sbi.common.update_status(TaskStatus::Implementing, now).unwrap();
    sbi.common.update_status(TaskStatus::Reviewing, now).unwrap();
    sbi.common.update_status(TaskStatus::Failed, now).unwrap();
    stack
        .store
        .with_tx(|tx| {
            deespec_storage::tasks::update(tx, &deespec_core::AnyTask::Sbi(sbi.clone()), prev)
        })
        .unwrap();

    let live_locks = service.list_run().unwrap().len();
    let in_flight = stack
        .store
        .with_conn(|c| deespec_storage::tasks::list(c, None))
        .unwrap()
        .iter()
        .filter(|t| t.status().is_in_flight())
        .count();
    assert_eq!(live_locks, in_flight);
}
