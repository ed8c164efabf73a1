// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{Clock, FakeClock};
use chrono::Duration;

#[test]
fn run_lock_expiry_is_strict() {
    let clock = FakeClock::new();
    let now = clock.now_utc();
    let lock = RunLock {
        lock_id: LockId::new("sbi-1"),
        holder_id: HolderId::new("worker-a"),
        acquired_at: now,
        expires_at: now + Duration::seconds(30),
        heartbeat_at: now,
    };

    assert!(!lock.is_expired(now));
    assert!(!lock.is_expired(now + Duration::seconds(30)));
    assert!(lock.is_expired(now + Duration::seconds(31)));
}

#[test]
fn read_is_compatible_with_read_only() {
    assert!(LockMode::Read.compatible_with(LockMode::Read));
    assert!(!LockMode::Read.compatible_with(LockMode::Write));
    assert!(!LockMode::Write.compatible_with(LockMode::Read));
    assert!(!LockMode::Write.compatible_with(LockMode::Write));
}

#[test]
fn lock_mode_serde_is_uppercase() {
    assert_eq!(serde_json::to_string(&LockMode::Read).unwrap(), r#""READ""#);
    let parsed: LockMode = serde_json::from_str(r#""WRITE""#).unwrap();
    assert_eq!(parsed, LockMode::Write);
}
