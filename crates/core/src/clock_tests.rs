// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_is_frozen_until_advanced() {
    let clock = FakeClock::new();
    let a = clock.now_utc();
    let b = clock.now_utc();
    assert_eq!(a, b);
}

#[test]
fn fake_clock_advance() {
    let clock = FakeClock::new();
    let before = clock.now_utc();
    clock.advance_secs(90);
    assert_eq!(clock.now_utc() - before, Duration::seconds(90));
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let clone = clock.clone();
    clock.advance_secs(5);
    assert_eq!(clock.now_utc(), clone.now_utc());
}

#[test]
fn epoch_ms_tracks_now() {
    let clock = FakeClock::new();
    let ms = clock.epoch_ms();
    clock.advance_secs(1);
    assert_eq!(clock.epoch_ms(), ms + 1000);
}

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.now_utc();
    let b = clock.now_utc();
    assert!(b >= a);
}
