// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock row types.
//!
//! Run-locks give one worker exclusive ownership of a task; state-locks
//! lease named shared resources in read or write mode. Both carry a TTL
//! and are reaped by the lock service's sweeper once expired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Identity of the locked resource. For run-locks this equals the
    /// task id.
    pub struct LockId;
}

crate::define_id! {
    /// Identity of the process/worker holding a lock.
    pub struct HolderId;
}

/// Exclusive lease on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLock {
    pub lock_id: LockId,
    pub holder_id: HolderId,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
}

impl RunLock {
    /// Expired locks are treated as absent once the sweeper runs.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Access mode for a state-lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockMode {
    Read,
    Write,
}

impl LockMode {
    /// READ is compatible with other READs; WRITE excludes everything.
    pub fn compatible_with(self, other: LockMode) -> bool {
        matches!((self, other), (LockMode::Read, LockMode::Read))
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Read => write!(f, "READ"),
            LockMode::Write => write!(f, "WRITE"),
        }
    }
}

/// Read/write lease on a named shared resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateLock {
    pub lock_id: LockId,
    pub holder_id: HolderId,
    pub mode: LockMode,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StateLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
