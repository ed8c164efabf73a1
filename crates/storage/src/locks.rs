// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock row repository.
//!
//! Acquisition, heartbeat, and sweep are each a single-row CAS (guarded
//! INSERT or holder-scoped UPDATE/DELETE) so concurrent processes never
//! collide. A live lock makes acquisition return `None` — that is an
//! answer, not an error.

use crate::db::{enum_from_sql, enum_to_sql, ts_from_sql, ts_to_sql};
use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use deespec_core::{HolderId, LockId, LockMode, RunLock, StateLock};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

/// Try to take the exclusive run-lock for a task.
///
/// An expired row counts as absent and is replaced in the same
/// transaction.
pub fn acquire_run(
    tx: &Transaction<'_>,
    lock_id: &LockId,
    holder: &HolderId,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Option<RunLock>, StoreError> {
    if let Some(existing) = find_run(tx, lock_id)? {
        if !existing.is_expired(now) {
            return Ok(None);
        }
        tx.execute(
            "DELETE FROM run_locks WHERE lock_id = ?1",
            params![lock_id.as_str()],
        )?;
    }

    let lock = RunLock {
        lock_id: lock_id.clone(),
        holder_id: holder.clone(),
        acquired_at: now,
        expires_at: now + ttl,
        heartbeat_at: now,
    };
    tx.execute(
        "INSERT INTO run_locks (lock_id, holder_id, acquired_at, expires_at, heartbeat_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            lock.lock_id.as_str(),
            lock.holder_id.as_str(),
            ts_to_sql(&lock.acquired_at),
            ts_to_sql(&lock.expires_at),
            ts_to_sql(&lock.heartbeat_at),
        ],
    )?;
    Ok(Some(lock))
}

/// Release a run-lock held by `holder`.
pub fn release_run(
    tx: &Transaction<'_>,
    lock_id: &LockId,
    holder: &HolderId,
) -> Result<(), StoreError> {
    let existing = find_run(tx, lock_id)?
        .ok_or_else(|| StoreError::not_found("run lock", lock_id.as_str()))?;
    if existing.holder_id != *holder {
        return Err(StoreError::NotOwner {
            lock_id: lock_id.to_string(),
            held_by: existing.holder_id.to_string(),
        });
    }
    tx.execute(
        "DELETE FROM run_locks WHERE lock_id = ?1 AND holder_id = ?2",
        params![lock_id.as_str(), holder.as_str()],
    )?;
    Ok(())
}

/// Extend a run-lock's lease; no-op (returns false) if the row no longer
/// belongs to `holder`.
pub fn heartbeat_run(
    conn: &Connection,
    lock_id: &LockId,
    holder: &HolderId,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE run_locks SET expires_at = ?3, heartbeat_at = ?4
         WHERE lock_id = ?1 AND holder_id = ?2",
        params![
            lock_id.as_str(),
            holder.as_str(),
            ts_to_sql(&(now + ttl)),
            ts_to_sql(&now),
        ],
    )?;
    Ok(changed > 0)
}

/// Extend a state-lock's lease; no-op (returns false) if the row no
/// longer belongs to `holder`.
pub fn heartbeat_state(
    conn: &Connection,
    lock_id: &LockId,
    holder: &HolderId,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE state_locks SET expires_at = ?3
         WHERE lock_id = ?1 AND holder_id = ?2",
        params![
            lock_id.as_str(),
            holder.as_str(),
            ts_to_sql(&(now + ttl)),
        ],
    )?;
    Ok(changed > 0)
}

pub fn find_run(conn: &Connection, lock_id: &LockId) -> Result<Option<RunLock>, StoreError> {
    conn.query_row(
        "SELECT lock_id, holder_id, acquired_at, expires_at, heartbeat_at
         FROM run_locks WHERE lock_id = ?1",
        params![lock_id.as_str()],
        run_from_row,
    )
    .optional()?
    .transpose()
}

pub fn list_run(conn: &Connection) -> Result<Vec<RunLock>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT lock_id, holder_id, acquired_at, expires_at, heartbeat_at
         FROM run_locks ORDER BY lock_id",
    )?;
    let rows = stmt.query_map([], run_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

/// Try to take a state-lock. READ is granted alongside other live READs;
/// WRITE requires the resource to be free of live rows.
pub fn acquire_state(
    tx: &Transaction<'_>,
    lock_id: &LockId,
    holder: &HolderId,
    mode: LockMode,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Option<StateLock>, StoreError> {
    // Expired rows don't block; clear them while we're here.
    tx.execute(
        "DELETE FROM state_locks WHERE lock_id = ?1 AND expires_at < ?2",
        params![lock_id.as_str(), ts_to_sql(&now)],
    )?;

    let live = list_state_for(tx, lock_id)?;
    if live.iter().any(|l| !l.mode.compatible_with(mode)) {
        return Ok(None);
    }

    let lock = StateLock {
        lock_id: lock_id.clone(),
        holder_id: holder.clone(),
        mode,
        acquired_at: now,
        expires_at: now + ttl,
    };
    tx.execute(
        "INSERT OR REPLACE INTO state_locks (lock_id, holder_id, mode, acquired_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            lock.lock_id.as_str(),
            lock.holder_id.as_str(),
            enum_to_sql(&lock.mode)?,
            ts_to_sql(&lock.acquired_at),
            ts_to_sql(&lock.expires_at),
        ],
    )?;
    Ok(Some(lock))
}

pub fn release_state(
    tx: &Transaction<'_>,
    lock_id: &LockId,
    holder: &HolderId,
) -> Result<(), StoreError> {
    let changed = tx.execute(
        "DELETE FROM state_locks WHERE lock_id = ?1 AND holder_id = ?2",
        params![lock_id.as_str(), holder.as_str()],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("state lock", lock_id.as_str()));
    }
    Ok(())
}

pub fn list_state(conn: &Connection) -> Result<Vec<StateLock>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT lock_id, holder_id, mode, acquired_at, expires_at
         FROM state_locks ORDER BY lock_id, holder_id",
    )?;
    let rows = stmt.query_map([], state_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

fn list_state_for(conn: &Connection, lock_id: &LockId) -> Result<Vec<StateLock>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT lock_id, holder_id, mode, acquired_at, expires_at
         FROM state_locks WHERE lock_id = ?1",
    )?;
    let rows = stmt.query_map(params![lock_id.as_str()], state_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

/// Delete all expired locks (both kinds). Returns how many were reaped.
pub fn sweep_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize, StoreError> {
    let now = ts_to_sql(&now);
    let runs = conn.execute("DELETE FROM run_locks WHERE expires_at < ?1", params![now])?;
    let states = conn.execute(
        "DELETE FROM state_locks WHERE expires_at < ?1",
        params![now],
    )?;
    Ok(runs + states)
}

type LockRow<T> = Result<T, StoreError>;

fn run_from_row(row: &rusqlite::Row<'_>) -> Result<LockRow<RunLock>, rusqlite::Error> {
    let build = || -> LockRow<RunLock> {
        Ok(RunLock {
            lock_id: LockId::new(row.get::<_, String>(0)?),
            holder_id: HolderId::new(row.get::<_, String>(1)?),
            acquired_at: ts_from_sql(&row.get::<_, String>(2)?)?,
            expires_at: ts_from_sql(&row.get::<_, String>(3)?)?,
            heartbeat_at: ts_from_sql(&row.get::<_, String>(4)?)?,
        })
    };
    Ok(build())
}

fn state_from_row(row: &rusqlite::Row<'_>) -> Result<LockRow<StateLock>, rusqlite::Error> {
    let build = || -> LockRow<StateLock> {
        Ok(StateLock {
            lock_id: LockId::new(row.get::<_, String>(0)?),
            holder_id: HolderId::new(row.get::<_, String>(1)?),
            mode: enum_from_sql(&row.get::<_, String>(2)?)?,
            acquired_at: ts_from_sql(&row.get::<_, String>(3)?)?,
            expires_at: ts_from_sql(&row.get::<_, String>(4)?)?,
        })
    };
    Ok(build())
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
