// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned schema migrations.
//!
//! Each migration runs at most once; applied versions are recorded in the
//! `migrations` table. New schema changes append to [`MIGRATIONS`] with
//! the next version number.

use crate::error::StoreError;
use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

/// Ordered list of `(version, sql)` pairs.
const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    "
    CREATE TABLE IF NOT EXISTS tasks (
        id          TEXT PRIMARY KEY,
        kind        TEXT NOT NULL,
        title       TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status      TEXT NOT NULL,
        step        TEXT NOT NULL,
        parent_id   TEXT REFERENCES tasks(id),
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL,
        version     INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
    CREATE INDEX IF NOT EXISTS idx_tasks_kind_status ON tasks(kind, status);

    CREATE TABLE IF NOT EXISTS epics (
        task_id                TEXT PRIMARY KEY REFERENCES tasks(id) ON DELETE CASCADE,
        estimated_story_points INTEGER,
        priority               INTEGER,
        assigned_agent         TEXT,
        child_pbi_ids          TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS pbis (
        task_id             TEXT PRIMARY KEY REFERENCES tasks(id) ON DELETE CASCADE,
        story_points        INTEGER,
        priority            INTEGER,
        assigned_agent      TEXT,
        acceptance_criteria TEXT NOT NULL DEFAULT '[]',
        child_sbi_ids       TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS sbis (
        task_id        TEXT PRIMARY KEY REFERENCES tasks(id) ON DELETE CASCADE,
        estimated_hours REAL,
        priority       INTEGER,
        sequence       INTEGER,
        registered_at  TEXT,
        assigned_agent TEXT,
        file_paths     TEXT NOT NULL DEFAULT '[]',
        execution      TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS labels (
        task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        label   TEXT NOT NULL,
        PRIMARY KEY (task_id, label)
    );

    CREATE TABLE IF NOT EXISTS run_locks (
        lock_id      TEXT PRIMARY KEY,
        holder_id    TEXT NOT NULL,
        acquired_at  TEXT NOT NULL,
        expires_at   TEXT NOT NULL,
        heartbeat_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS state_locks (
        lock_id     TEXT NOT NULL,
        holder_id   TEXT NOT NULL,
        mode        TEXT NOT NULL,
        acquired_at TEXT NOT NULL,
        expires_at  TEXT NOT NULL,
        PRIMARY KEY (lock_id, holder_id)
    );
    ",
)];

/// Apply all migrations newer than the recorded schema version.
pub fn apply(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM migrations", [], |r| {
            r.get(0)
        })
        .unwrap_or(0);

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, Utc::now().to_rfc3339()],
        )?;
        info!(version, "applied schema migration");
    }

    Ok(())
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
