// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite connection management and the transaction boundary.

use crate::error::StoreError;
use crate::migration;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Handle to the `deespec.db` database.
///
/// One `Store` owns one connection. Multiple processes may each open
/// their own `Store` against the same path; WAL mode permits concurrent
/// readers alongside a single writer, which is what lets `register`
/// commands run while a `run` loop is active.
pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    /// Open (creating if absent) the database and bring the schema up to
    /// date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;

        // journal_mode returns the resulting mode as a row
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        migration::apply(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a transaction; any error rolls the whole thing
    /// back.
    ///
    /// Repository functions in [`crate::tasks`] and [`crate::locks`]
    /// take the transaction handle so callers can compose cross-row
    /// updates (child insert + parent child-list) into one commit.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` against the connection without an explicit transaction
    /// (single-statement reads).
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        f(&conn)
    }
}

/// Render a timestamp for a TEXT column.
pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a TEXT column back into a timestamp.
pub(crate) fn ts_from_sql(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

/// Serialize a unit-variant enum to its wire string.
pub(crate) fn enum_to_sql<T: Serialize>(v: &T) -> Result<String, StoreError> {
    match serde_json::to_value(v)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(StoreError::Corrupt(format!(
            "expected string-encoded enum, got {other}"
        ))),
    }
}

/// Parse a wire string back into a unit-variant enum.
pub(crate) fn enum_from_sql<T: DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| StoreError::Corrupt(format!("bad enum value {s:?}: {e}")))
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
