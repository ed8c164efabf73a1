// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the storage layer.

use deespec_core::{TaskError, TaskId};
use thiserror::Error;

/// Errors from store and journal operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {what} {id}")]
    NotFound { what: &'static str, id: String },
    #[error("version conflict on {id}: expected {expected}")]
    VersionConflict { id: TaskId, expected: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not owner: lock {lock_id} is held by {held_by}")]
    NotOwner { lock_id: String, held_by: String },
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            what,
            id: id.into(),
        }
    }

    /// True for conditions a caller should reload-and-retry on.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}
