// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only NDJSON journal.
//!
//! One JSON object per line. Appends take an exclusive advisory lock for
//! the duration of a single write + fsync, so N concurrent appenders
//! produce exactly N well-formed lines. A crash can still leave a
//! partial final line; readers skip anything unparseable with a warning
//! instead of aborting, which is what makes the stream recoverable.

use crate::error::StoreError;
use deespec_core::{JournalRecord, TaskId};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Handle to the journal file. Cheap to construct; every operation opens
/// the file fresh so multiple processes can share the path.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record durably.
    pub fn append(&self, record: &JournalRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = Self::write_locked(&file, &line);
        let _ = fs2::FileExt::unlock(&file);
        result
    }

    fn write_locked(mut file: &File, line: &[u8]) -> Result<(), StoreError> {
        file.write_all(line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every parseable record, in file order.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(trimmed) {
                Ok(rec) => out.push(rec),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %e,
                        "skipping malformed journal line",
                    );
                }
            }
        }
        Ok(out)
    }

    /// Records for one task, in append order.
    pub fn entries_for(&self, id: &TaskId) -> Result<Vec<JournalRecord>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.sbi_id == *id)
            .collect())
    }

    /// The most recent record for one task.
    pub fn last_for(&self, id: &TaskId) -> Result<Option<JournalRecord>, StoreError> {
        Ok(self.entries_for(id)?.pop())
    }

    /// Ids of tasks the journal shows as completed, under both the
    /// current (`done_N.md` artifact) and legacy (`step=done` + `pick`
    /// artifact) dialects.
    pub fn completed_set(&self) -> Result<HashSet<TaskId>, StoreError> {
        let mut set = HashSet::new();
        for rec in self.read_all()? {
            if let Some(id) = rec.completion() {
                set.insert(id.clone());
            }
        }
        Ok(set)
    }

    /// Whether any record carries an object artifact of `kind` whose
    /// `target_task_id` names `target`. Used to deduplicate FB drafts.
    pub fn has_marker_for(&self, kind: &str, target: &TaskId) -> Result<bool, StoreError> {
        for rec in self.read_all()? {
            let hit = rec.artifacts.iter().any(|a| {
                a.object_kind() == Some(kind)
                    && a.object_field("target_task_id") == Some(target.as_str())
            });
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
