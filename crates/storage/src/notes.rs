// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locked appends for per-task note files.
//!
//! `impl_notes.md` and `review_notes.md` are shared between turns and,
//! under contention, between processes. Appends use the same
//! advisory-lock + fsync discipline as the journal; whole-file rename
//! would lose concurrent updates.

use crate::error::StoreError;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Append `text` to `path`, creating the file (and parents) if needed.
/// A trailing newline is added when missing.
pub fn append_note(path: &Path, text: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let result = (|| -> Result<(), StoreError> {
        file.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.sync_all()?;
        Ok(())
    })();
    let _ = fs2::FileExt::unlock(&file);
    result
}

#[cfg(test)]
#[path = "notes_tests.rs"]
mod tests;
