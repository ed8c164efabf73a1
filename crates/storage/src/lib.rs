// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! deespec-storage: durable state for the orchestrator.
//!
//! Two sinks with different shapes:
//!
//! - `deespec.db` — a SQLite database (WAL journaling) holding task rows,
//!   lock rows, and labels. All mutations are compare-and-swap on the
//!   row's `version`; cross-row updates run inside one transaction.
//!   WAL mode lets ad-hoc commands read while a run loop holds the
//!   writer.
//! - `var/journal.ndjson` — an append-only NDJSON audit stream. Appends
//!   take an exclusive advisory file lock around a single
//!   write-plus-fsync so concurrent appenders never interleave partial
//!   lines; readers skip malformed lines with a warning.

pub mod db;
pub mod error;
pub mod journal;
pub mod locks;
pub mod migration;
pub mod notes;
pub mod tasks;

pub use db::Store;
pub use error::StoreError;
pub use journal::Journal;
pub use notes::append_note;
