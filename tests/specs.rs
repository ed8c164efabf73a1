//! Behavioral specifications for deespec.
//!
//! End-to-end scenarios drive the real engine stack (SQLite store,
//! NDJSON journal, lock service) against a scripted agent gateway in a
//! temporary workspace; CLI specs invoke the built binary.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/status.rs"]
mod cli_status;
#[path = "specs/cli/version.rs"]
mod cli_version;

// workflow/
#[path = "specs/workflow/dependencies.rs"]
mod workflow_dependencies;
#[path = "specs/workflow/happy_path.rs"]
mod workflow_happy_path;
#[path = "specs/workflow/locks.rs"]
mod workflow_locks;
#[path = "specs/workflow/review_loop.rs"]
mod workflow_review_loop;
