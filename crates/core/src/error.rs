// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity-level errors.

use crate::status::TaskStatus;
use thiserror::Error;

/// Errors raised by the task model itself (no I/O involved).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("hierarchy violation: {0}")]
    Hierarchy(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("turn limit reached ({current} of {max})")]
    TurnLimit { current: u32, max: u32 },
    #[error("attempt limit reached ({current} of {max})")]
    AttemptLimit { current: u32, max: u32 },
}
