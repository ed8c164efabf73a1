// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status, step, and review-decision vocabularies.
//!
//! Status and step are independent axes: status tracks where a task sits
//! in its lifecycle, step tracks which phase of the current turn the
//! workflow engine is executing. The engine updates both per turn.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a task.
///
/// The happy path is `Pending → Picked → Implementing → Reviewing →
/// Done`; a review demanding changes loops through `ReviewAndWip` back to
/// `Implementing`. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Picked,
    Implementing,
    Reviewing,
    #[serde(rename = "REVIEW&WIP")]
    ReviewAndWip,
    Done,
    Failed,
}

impl TaskStatus {
    /// Whether a direct transition to `next` is allowed.
    ///
    /// Guards the two corruption-prone moves explicitly: implementation
    /// must not start without a pick, and nothing leaves `Done`.
    pub fn can_transition(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Picked)
                | (Picked, Implementing)
                | (Implementing, Reviewing)
                | (Implementing, Failed)
                | (Reviewing, Done)
                | (Reviewing, ReviewAndWip)
                | (Reviewing, Failed)
                | (ReviewAndWip, Implementing)
                | (ReviewAndWip, Failed)
        )
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    /// Statuses during which a worker holds the task's run-lock.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TaskStatus::Picked | TaskStatus::Implementing | TaskStatus::Reviewing
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Picked => write!(f, "PICKED"),
            TaskStatus::Implementing => write!(f, "IMPLEMENTING"),
            TaskStatus::Reviewing => write!(f, "REVIEWING"),
            TaskStatus::ReviewAndWip => write!(f, "REVIEW&WIP"),
            TaskStatus::Done => write!(f, "DONE"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Plan,
    Implement,
    Review,
    Done,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Plan => write!(f, "plan"),
            Step::Implement => write!(f, "implement"),
            Step::Review => write!(f, "review"),
            Step::Done => write!(f, "done"),
        }
    }
}

/// Verdict extracted from a review response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Succeeded,
    NeedsChanges,
    Failed,
}

impl Decision {
    /// Scan agent output for a decision token.
    ///
    /// Matching is case-insensitive; when several tokens appear, the one
    /// earliest in the output wins.
    pub fn parse(output: &str) -> Option<Decision> {
        let upper = output.to_uppercase();
        let candidates = [
            (Decision::Succeeded, "SUCCEEDED"),
            (Decision::NeedsChanges, "NEEDS_CHANGES"),
            (Decision::Failed, "FAILED"),
        ];
        candidates
            .iter()
            .filter_map(|(d, token)| upper.find(token).map(|pos| (pos, *d)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, d)| d)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Succeeded => write!(f, "SUCCEEDED"),
            Decision::NeedsChanges => write!(f, "NEEDS_CHANGES"),
            Decision::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
