// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entities and hierarchy rules.
//!
//! Three levels: EPIC (largest) → PBI → SBI (smallest executable unit).
//! Parent/child links are a child-id list on the parent plus a parent id
//! on the child; the transactional store updates both sides together.
//! The hierarchy rules live in [`validate_link`] and nowhere else.

use crate::clock::Clock;
use crate::error::TaskError;
use crate::status::{Step, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a task at any hierarchy level.
    pub struct TaskId;
}

/// Default turn budget for an SBI.
pub const DEFAULT_MAX_TURNS: u32 = 10;
/// Default retry budget within one turn.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Hierarchy level of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Epic,
    Pbi,
    Sbi,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Epic => write!(f, "EPIC"),
            TaskKind::Pbi => write!(f, "PBI"),
            TaskKind::Sbi => write!(f, "SBI"),
        }
    }
}

/// Validate a parent/child pairing.
///
/// EPICs are roots; PBIs may sit under an EPIC or stand alone; SBIs may
/// sit under a PBI or stand alone. This is the single place the rules
/// are enforced: constructors and the store's link operations all come
/// through here.
pub fn validate_link(child: TaskKind, parent: Option<TaskKind>) -> Result<(), TaskError> {
    match (child, parent) {
        (TaskKind::Epic, None) => Ok(()),
        (TaskKind::Epic, Some(p)) => Err(TaskError::Hierarchy(format!(
            "EPIC cannot have a parent (got {p})"
        ))),
        (TaskKind::Pbi, None | Some(TaskKind::Epic)) => Ok(()),
        (TaskKind::Pbi, Some(p)) => Err(TaskError::Hierarchy(format!(
            "PBI parent must be an EPIC (got {p})"
        ))),
        (TaskKind::Sbi, None | Some(TaskKind::Pbi)) => Ok(()),
        (TaskKind::Sbi, Some(p)) => Err(TaskError::Hierarchy(format!(
            "SBI parent must be a PBI (got {p})"
        ))),
    }
}

/// Fields shared by every task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCommon {
    pub id: TaskId,
    pub kind: TaskKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version; strictly increases on every
    /// persisted mutation.
    pub version: u64,
}

impl TaskCommon {
    fn new(
        id: TaskId,
        kind: TaskKind,
        title: impl Into<String>,
        parent: Option<(TaskId, TaskKind)>,
        clock: &impl Clock,
    ) -> Result<Self, TaskError> {
        validate_link(kind, parent.as_ref().map(|(_, k)| *k))?;
        let now = clock.now_utc();
        Ok(Self {
            id,
            kind,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            step: Step::Plan,
            parent_id: parent.map(|(id, _)| id),
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// Move to `next`, rejecting transitions outside the allowed graph.
    pub fn update_status(&mut self, next: TaskStatus, now: DateTime<Utc>) -> Result<(), TaskError> {
        if !self.status.can_transition(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn update_step(&mut self, step: Step, now: DateTime<Utc>) {
        self.step = step;
        self.updated_at = now;
    }

    /// Bump `updated_at` without changing anything else.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Per-SBI execution counters and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(default)]
    pub current_turn: u32,
    #[serde(default)]
    pub current_attempt: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub artifact_paths: Vec<String>,
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self {
            current_turn: 0,
            current_attempt: 0,
            max_turns: DEFAULT_MAX_TURNS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_error: None,
            artifact_paths: Vec::new(),
        }
    }
}

impl ExecutionState {
    /// Advance to the next turn. Refuses to move past `max_turns`.
    pub fn advance_turn(&mut self) -> Result<u32, TaskError> {
        if self.current_turn >= self.max_turns {
            return Err(TaskError::TurnLimit {
                current: self.current_turn,
                max: self.max_turns,
            });
        }
        self.current_turn += 1;
        self.current_attempt = 0;
        Ok(self.current_turn)
    }

    /// Count one retry of the current turn. Refuses to move past
    /// `max_attempts`.
    pub fn record_attempt(&mut self) -> Result<u32, TaskError> {
        if self.current_attempt >= self.max_attempts {
            return Err(TaskError::AttemptLimit {
                current: self.current_attempt,
                max: self.max_attempts,
            });
        }
        self.current_attempt += 1;
        Ok(self.current_attempt)
    }

    pub fn turns_exhausted(&self) -> bool {
        self.current_turn >= self.max_turns
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.current_attempt >= self.max_attempts
    }
}

/// Top-level initiative grouping PBIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    #[serde(flatten)]
    pub common: TaskCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_story_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub child_pbi_ids: Vec<TaskId>,
}

impl Epic {
    pub fn new(id: TaskId, title: impl Into<String>, clock: &impl Clock) -> Self {
        // An EPIC with no parent cannot violate the hierarchy.
        let common = match TaskCommon::new(id, TaskKind::Epic, title, None, clock) {
            Ok(c) => c,
            Err(_) => unreachable!("EPIC with no parent always validates"),
        };
        Self {
            common,
            estimated_story_points: None,
            priority: None,
            labels: Vec::new(),
            assigned_agent: None,
            child_pbi_ids: Vec::new(),
        }
    }
}

/// Product backlog item; decomposes into SBIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pbi {
    #[serde(flatten)]
    pub common: TaskCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub child_sbi_ids: Vec<TaskId>,
}

impl Pbi {
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        parent_epic: Option<TaskId>,
        clock: &impl Clock,
    ) -> Result<Self, TaskError> {
        let parent = parent_epic.map(|id| (id, TaskKind::Epic));
        let common = TaskCommon::new(id, TaskKind::Pbi, title, parent, clock)?;
        Ok(Self {
            common,
            story_points: None,
            priority: None,
            labels: Vec::new(),
            assigned_agent: None,
            acceptance_criteria: Vec::new(),
            child_sbi_ids: Vec::new(),
        })
    }

    pub fn parent_epic_id(&self) -> Option<&TaskId> {
        self.common.parent_id.as_ref()
    }
}

/// Smallest executable unit; the workflow engine drives these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sbi {
    #[serde(flatten)]
    pub common: TaskCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub execution: ExecutionState,
}

impl Sbi {
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        parent_pbi: Option<TaskId>,
        clock: &impl Clock,
    ) -> Result<Self, TaskError> {
        let parent = parent_pbi.map(|id| (id, TaskKind::Pbi));
        let common = TaskCommon::new(id, TaskKind::Sbi, title, parent, clock)?;
        Ok(Self {
            common,
            estimated_hours: None,
            priority: None,
            sequence: None,
            registered_at: Some(clock.now_utc()),
            labels: Vec::new(),
            assigned_agent: None,
            file_paths: Vec::new(),
            execution: ExecutionState::default(),
        })
    }

    pub fn parent_pbi_id(&self) -> Option<&TaskId> {
        self.common.parent_id.as_ref()
    }
}

/// Capability set shared by every hierarchy level.
pub trait Task {
    fn id(&self) -> &TaskId;
    fn kind(&self) -> TaskKind;
    fn status(&self) -> TaskStatus;
    fn step(&self) -> Step;
    fn parent_id(&self) -> Option<&TaskId>;
    fn version(&self) -> u64;
    fn update_status(&mut self, next: TaskStatus, now: DateTime<Utc>) -> Result<(), TaskError>;
    fn update_step(&mut self, step: Step, now: DateTime<Utc>);
    fn touch(&mut self, now: DateTime<Utc>);
}

macro_rules! impl_task_via_common {
    ($ty:ty) => {
        impl Task for $ty {
            fn id(&self) -> &TaskId {
                &self.common.id
            }
            fn kind(&self) -> TaskKind {
                self.common.kind
            }
            fn status(&self) -> TaskStatus {
                self.common.status
            }
            fn step(&self) -> Step {
                self.common.step
            }
            fn parent_id(&self) -> Option<&TaskId> {
                self.common.parent_id.as_ref()
            }
            fn version(&self) -> u64 {
                self.common.version
            }
            fn update_status(
                &mut self,
                next: TaskStatus,
                now: DateTime<Utc>,
            ) -> Result<(), TaskError> {
                self.common.update_status(next, now)
            }
            fn update_step(&mut self, step: Step, now: DateTime<Utc>) {
                self.common.update_step(step, now)
            }
            fn touch(&mut self, now: DateTime<Utc>) {
                self.common.touch(now)
            }
        }
    };
}

impl_task_via_common!(Epic);
impl_task_via_common!(Pbi);
impl_task_via_common!(Sbi);

/// Tagged union for transporting any hierarchy level uniformly.
///
/// The wire discriminator is the `kind` field each variant already
/// carries in its [`TaskCommon`], so serialization simply delegates to
/// the variant and deserialization dispatches on that field.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyTask {
    Epic(Epic),
    Pbi(Pbi),
    Sbi(Sbi),
}

impl Serialize for AnyTask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AnyTask::Epic(t) => t.serialize(serializer),
            AnyTask::Pbi(t) => t.serialize(serializer),
            AnyTask::Sbi(t) => t.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AnyTask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind: TaskKind = value
            .get("kind")
            .cloned()
            .ok_or_else(|| D::Error::missing_field("kind"))
            .and_then(|v| serde_json::from_value(v).map_err(D::Error::custom))?;
        let task = match kind {
            TaskKind::Epic => AnyTask::Epic(
                serde_json::from_value(value).map_err(D::Error::custom)?,
            ),
            TaskKind::Pbi => {
                AnyTask::Pbi(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
            TaskKind::Sbi => {
                AnyTask::Sbi(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
        };
        Ok(task)
    }
}

impl AnyTask {
    pub fn common(&self) -> &TaskCommon {
        match self {
            AnyTask::Epic(t) => &t.common,
            AnyTask::Pbi(t) => &t.common,
            AnyTask::Sbi(t) => &t.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut TaskCommon {
        match self {
            AnyTask::Epic(t) => &mut t.common,
            AnyTask::Pbi(t) => &mut t.common,
            AnyTask::Sbi(t) => &mut t.common,
        }
    }

    pub fn as_sbi(&self) -> Option<&Sbi> {
        match self {
            AnyTask::Sbi(t) => Some(t),
            _ => None,
        }
    }

    /// Ids of this task's direct children.
    pub fn child_ids(&self) -> &[TaskId] {
        match self {
            AnyTask::Epic(t) => &t.child_pbi_ids,
            AnyTask::Pbi(t) => &t.child_sbi_ids,
            AnyTask::Sbi(_) => &[],
        }
    }
}

impl From<Epic> for AnyTask {
    fn from(t: Epic) -> Self {
        AnyTask::Epic(t)
    }
}

impl From<Pbi> for AnyTask {
    fn from(t: Pbi) -> Self {
        AnyTask::Pbi(t)
    }
}

impl From<Sbi> for AnyTask {
    fn from(t: Sbi) -> Self {
        AnyTask::Sbi(t)
    }
}

impl Task for AnyTask {
    fn id(&self) -> &TaskId {
        &self.common().id
    }
    fn kind(&self) -> TaskKind {
        self.common().kind
    }
    fn status(&self) -> TaskStatus {
        self.common().status
    }
    fn step(&self) -> Step {
        self.common().step
    }
    fn parent_id(&self) -> Option<&TaskId> {
        self.common().parent_id.as_ref()
    }
    fn version(&self) -> u64 {
        self.common().version
    }
    fn update_status(&mut self, next: TaskStatus, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.common_mut().update_status(next, now)
    }
    fn update_step(&mut self, step: Step, now: DateTime<Utc>) {
        self.common_mut().update_step(step, now)
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.common_mut().touch(now)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
