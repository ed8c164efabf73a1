// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal record types.
//!
//! One record per line of `var/journal.ndjson`. Records are append-only;
//! within one SBI, `(turn, step)` is monotone non-decreasing. The reader
//! side (in `deespec-storage`) skips malformed lines, so these types only
//! need to describe well-formed records.

use crate::status::{Decision, Step, TaskStatus};
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A reference from a journal record to produced content.
///
/// The wire format allows either a bare storage path or an object with a
/// `type` discriminator (used for `pick`, `fb_sbi_draft`, and
/// `fb_sbi_registered` markers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactRef {
    Path(String),
    Object(Value),
}

impl ArtifactRef {
    pub fn path(p: impl Into<String>) -> Self {
        ArtifactRef::Path(p.into())
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            ArtifactRef::Path(p) => Some(p),
            ArtifactRef::Object(_) => None,
        }
    }

    /// The `type` discriminator of an object-form artifact.
    pub fn object_kind(&self) -> Option<&str> {
        match self {
            ArtifactRef::Path(_) => None,
            ArtifactRef::Object(v) => v.get("type").and_then(Value::as_str),
        }
    }

    /// String field of an object-form artifact.
    pub fn object_field(&self, key: &str) -> Option<&str> {
        match self {
            ArtifactRef::Path(_) => None,
            ArtifactRef::Object(v) => v.get(key).and_then(Value::as_str),
        }
    }

    /// The turn number if this is a `done_N.md` completion marker.
    pub fn done_turn(&self) -> Option<u32> {
        let name = self.as_path()?.rsplit('/').next()?;
        let n = name.strip_prefix("done_")?.strip_suffix(".md")?;
        n.parse().ok()
    }
}

/// Selection details recorded when the pick resolver chooses a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickInfo {
    pub task_id: TaskId,
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_path: Option<String>,
    pub por: Option<u32>,
    pub priority: Option<u32>,
}

impl PickInfo {
    /// Render as the object-form `pick` artifact.
    pub fn to_artifact(&self) -> ArtifactRef {
        let mut obj = serde_json::Map::new();
        obj.insert("type".into(), Value::from("pick"));
        obj.insert("task_id".into(), Value::from(self.task_id.as_str()));
        obj.insert("id".into(), Value::from(self.id.as_str()));
        obj.insert(
            "spec_path".into(),
            self.spec_path.clone().map(Value::from).unwrap_or(Value::Null),
        );
        obj.insert("por".into(), self.por.map(Value::from).unwrap_or(Value::Null));
        obj.insert(
            "priority".into(),
            self.priority.map(Value::from).unwrap_or(Value::Null),
        );
        ArtifactRef::Object(Value::Object(obj))
    }
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    #[serde(alias = "ts")]
    pub timestamp: DateTime<Utc>,
    pub sbi_id: TaskId,
    pub turn: u32,
    pub step: Step,
    pub status: TaskStatus,
    #[serde(default)]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
}

impl JournalRecord {
    /// Minimal record for the given task and position; callers fill in
    /// decision/error/artifacts as needed.
    pub fn new(
        timestamp: DateTime<Utc>,
        sbi_id: TaskId,
        turn: u32,
        step: Step,
        status: TaskStatus,
    ) -> Self {
        Self {
            timestamp,
            sbi_id,
            turn,
            step,
            status,
            attempt: 0,
            decision: None,
            elapsed_ms: 0,
            error: None,
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: ArtifactRef) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// True when this record carries an object artifact of `kind`.
    pub fn has_artifact_kind(&self, kind: &str) -> bool {
        self.artifacts.iter().any(|a| a.object_kind() == Some(kind))
    }

    /// Completion turn, under either journal dialect.
    ///
    /// New records mark completion with a `done_N.md` artifact path;
    /// legacy records used `step=done` together with a `pick` artifact.
    pub fn completion(&self) -> Option<&TaskId> {
        let new_form = self.artifacts.iter().any(|a| a.done_turn().is_some());
        let legacy_form = self.step == Step::Done && self.has_artifact_kind("pick");
        if new_form || legacy_form || self.status == TaskStatus::Done {
            Some(&self.sbi_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
