// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task management operations behind the CLI surface.
//!
//! Create/get/list/status/delete, with every task projected to one
//! uniform DTO regardless of hierarchy level.

use crate::error::EngineError;
use crate::meta::TaskMeta;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use deespec_core::{AnyTask, Clock, Epic, Pbi, Sbi, TaskId, TaskKind, TaskStatus};
use deespec_storage::{tasks, Store};
use serde::Serialize;
use std::sync::Arc;

/// Creation request shared by all three levels.
#[derive(Debug, Clone, Default)]
pub struct CreateTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub parent: Option<TaskId>,
    pub priority: Option<u32>,
    pub por: Option<u32>,
    pub labels: Vec<String>,
}

/// Uniform projection of any task for presenters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub kind: TaskKind,
    pub title: String,
    pub status: TaskStatus,
    pub step: deespec_core::Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub labels: Vec<String>,
    pub child_ids: Vec<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project a task to the uniform DTO.
pub fn summarize(task: &AnyTask) -> TaskSummary {
    let common = task.common();
    let (labels, turn, last_error) = match task {
        AnyTask::Epic(e) => (e.labels.clone(), None, None),
        AnyTask::Pbi(p) => (p.labels.clone(), None, None),
        AnyTask::Sbi(s) => (
            s.labels.clone(),
            Some(s.execution.current_turn),
            s.execution.last_error.clone(),
        ),
    };
    TaskSummary {
        id: common.id.clone(),
        kind: common.kind,
        title: common.title.clone(),
        status: common.status,
        step: common.step,
        parent_id: common.parent_id.clone(),
        labels,
        child_ids: task.child_ids().to_vec(),
        turn,
        last_error,
        version: common.version,
        created_at: common.created_at,
        updated_at: common.updated_at,
    }
}

/// Create a task of `kind` and persist it (linking the parent's child
/// list in the same transaction). For SBIs the registration metadata is
/// also written to the spec directory so the pick resolver can see it.
pub fn create(
    store: &Store,
    ws: &Workspace,
    clock: &Arc<dyn Clock>,
    kind: TaskKind,
    req: CreateTask,
) -> Result<TaskSummary, EngineError> {
    let id = TaskId::new(req.id);
    let task: AnyTask = match kind {
        TaskKind::Epic => {
            let mut epic = Epic::new(id, req.title, clock);
            epic.common.description = req.description;
            epic.priority = req.priority;
            epic.labels = req.labels;
            epic.into()
        }
        TaskKind::Pbi => {
            let mut pbi = Pbi::new(id, req.title, req.parent, clock)?;
            pbi.common.description = req.description;
            pbi.priority = req.priority;
            pbi.labels = req.labels;
            pbi.into()
        }
        TaskKind::Sbi => {
            let mut sbi = Sbi::new(id.clone(), req.title, req.parent, clock)?;
            sbi.common.description = req.description;
            sbi.priority = req.priority;
            sbi.labels = req.labels.clone();
            let sbi: AnyTask = sbi.into();

            let mut meta = TaskMeta::new(id.as_str());
            meta.title = Some(sbi.common().title.clone());
            meta.priority = req.priority;
            meta.por = req.por;
            meta.labels = req.labels;
            crate::meta::save_meta(&ws.sbi_dir(&id), &meta)?;
            sbi
        }
    };

    store.with_tx(|tx| tasks::insert(tx, &task))?;
    Ok(summarize(&task))
}

pub fn get(store: &Store, id: &TaskId) -> Result<TaskSummary, EngineError> {
    Ok(summarize(&store.with_conn(|c| tasks::get(c, id))?))
}

pub fn list(store: &Store, kind: Option<TaskKind>) -> Result<Vec<TaskSummary>, EngineError> {
    Ok(store
        .with_conn(|c| tasks::list(c, kind))?
        .iter()
        .map(summarize)
        .collect())
}

/// Delete a task; refused while it has live children.
pub fn delete(store: &Store, id: &TaskId) -> Result<(), EngineError> {
    store.with_tx(|tx| tasks::delete(tx, id))?;
    Ok(())
}

/// Counts by status for the status presenter.
pub fn status_counts(store: &Store) -> Result<Vec<(TaskStatus, u32)>, EngineError> {
    Ok(store.with_conn(tasks::status_counts)?)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
