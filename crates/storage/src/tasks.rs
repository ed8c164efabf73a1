// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task repositories.
//!
//! Reads take a plain connection; mutations take a [`Transaction`] so a
//! caller can compose them (child insert + parent child-list update)
//! into one commit via [`crate::Store::with_tx`]. Every mutation is CAS
//! on the row's `version`.

use crate::db::{enum_from_sql, enum_to_sql, ts_from_sql, ts_to_sql};
use crate::error::StoreError;
use deespec_core::task::validate_link;
use deespec_core::{
    AnyTask, Epic, ExecutionState, Pbi, Sbi, TaskCommon, TaskId, TaskKind, TaskStatus,
};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

fn json_vec<T: serde::Serialize>(v: &[T]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(v)?)
}

fn from_json_vec<T: serde::de::DeserializeOwned>(s: &str) -> Result<Vec<T>, StoreError> {
    serde_json::from_str(s).map_err(|e| StoreError::Corrupt(format!("bad JSON list: {e}")))
}

/// Insert a task and, when it has a parent, append it to the parent's
/// child list (bumping the parent's version).
pub fn insert(tx: &Transaction<'_>, task: &AnyTask) -> Result<(), StoreError> {
    let common = task.common();

    let parent_kind = match &common.parent_id {
        Some(pid) => Some(kind_of(tx, pid)?),
        None => None,
    };
    validate_link(common.kind, parent_kind)?;

    tx.execute(
        "INSERT INTO tasks (id, kind, title, description, status, step, parent_id,
                            created_at, updated_at, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            common.id.as_str(),
            enum_to_sql(&common.kind)?,
            common.title,
            common.description,
            enum_to_sql(&common.status)?,
            enum_to_sql(&common.step)?,
            common.parent_id.as_ref().map(|p| p.as_str()),
            ts_to_sql(&common.created_at),
            ts_to_sql(&common.updated_at),
            common.version,
        ],
    )?;

    insert_variant(tx, task)?;
    replace_labels(tx, &common.id, task_labels(task))?;

    if let Some(pid) = &common.parent_id {
        link_child(tx, pid, &common.id)?;
    }
    Ok(())
}

/// Update a task row with compare-and-swap on `prev_version`.
///
/// Returns the new stored version (`prev_version + 1`); the caller is
/// responsible for reflecting it into its in-memory copy.
pub fn update(tx: &Transaction<'_>, task: &AnyTask, prev_version: u64) -> Result<u64, StoreError> {
    let common = task.common();
    let changed = tx.execute(
        "UPDATE tasks
         SET title = ?1, description = ?2, status = ?3, step = ?4,
             updated_at = ?5, version = version + 1
         WHERE id = ?6 AND version = ?7",
        params![
            common.title,
            common.description,
            enum_to_sql(&common.status)?,
            enum_to_sql(&common.step)?,
            ts_to_sql(&common.updated_at),
            common.id.as_str(),
            prev_version,
        ],
    )?;

    if changed == 0 {
        return if exists(tx, &common.id)? {
            Err(StoreError::VersionConflict {
                id: common.id.clone(),
                expected: prev_version,
            })
        } else {
            Err(StoreError::not_found("task", common.id.as_str()))
        };
    }

    update_variant(tx, task)?;
    replace_labels(tx, &common.id, task_labels(task))?;
    Ok(prev_version + 1)
}

/// Delete a task that carries no live (non-terminal) children, removing
/// it from its parent's child list.
pub fn delete(tx: &Transaction<'_>, id: &TaskId) -> Result<(), StoreError> {
    let task = get(tx, id)?;

    let live_children: u32 = tx.query_row(
        "SELECT COUNT(*) FROM tasks WHERE parent_id = ?1 AND status NOT IN ('DONE', 'FAILED')",
        params![id.as_str()],
        |r| r.get(0),
    )?;
    if live_children > 0 {
        return Err(StoreError::Task(deespec_core::TaskError::Validation(
            format!("task {id} has {live_children} live child(ren)"),
        )));
    }

    if let Some(pid) = &task.common().parent_id {
        unlink_child(tx, pid, id)?;
    }
    tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])?;
    Ok(())
}

/// Load one task at any hierarchy level.
pub fn get(conn: &Connection, id: &TaskId) -> Result<AnyTask, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, kind, title, description, status, step, parent_id,
                    created_at, updated_at, version
             FROM tasks WHERE id = ?1",
            params![id.as_str()],
            common_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("task", id.as_str()))??;

    assemble(conn, row)
}

/// Load one SBI, failing if the id names another kind.
pub fn get_sbi(conn: &Connection, id: &TaskId) -> Result<Sbi, StoreError> {
    match get(conn, id)? {
        AnyTask::Sbi(sbi) => Ok(sbi),
        other => Err(StoreError::Corrupt(format!(
            "task {id} is a {}, not an SBI",
            other.common().kind
        ))),
    }
}

/// List tasks, optionally restricted to one kind, ordered by creation.
pub fn list(conn: &Connection, kind: Option<TaskKind>) -> Result<Vec<AnyTask>, StoreError> {
    let mut out = Vec::new();
    let sql = "SELECT id, kind, title, description, status, step, parent_id,
                      created_at, updated_at, version
               FROM tasks
               WHERE (?1 IS NULL OR kind = ?1)
               ORDER BY created_at, id";
    let kind_str = kind.map(|k| enum_to_sql(&k)).transpose()?;
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![kind_str], common_from_row)?;
    for row in rows {
        out.push(assemble(conn, row??)?);
    }
    Ok(out)
}

/// Count tasks grouped by status (for the status presenter).
pub fn status_counts(conn: &Connection) -> Result<Vec<(TaskStatus, u32)>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u32>(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        let (status, count) = row?;
        out.push((enum_from_sql(&status)?, count));
    }
    Ok(out)
}

fn exists(conn: &Connection, id: &TaskId) -> Result<bool, StoreError> {
    let n: u32 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE id = ?1",
        params![id.as_str()],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

fn kind_of(conn: &Connection, id: &TaskId) -> Result<TaskKind, StoreError> {
    let kind: Option<String> = conn
        .query_row(
            "SELECT kind FROM tasks WHERE id = ?1",
            params![id.as_str()],
            |r| r.get(0),
        )
        .optional()?;
    match kind {
        Some(k) => enum_from_sql(&k),
        None => Err(StoreError::not_found("parent task", id.as_str())),
    }
}

type CommonRow = Result<TaskCommon, StoreError>;

fn common_from_row(row: &rusqlite::Row<'_>) -> Result<CommonRow, rusqlite::Error> {
    let build = || -> CommonRow {
        Ok(TaskCommon {
            id: TaskId::new(row.get::<_, String>(0)?),
            kind: enum_from_sql(&row.get::<_, String>(1)?)?,
            title: row.get(2)?,
            description: row.get(3)?,
            status: enum_from_sql(&row.get::<_, String>(4)?)?,
            step: enum_from_sql(&row.get::<_, String>(5)?)?,
            parent_id: row.get::<_, Option<String>>(6)?.map(TaskId::new),
            created_at: ts_from_sql(&row.get::<_, String>(7)?)?,
            updated_at: ts_from_sql(&row.get::<_, String>(8)?)?,
            version: row.get(9)?,
        })
    };
    Ok(build())
}

fn assemble(conn: &Connection, common: TaskCommon) -> Result<AnyTask, StoreError> {
    let labels = load_labels(conn, &common.id)?;
    match common.kind {
        TaskKind::Epic => {
            let (points, priority, agent, children) = conn.query_row(
                "SELECT estimated_story_points, priority, assigned_agent, child_pbi_ids
                 FROM epics WHERE task_id = ?1",
                params![common.id.as_str()],
                |r| {
                    Ok((
                        r.get::<_, Option<u32>>(0)?,
                        r.get::<_, Option<u32>>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, String>(3)?,
                    ))
                },
            )?;
            Ok(AnyTask::Epic(Epic {
                common,
                estimated_story_points: points,
                priority,
                labels,
                assigned_agent: agent,
                child_pbi_ids: from_json_vec(&children)?,
            }))
        }
        TaskKind::Pbi => {
            let (points, priority, agent, criteria, children) = conn.query_row(
                "SELECT story_points, priority, assigned_agent, acceptance_criteria, child_sbi_ids
                 FROM pbis WHERE task_id = ?1",
                params![common.id.as_str()],
                |r| {
                    Ok((
                        r.get::<_, Option<u32>>(0)?,
                        r.get::<_, Option<u32>>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                    ))
                },
            )?;
            Ok(AnyTask::Pbi(Pbi {
                common,
                story_points: points,
                priority,
                labels,
                assigned_agent: agent,
                acceptance_criteria: from_json_vec(&criteria)?,
                child_sbi_ids: from_json_vec(&children)?,
            }))
        }
        TaskKind::Sbi => {
            let (hours, priority, sequence, registered_at, agent, file_paths, execution) = conn
                .query_row(
                    "SELECT estimated_hours, priority, sequence, registered_at, assigned_agent,
                            file_paths, execution
                     FROM sbis WHERE task_id = ?1",
                    params![common.id.as_str()],
                    |r| {
                        Ok((
                            r.get::<_, Option<f64>>(0)?,
                            r.get::<_, Option<u32>>(1)?,
                            r.get::<_, Option<u32>>(2)?,
                            r.get::<_, Option<String>>(3)?,
                            r.get::<_, Option<String>>(4)?,
                            r.get::<_, String>(5)?,
                            r.get::<_, String>(6)?,
                        ))
                    },
                )?;
            let execution: ExecutionState = serde_json::from_str(&execution)
                .map_err(|e| StoreError::Corrupt(format!("bad execution state: {e}")))?;
            Ok(AnyTask::Sbi(Sbi {
                common,
                estimated_hours: hours,
                priority,
                sequence,
                registered_at: registered_at.as_deref().map(ts_from_sql).transpose()?,
                labels,
                assigned_agent: agent,
                file_paths: from_json_vec(&file_paths)?,
                execution,
            }))
        }
    }
}

fn insert_variant(tx: &Transaction<'_>, task: &AnyTask) -> Result<(), StoreError> {
    match task {
        AnyTask::Epic(e) => {
            tx.execute(
                "INSERT INTO epics (task_id, estimated_story_points, priority, assigned_agent,
                                    child_pbi_ids)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    e.common.id.as_str(),
                    e.estimated_story_points,
                    e.priority,
                    e.assigned_agent,
                    json_vec(&e.child_pbi_ids)?,
                ],
            )?;
        }
        AnyTask::Pbi(p) => {
            tx.execute(
                "INSERT INTO pbis (task_id, story_points, priority, assigned_agent,
                                   acceptance_criteria, child_sbi_ids)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    p.common.id.as_str(),
                    p.story_points,
                    p.priority,
                    p.assigned_agent,
                    json_vec(&p.acceptance_criteria)?,
                    json_vec(&p.child_sbi_ids)?,
                ],
            )?;
        }
        AnyTask::Sbi(s) => {
            tx.execute(
                "INSERT INTO sbis (task_id, estimated_hours, priority, sequence, registered_at,
                                   assigned_agent, file_paths, execution)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    s.common.id.as_str(),
                    s.estimated_hours,
                    s.priority,
                    s.sequence,
                    s.registered_at.as_ref().map(ts_to_sql),
                    s.assigned_agent,
                    json_vec(&s.file_paths)?,
                    serde_json::to_string(&s.execution)?,
                ],
            )?;
        }
    }
    Ok(())
}

fn update_variant(tx: &Transaction<'_>, task: &AnyTask) -> Result<(), StoreError> {
    match task {
        AnyTask::Epic(e) => {
            tx.execute(
                "UPDATE epics SET estimated_story_points = ?2, priority = ?3,
                        assigned_agent = ?4, child_pbi_ids = ?5
                 WHERE task_id = ?1",
                params![
                    e.common.id.as_str(),
                    e.estimated_story_points,
                    e.priority,
                    e.assigned_agent,
                    json_vec(&e.child_pbi_ids)?,
                ],
            )?;
        }
        AnyTask::Pbi(p) => {
            tx.execute(
                "UPDATE pbis SET story_points = ?2, priority = ?3, assigned_agent = ?4,
                        acceptance_criteria = ?5, child_sbi_ids = ?6
                 WHERE task_id = ?1",
                params![
                    p.common.id.as_str(),
                    p.story_points,
                    p.priority,
                    p.assigned_agent,
                    json_vec(&p.acceptance_criteria)?,
                    json_vec(&p.child_sbi_ids)?,
                ],
            )?;
        }
        AnyTask::Sbi(s) => {
            tx.execute(
                "UPDATE sbis SET estimated_hours = ?2, priority = ?3, sequence = ?4,
                        registered_at = ?5, assigned_agent = ?6, file_paths = ?7, execution = ?8
                 WHERE task_id = ?1",
                params![
                    s.common.id.as_str(),
                    s.estimated_hours,
                    s.priority,
                    s.sequence,
                    s.registered_at.as_ref().map(ts_to_sql),
                    s.assigned_agent,
                    json_vec(&s.file_paths)?,
                    serde_json::to_string(&s.execution)?,
                ],
            )?;
        }
    }
    Ok(())
}

fn task_labels(task: &AnyTask) -> &[String] {
    match task {
        AnyTask::Epic(e) => &e.labels,
        AnyTask::Pbi(p) => &p.labels,
        AnyTask::Sbi(s) => &s.labels,
    }
}

fn load_labels(conn: &Connection, id: &TaskId) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT label FROM labels WHERE task_id = ?1 ORDER BY label")?;
    let rows = stmt.query_map(params![id.as_str()], |r| r.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn replace_labels(tx: &Transaction<'_>, id: &TaskId, labels: &[String]) -> Result<(), StoreError> {
    tx.execute("DELETE FROM labels WHERE task_id = ?1", params![id.as_str()])?;
    for label in labels {
        tx.execute(
            "INSERT OR IGNORE INTO labels (task_id, label) VALUES (?1, ?2)",
            params![id.as_str(), label],
        )?;
    }
    Ok(())
}

/// Append `child` to the parent's child-id list and bump the parent's
/// version, keeping both sides of the link consistent in one commit.
fn link_child(tx: &Transaction<'_>, parent: &TaskId, child: &TaskId) -> Result<(), StoreError> {
    let parent_kind = kind_of(tx, parent)?;
    let (table, column) = match parent_kind {
        TaskKind::Epic => ("epics", "child_pbi_ids"),
        TaskKind::Pbi => ("pbis", "child_sbi_ids"),
        TaskKind::Sbi => {
            return Err(StoreError::Task(deespec_core::TaskError::Hierarchy(
                "SBI cannot have children".into(),
            )))
        }
    };

    let current: String = tx.query_row(
        &format!("SELECT {column} FROM {table} WHERE task_id = ?1"),
        params![parent.as_str()],
        |r| r.get(0),
    )?;
    let mut ids: Vec<TaskId> = from_json_vec(&current)?;
    if !ids.contains(child) {
        ids.push(child.clone());
        tx.execute(
            &format!("UPDATE {table} SET {column} = ?2 WHERE task_id = ?1"),
            params![parent.as_str(), json_vec(&ids)?],
        )?;
        tx.execute(
            "UPDATE tasks SET version = version + 1 WHERE id = ?1",
            params![parent.as_str()],
        )?;
    }
    Ok(())
}

fn unlink_child(tx: &Transaction<'_>, parent: &TaskId, child: &TaskId) -> Result<(), StoreError> {
    let parent_kind = kind_of(tx, parent)?;
    let (table, column) = match parent_kind {
        TaskKind::Epic => ("epics", "child_pbi_ids"),
        TaskKind::Pbi => ("pbis", "child_sbi_ids"),
        TaskKind::Sbi => return Ok(()),
    };

    let current: String = tx.query_row(
        &format!("SELECT {column} FROM {table} WHERE task_id = ?1"),
        params![parent.as_str()],
        |r| r.get(0),
    )?;
    let mut ids: Vec<TaskId> = from_json_vec(&current)?;
    let before = ids.len();
    ids.retain(|c| c != child);
    if ids.len() != before {
        tx.execute(
            &format!("UPDATE {table} SET {column} = ?2 WHERE task_id = ?1"),
            params![parent.as_str(), json_vec(&ids)?],
        )?;
        tx.execute(
            "UPDATE tasks SET version = version + 1 WHERE id = ?1",
            params![parent.as_str()],
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
