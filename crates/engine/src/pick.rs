// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pick & dependency resolver.
//!
//! Scans `specs/sbi/*/meta.yaml` for candidates, orders them by
//! `(POR, priority, id)` with unset keys last, and applies the readiness
//! filter in a fixed order. The first ready candidate is selected and a
//! `plan` journal record with a `pick` artifact is appended, making the
//! selection auditable before the workflow engine touches anything.
//! Incomplete candidates (except journal-guard deferrals) are handed to
//! the feedback-draft generator at most once per target.

use crate::error::EngineError;
use crate::feedback::FeedbackGenerator;
use crate::meta::{self, TaskMeta};
use crate::prompt;
use crate::workspace::Workspace;
use deespec_core::{Clock, JournalRecord, PickInfo, Step, TaskId, TaskStatus};
use deespec_storage::{locks, Journal, Store};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a candidate could not be picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncompleteReason {
    MetaMissing,
    PathInvalid,
    PromptError,
    DepUnresolved,
    DepCycle,
    TimeFormat,
    JournalGuard,
}

impl IncompleteReason {
    /// Reasons that produce a feedback draft; journal-guard only defers.
    pub fn drafts_feedback(&self) -> bool {
        !matches!(self, IncompleteReason::JournalGuard)
    }
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            IncompleteReason::MetaMissing => "META_MISSING",
            IncompleteReason::PathInvalid => "PATH_INVALID",
            IncompleteReason::PromptError => "PROMPT_ERROR",
            IncompleteReason::DepUnresolved => "DEP_UNRESOLVED",
            IncompleteReason::DepCycle => "DEP_CYCLE",
            IncompleteReason::TimeFormat => "TIME_FORMAT",
            IncompleteReason::JournalGuard => "JOURNAL_GUARD",
        };
        write!(f, "{code}")
    }
}

/// A selected task.
#[derive(Debug, Clone)]
pub struct Selection {
    pub task_id: TaskId,
    pub meta: TaskMeta,
    pub spec_dir: PathBuf,
    pub pick_reason: String,
}

/// Result of one resolver pass.
#[derive(Debug, Clone)]
pub enum PickOutcome {
    Picked(Selection),
    /// Nothing ready; carries the reason of the best-ordered incomplete
    /// candidate, if any.
    NoTask { reason: Option<IncompleteReason> },
}

impl PickOutcome {
    pub fn selection(&self) -> Option<&Selection> {
        match self {
            PickOutcome::Picked(s) => Some(s),
            PickOutcome::NoTask { .. } => None,
        }
    }
}

/// Directory-driven candidate resolver.
pub struct PickResolver {
    ws: Workspace,
    store: Arc<Store>,
    journal: Journal,
    feedback: FeedbackGenerator,
    clock: Arc<dyn Clock>,
}

struct Candidate {
    id: TaskId,
    dir: PathBuf,
    meta: Option<TaskMeta>,
}

impl PickResolver {
    pub fn new(
        ws: Workspace,
        store: Arc<Store>,
        journal: Journal,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let feedback = FeedbackGenerator::new(ws.clone(), journal.clone(), Arc::clone(&clock));
        Self {
            ws,
            store,
            journal,
            feedback,
            clock,
        }
    }

    /// Run one resolver pass.
    pub fn pick(&self) -> Result<PickOutcome, EngineError> {
        let completed = self.journal.completed_set()?;
        let candidates = self.scan_candidates(&completed)?;
        if candidates.is_empty() {
            return Ok(PickOutcome::NoTask { reason: None });
        }

        let cyclic = detect_cycles(&candidates);
        let mut first_reason: Option<IncompleteReason> = None;

        for candidate in &candidates {
            match self.check_ready(candidate, &completed, &cyclic)? {
                Ok(()) => {
                    let meta = candidate.meta.clone().unwrap_or_else(|| {
                        // check_ready guarantees meta is present
                        TaskMeta::new(candidate.id.as_str())
                    });
                    return self.select(candidate, meta);
                }
                Err(reason) => {
                    debug!(task_id = %candidate.id, reason = %reason, "candidate not ready");
                    if reason.drafts_feedback() {
                        self.feedback.generate(&candidate.id, &reason, None)?;
                    }
                    first_reason.get_or_insert(reason);
                }
            }
        }

        Ok(PickOutcome::NoTask {
            reason: first_reason,
        })
    }

    /// Enumerate spec directories, excluding completed tasks.
    fn scan_candidates(&self, completed: &HashSet<TaskId>) -> Result<Vec<Candidate>, EngineError> {
        let root = self.ws.specs_dir("sbi");
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() && !entry.file_type()?.is_symlink() {
                continue;
            }
            let id = TaskId::new(entry.file_name().to_string_lossy().into_owned());
            if completed.contains(&id) {
                continue;
            }
            let dir = entry.path();
            let meta = match meta::load_meta(&dir) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    debug!(task_id = %id, error = %e, "unreadable meta.yaml");
                    None
                }
            };
            candidates.push(Candidate { id, dir, meta });
        }

        candidates.sort_by(|a, b| order_key(a).cmp(&order_key(b)));
        Ok(candidates)
    }

    /// Apply the readiness filter in order. The outer `Result` is for
    /// infrastructure failures; the inner one carries the incomplete
    /// reason.
    fn check_ready(
        &self,
        candidate: &Candidate,
        completed: &HashSet<TaskId>,
        cyclic: &HashSet<TaskId>,
    ) -> Result<Result<(), IncompleteReason>, EngineError> {
        let Some(meta) = &candidate.meta else {
            return Ok(Err(IncompleteReason::MetaMissing));
        };

        if self.ws.check_contained(&candidate.dir).is_err() {
            return Ok(Err(IncompleteReason::PathInvalid));
        }

        let status = self.stored_status(&candidate.id)?;
        let template = prompt::template_for_status(status);
        if prompt::load_template(&self.ws, template).is_err() {
            return Ok(Err(IncompleteReason::PromptError));
        }

        let unresolved = meta
            .depends_on
            .iter()
            .any(|dep| !completed.contains(dep.as_str()));
        if unresolved {
            return Ok(Err(IncompleteReason::DepUnresolved));
        }

        if cyclic.contains(&candidate.id) {
            return Ok(Err(IncompleteReason::DepCycle));
        }

        if self.journal_guard_active(&candidate.id)? {
            return Ok(Err(IncompleteReason::JournalGuard));
        }

        Ok(Ok(()))
    }

    /// Status from the store when the task is registered there; a
    /// directory-only task counts as pending.
    fn stored_status(&self, id: &TaskId) -> Result<TaskStatus, EngineError> {
        match self.store.with_conn(|c| deespec_storage::tasks::get(c, id)) {
            Ok(task) => Ok(deespec_core::Task::status(&task)),
            Err(deespec_storage::StoreError::NotFound { .. }) => Ok(TaskStatus::Pending),
            Err(e) => Err(e.into()),
        }
    }

    /// The journal says this task was picked but never progressed, and
    /// an expired run-lock row is still present: the holder died. Defer
    /// until the lock service sweeps the row.
    fn journal_guard_active(&self, id: &TaskId) -> Result<bool, EngineError> {
        let Some(last) = self.journal.last_for(id)? else {
            return Ok(false);
        };
        if last.step != Step::Plan || !last.has_artifact_kind("pick") {
            return Ok(false);
        }
        let lock = self
            .store
            .with_conn(|c| locks::find_run(c, &deespec_core::LockId::new(id.as_str())))?;
        match lock {
            Some(lock) if lock.is_expired(self.clock.now_utc()) => Ok(true),
            _ => Ok(false),
        }
    }

    fn select(&self, candidate: &Candidate, meta: TaskMeta) -> Result<PickOutcome, EngineError> {
        let pick_reason = format!(
            "por={} priority={} id={}",
            meta.por.map_or("unset".to_string(), |v| v.to_string()),
            meta.priority.map_or("unset".to_string(), |v| v.to_string()),
            candidate.id,
        );

        // The plan record carries the task's stored position so journal
        // turns stay monotone across review loops.
        let (turn, status) = match self.store.with_conn(|c| deespec_storage::tasks::get(c, &candidate.id)) {
            Ok(deespec_core::AnyTask::Sbi(sbi)) => (sbi.execution.current_turn, sbi.common.status),
            _ => (0, TaskStatus::Pending),
        };

        let pick = PickInfo {
            task_id: candidate.id.clone(),
            id: candidate.id.clone(),
            spec_path: Some(candidate.dir.to_string_lossy().into_owned()),
            por: meta.por,
            priority: meta.priority,
        };
        let record = JournalRecord::new(
            self.clock.now_utc(),
            candidate.id.clone(),
            turn,
            Step::Plan,
            status,
        )
        .with_artifact(pick.to_artifact());
        self.journal.append(&record)?;

        info!(task_id = %candidate.id, %pick_reason, "picked task");
        Ok(PickOutcome::Picked(Selection {
            task_id: candidate.id.clone(),
            meta,
            spec_dir: candidate.dir.clone(),
            pick_reason,
        }))
    }
}

fn order_key(candidate: &Candidate) -> (u32, u32, String) {
    match &candidate.meta {
        Some(meta) => {
            let (por, priority, _) = meta.order_key();
            (por, priority, candidate.id.to_string())
        }
        None => (
            crate::meta::UNSET_ORDER,
            crate::meta::UNSET_ORDER,
            candidate.id.to_string(),
        ),
    }
}

/// Tasks participating in a dependency cycle, found by DFS with an
/// explicit recursion stack: the first back-edge marks every task on
/// the stack as cyclic.
fn detect_cycles(candidates: &[Candidate]) -> HashSet<TaskId> {
    let graph: HashMap<&str, Vec<&str>> = candidates
        .iter()
        .filter_map(|c| {
            c.meta.as_ref().map(|m| {
                (
                    c.id.as_str(),
                    m.depends_on.iter().map(String::as_str).collect(),
                )
            })
        })
        .collect();

    let mut cyclic: HashSet<TaskId> = HashSet::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for &start in graph.keys() {
        if visited.contains(start) {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        let mut on_stack: Vec<&str> = vec![start];

        while let Some((node, next_child)) = stack.pop() {
            let children = graph.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next_child < children.len() {
                stack.push((node, next_child + 1));
                let child = children[next_child];
                if let Some(pos) = on_stack.iter().position(|n| *n == child) {
                    // Back-edge: everything from the cycle entry down is cyclic
                    for tainted in &on_stack[pos..] {
                        cyclic.insert(TaskId::new(*tainted));
                    }
                    warn!(task = child, "dependency cycle detected");
                } else if graph.contains_key(child) && !visited.contains(child) {
                    stack.push((child, 0));
                    on_stack.push(child);
                }
            } else {
                visited.insert(node);
                if on_stack.last() == Some(&node) {
                    on_stack.pop();
                }
            }
        }
    }

    cyclic
}

#[cfg(test)]
#[path = "pick_tests.rs"]
mod tests;
