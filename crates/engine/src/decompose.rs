// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decomposition turns and the approval workflow.
//!
//! EPIC and PBI turns do not produce code: the agent emits a list of
//! child items, each of which is written as a spec file and tracked in
//! an `approval.yaml` manifest. Children are only materialized as store
//! entities when an approval arrives, at which point the child insert
//! and the parent's child-list update commit in one transaction.

use crate::error::EngineError;
use crate::prompt;
use crate::workspace::Workspace;
use deespec_adapters::{AgentGateway, AgentRequest, ArtifactStore, CancelToken, SaveArtifact};
use deespec_core::{
    AnyTask, ArtifactKind, Clock, Pbi, Sbi, Task, TaskId, TaskKind,
};
use deespec_storage::{tasks, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Review state of one proposed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// One proposed child in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub file: String,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// `approval.yaml`: the proposed children and whether they were
/// registered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApprovalManifest {
    #[serde(default)]
    pub items: Vec<ApprovalEntry>,
    #[serde(default)]
    pub registered: bool,
}

impl ApprovalManifest {
    pub fn load(path: &PathBuf) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Meta(format!("{}: {e}", path.display())))?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn save(&self, path: &PathBuf) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

/// A parsed child proposal from the agent's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildDraft {
    pub title: String,
    pub body: String,
}

/// Split agent output on `### SBI: <title>` section markers.
pub fn parse_decomposition(output: &str) -> Vec<ChildDraft> {
    let mut drafts: Vec<ChildDraft> = Vec::new();
    for line in output.lines() {
        if let Some(title) = line.trim().strip_prefix("### SBI:") {
            drafts.push(ChildDraft {
                title: title.trim().to_string(),
                body: String::new(),
            });
        } else if let Some(current) = drafts.last_mut() {
            current.body.push_str(line);
            current.body.push('\n');
        }
    }
    for draft in &mut drafts {
        draft.body = draft.body.trim().to_string();
    }
    drafts.retain(|d| !d.title.is_empty());
    drafts
}

/// Runs decomposition turns and materializes approved children.
pub struct Decomposer {
    store: Arc<Store>,
    ws: Workspace,
    agent: Arc<dyn AgentGateway>,
    artifacts: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    pub timeout: Duration,
}

impl Decomposer {
    pub fn new(
        store: Arc<Store>,
        ws: Workspace,
        agent: Arc<dyn AgentGateway>,
        artifacts: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ws,
            agent,
            artifacts,
            clock,
            timeout: Duration::from_secs(300),
        }
    }

    fn spec_dir(&self, task: &AnyTask) -> PathBuf {
        match task.kind() {
            TaskKind::Epic => self.ws.epic_dir(task.id()),
            TaskKind::Pbi => self.ws.pbi_dir(task.id()),
            TaskKind::Sbi => self.ws.sbi_dir(task.id()),
        }
    }

    /// Run one decomposition turn: ask the agent for child items, write
    /// their spec files, and produce a pending approval manifest.
    pub async fn decompose(
        &self,
        id: &TaskId,
        cancel: &CancelToken,
    ) -> Result<ApprovalManifest, EngineError> {
        let task = self.store.with_conn(|c| tasks::get(c, id))?;
        if task.kind() == TaskKind::Sbi {
            return Err(EngineError::Task(deespec_core::TaskError::Validation(
                "SBIs are executed, not decomposed".into(),
            )));
        }

        let template = prompt::load_template(&self.ws, "PBI_DECOMPOSE.md")?;
        let body = format!(
            "{}\n\n{}",
            task.common().title,
            task.common().description
        );
        let prompt_text = format!("{template}\n## Item\n\n{body}\n");

        let mut req = AgentRequest::new(prompt_text, self.timeout);
        req.context.insert("task_id".into(), id.to_string());
        let response = self.agent.execute(req, cancel).await?;

        let drafts = parse_decomposition(&response.output);
        let dir = self.spec_dir(&task);
        std::fs::create_dir_all(&dir)?;

        // Keep the raw decomposition as an artifact for audit
        let save = SaveArtifact::text(id.clone(), ArtifactKind::Spec, response.output.clone());
        self.artifacts.save(save).await?;

        let mut manifest = ApprovalManifest::default();
        for (n, draft) in drafts.iter().enumerate() {
            let file = format!("child_{:02}.md", n + 1);
            std::fs::write(
                dir.join(&file),
                format!("# {}\n\n{}\n", draft.title, draft.body),
            )?;
            manifest.items.push(ApprovalEntry {
                file,
                status: ApprovalStatus::Pending,
                reviewed_by: None,
                reviewed_at: None,
                rejection_reason: None,
            });
        }
        manifest.save(&dir.join("approval.yaml"))?;
        info!(task_id = %id, children = manifest.items.len(), "decomposition manifest written");
        Ok(manifest)
    }

    /// Materialize the approved children of `id` from its manifest.
    ///
    /// An approval carrying zero approved entries is a validation
    /// failure rather than a silent no-op: it would otherwise mark the
    /// manifest registered with nothing created.
    pub fn register_approved(&self, id: &TaskId) -> Result<Vec<TaskId>, EngineError> {
        let parent = self.store.with_conn(|c| tasks::get(c, id))?;
        let dir = self.spec_dir(&parent);
        let manifest_path = dir.join("approval.yaml");
        let mut manifest = ApprovalManifest::load(&manifest_path)?;

        if manifest.registered {
            return Err(EngineError::Task(deespec_core::TaskError::Validation(
                format!("approval for {id} already registered"),
            )));
        }
        let approved: Vec<ApprovalEntry> = manifest
            .items
            .iter()
            .filter(|e| e.status == ApprovalStatus::Approved)
            .cloned()
            .collect();
        if approved.is_empty() {
            return Err(EngineError::Task(deespec_core::TaskError::Validation(
                format!("approval for {id} contains no approved entries"),
            )));
        }

        let clock = &self.clock;
        let mut created = Vec::new();
        for (n, entry) in approved.iter().enumerate() {
            let title = child_title(&dir.join(&entry.file))
                .unwrap_or_else(|| format!("{} part {}", parent.common().title, n + 1));
            let child_id = TaskId::new(format!("{id}-c{:02}", n + 1));

            let child: AnyTask = match parent.kind() {
                TaskKind::Epic => Pbi::new(child_id.clone(), title, Some(id.clone()), clock)?.into(),
                TaskKind::Pbi => Sbi::new(child_id.clone(), title, Some(id.clone()), clock)?.into(),
                TaskKind::Sbi => unreachable!("SBIs are rejected at decompose time"),
            };
            self.store.with_tx(|tx| tasks::insert(tx, &child))?;
            created.push(child_id);
        }

        manifest.registered = true;
        manifest.save(&manifest_path)?;
        info!(task_id = %id, created = created.len(), "approved children registered");
        Ok(created)
    }
}

fn child_title(path: &PathBuf) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    text.lines()
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
}

#[cfg(test)]
#[path = "decompose_tests.rs"]
mod tests;
