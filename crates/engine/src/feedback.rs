// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feedback-draft generator.
//!
//! When the pick resolver finds a task incomplete it drafts a feedback
//! SBI: three files under the target's spec directory plus an
//! `fb_sbi_draft` journal artifact. Registration of the draft happens
//! elsewhere; an `fb_sbi_registered` (or earlier `fb_sbi_draft`) marker
//! for the same target suppresses duplicates.

use crate::error::EngineError;
use crate::pick::IncompleteReason;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use deespec_core::{ArtifactRef, Clock, JournalRecord, Step, TaskId, TaskStatus};
use deespec_storage::Journal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Contents of `fb_draft.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FbDraft {
    pub target_task_id: String,
    pub reason_code: IncompleteReason,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub evidence_paths: Vec<String>,
    pub suggested_fb_id: String,
    pub created_at: DateTime<Utc>,
    pub labels: Vec<String>,
    pub por: u32,
    pub priority: u32,
    pub relates_to: String,
    pub details: String,
}

/// Writes feedback drafts for incomplete pick targets.
#[derive(Clone)]
pub struct FeedbackGenerator {
    ws: Workspace,
    journal: Journal,
    clock: Arc<dyn Clock>,
}

impl FeedbackGenerator {
    pub fn new(ws: Workspace, journal: Journal, clock: Arc<dyn Clock>) -> Self {
        Self { ws, journal, clock }
    }

    /// Draft feedback for `target`, unless one already exists.
    ///
    /// Returns `true` when a draft was written, `false` when
    /// deduplication suppressed it.
    pub fn generate(
        &self,
        target: &TaskId,
        reason: &IncompleteReason,
        details: Option<String>,
    ) -> Result<bool, EngineError> {
        if self.journal.has_marker_for("fb_sbi_registered", target)?
            || self.journal.has_marker_for("fb_sbi_draft", target)?
        {
            return Ok(false);
        }

        let now = self.clock.now_utc();
        let dir = self.ws.sbi_dir(target);
        std::fs::create_dir_all(&dir)?;

        let details = details.unwrap_or_else(|| {
            format!("pick resolver found {target} incomplete: {reason}")
        });

        let context = format!(
            "# Feedback context for {target}\n\n\
             - reason: {reason}\n\
             - detected at: {}\n\n\
             {details}\n",
            now.to_rfc3339(),
        );
        std::fs::write(dir.join("fb_context.md"), context)?;

        let evidence = format!("{}\n{}\n", dir.join("meta.yaml").display(), dir.display());
        std::fs::write(dir.join("fb_evidence.txt"), &evidence)?;

        let draft = FbDraft {
            target_task_id: target.to_string(),
            reason_code: reason.clone(),
            title: format!("Unblock {target}: {reason}"),
            summary: details.clone(),
            evidence_paths: vec![
                dir.join("fb_context.md").to_string_lossy().into_owned(),
                dir.join("fb_evidence.txt").to_string_lossy().into_owned(),
            ],
            suggested_fb_id: format!("fb-{target}"),
            created_at: now,
            labels: vec!["feedback".into(), "pick".into(), "sbi-fb".into()],
            por: 1,
            priority: 1,
            relates_to: target.to_string(),
            details,
        };
        let draft_path = dir.join("fb_draft.yaml");
        std::fs::write(&draft_path, serde_yaml::to_string(&draft)?)?;

        let marker = ArtifactRef::Object(serde_json::json!({
            "type": "fb_sbi_draft",
            "target_task_id": target.as_str(),
            "reason": reason.to_string(),
            "draft_path": draft_path.to_string_lossy(),
        }));
        // Keep the target's journal turns monotone even if it ran before
        let turn = self.journal.last_for(target)?.map_or(0, |r| r.turn);
        let record = JournalRecord::new(now, target.clone(), turn, Step::Plan, TaskStatus::Pending)
            .with_artifact(marker);
        self.journal.append(&record)?;

        info!(target = %target, reason = %reason, "wrote feedback draft");
        Ok(true)
    }
}

#[cfg(test)]
#[path = "feedback_tests.rs"]
mod tests;
