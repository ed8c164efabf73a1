// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace layout.
//!
//! Everything lives under one base directory (default `~/.deespec`,
//! overridable via `DEESPEC_HOME`):
//!
//! ```text
//! deespec.db                     transactional store
//! var/journal.ndjson             audit journal
//! artifacts/<task>/<id>/...      artifact store
//! specs/sbi/<id>/                per-SBI working set
//! specs/pbi/<id>/                per-PBI body + approval manifest
//! specs/epic/<id>/               per-EPIC body + approval manifest
//! prompts/*.md, prompts/labels/  templates
//! ```

use crate::error::EngineError;
use deespec_core::TaskId;
use std::path::{Path, PathBuf};

/// Default template for work-in-progress turns.
const DEFAULT_WIP: &str = "\
# Implement

You are implementing one small backlog item. Read the instruction and
produce the complete change, explaining what you did.
";

/// Default template for review turns.
const DEFAULT_REVIEW: &str = "\
# Review

Review the implementation artifact below against the instruction.
End your reply with exactly one verdict token: SUCCEEDED, NEEDS_CHANGES,
or FAILED.
";

/// Default template for re-work after a review demanded changes.
const DEFAULT_REVIEW_AND_WIP: &str = "\
# Address review feedback

A previous review demanded changes. Apply the feedback in the notes
below and produce the corrected change.
";

/// Default template for decomposition turns.
const DEFAULT_PBI_DECOMPOSE: &str = "\
# Decompose

Break the backlog item below into independently implementable sub-items.
Emit one section per sub-item, each starting with a line of the form
`### SBI: <title>`.
";

/// Resolves every path the engine touches, relative to one base dir.
#[derive(Debug, Clone)]
pub struct Workspace {
    base: PathBuf,
}

impl Workspace {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Workspace at the environment-selected base directory.
    pub fn from_env() -> Self {
        Self::new(deespec_adapters::base_dir())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn db_path(&self) -> PathBuf {
        self.base.join("deespec.db")
    }

    pub fn journal_path(&self) -> PathBuf {
        self.base.join("var").join("journal.ndjson")
    }

    pub fn runner_stats_path(&self) -> PathBuf {
        self.base.join("var").join("runner_stats.json")
    }

    pub fn specs_dir(&self, kind_dir: &str) -> PathBuf {
        self.base.join("specs").join(kind_dir)
    }

    pub fn sbi_dir(&self, id: &TaskId) -> PathBuf {
        self.specs_dir("sbi").join(id.as_str())
    }

    pub fn pbi_dir(&self, id: &TaskId) -> PathBuf {
        self.specs_dir("pbi").join(id.as_str())
    }

    pub fn epic_dir(&self, id: &TaskId) -> PathBuf {
        self.specs_dir("epic").join(id.as_str())
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.base.join("prompts")
    }

    pub fn prompt_path(&self, template: &str) -> PathBuf {
        self.prompts_dir().join(template)
    }

    pub fn label_prompt_path(&self, label: &str) -> PathBuf {
        self.prompts_dir().join("labels").join(format!("{label}.md"))
    }

    /// A spec path is valid when it sits under the base directory and is
    /// not a symlink (nor reached through one).
    pub fn check_contained(&self, path: &Path) -> Result<(), EngineError> {
        let meta = std::fs::symlink_metadata(path)
            .map_err(|e| EngineError::Meta(format!("{}: {e}", path.display())))?;
        if meta.file_type().is_symlink() {
            return Err(EngineError::Meta(format!(
                "symlinked spec path: {}",
                path.display()
            )));
        }
        let canonical_base = self
            .base
            .canonicalize()
            .map_err(|e| EngineError::Meta(format!("{}: {e}", self.base.display())))?;
        let canonical = path
            .canonicalize()
            .map_err(|e| EngineError::Meta(format!("{}: {e}", path.display())))?;
        if !canonical.starts_with(&canonical_base) {
            return Err(EngineError::Meta(format!(
                "spec path escapes workspace: {}",
                path.display()
            )));
        }
        Ok(())
    }

    /// Create the directory layout and materialize default prompt
    /// templates where none exist, so a fresh workspace can run.
    pub fn init(&self) -> Result<(), EngineError> {
        for dir in [
            self.base.clone(),
            self.base.join("var"),
            self.base.join("artifacts"),
            self.specs_dir("sbi"),
            self.specs_dir("pbi"),
            self.specs_dir("epic"),
            self.prompts_dir(),
            self.prompts_dir().join("labels"),
        ] {
            std::fs::create_dir_all(&dir)?;
        }

        for (name, body) in [
            ("WIP.md", DEFAULT_WIP),
            ("REVIEW.md", DEFAULT_REVIEW),
            ("REVIEW_AND_WIP.md", DEFAULT_REVIEW_AND_WIP),
            ("PBI_DECOMPOSE.md", DEFAULT_PBI_DECOMPOSE),
        ] {
            let path = self.prompt_path(name);
            if !path.exists() {
                std::fs::write(&path, body)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
