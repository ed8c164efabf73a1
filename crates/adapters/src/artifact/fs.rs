// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem artifact store.
//!
//! Layout under the base directory:
//!
//! ```text
//! artifacts/<task_id>/<artifact_id>/content
//! artifacts/<task_id>/<artifact_id>/metadata.json
//! ```
//!
//! The sidecar mirrors [`ArtifactMetadata`] exactly; listing reads
//! sidecars only. Instruction documents resolve relative to the base
//! directory with a containment check so a crafted path cannot escape
//! the workspace.

use super::{artifact_id, Artifact, ArtifactStore, ArtifactStoreError, SaveArtifact};
use async_trait::async_trait;
use chrono::Utc;
use deespec_core::{ArtifactId, ArtifactMetadata, TaskId};
use std::path::{Component, Path, PathBuf};

/// Store rooted at the workspace base directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    base: PathBuf,
}

impl FsArtifactStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn artifact_dir(&self, task_id: &TaskId, artifact_id: &ArtifactId) -> PathBuf {
        self.base
            .join("artifacts")
            .join(task_id.as_str())
            .join(artifact_id.as_str())
    }

    /// Reject absolute paths and any `..` traversal before joining.
    fn resolve_relative(&self, rel: &str) -> Result<PathBuf, ArtifactStoreError> {
        let candidate = Path::new(rel);
        if candidate.is_absolute() {
            return Err(ArtifactStoreError::InvalidPath(format!(
                "absolute path not allowed: {rel}"
            )));
        }
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ArtifactStoreError::InvalidPath(format!(
                "path escapes workspace: {rel}"
            )));
        }
        Ok(self.base.join(candidate))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, req: SaveArtifact) -> Result<ArtifactMetadata, ArtifactStoreError> {
        let uploaded_at = Utc::now();
        let id = artifact_id(&req.content, uploaded_at.timestamp_millis().max(0) as u64);
        let dir = self.artifact_dir(&req.task_id, &id);
        std::fs::create_dir_all(&dir)?;

        let content_path = dir.join("content");
        std::fs::write(&content_path, &req.content)?;

        let meta = ArtifactMetadata {
            id: id.clone(),
            task_id: req.task_id,
            kind: req.kind,
            storage_path: content_path.to_string_lossy().into_owned(),
            content_type: req.content_type,
            size: req.content.len() as u64,
            uploaded_at,
            metadata: req.metadata,
        };
        std::fs::write(dir.join("metadata.json"), serde_json::to_vec_pretty(&meta)?)?;
        Ok(meta)
    }

    async fn load(
        &self,
        task_id: &TaskId,
        artifact_id: &ArtifactId,
    ) -> Result<Artifact, ArtifactStoreError> {
        let dir = self.artifact_dir(task_id, artifact_id);
        if !dir.is_dir() {
            return Err(ArtifactStoreError::NotFound(format!(
                "{task_id}/{artifact_id}"
            )));
        }

        let raw = std::fs::read(dir.join("metadata.json"))?;
        let metadata: ArtifactMetadata =
            serde_json::from_slice(&raw).map_err(|e| ArtifactStoreError::Corrupt {
                id: artifact_id.to_string(),
                message: e.to_string(),
            })?;
        let content = std::fs::read(dir.join("content"))?;
        Ok(Artifact { metadata, content })
    }

    async fn load_instruction(&self, path: &str) -> Result<String, ArtifactStoreError> {
        let resolved = self.resolve_relative(path)?;
        std::fs::read_to_string(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtifactStoreError::InstructionNotFound(path.to_string())
            } else {
                e.into()
            }
        })
    }

    async fn list(&self, task_id: &TaskId) -> Result<Vec<ArtifactMetadata>, ArtifactStoreError> {
        let dir = self.base.join("artifacts").join(task_id.as_str());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for entry in entries {
            let sidecar = entry?.path().join("metadata.json");
            if !sidecar.is_file() {
                continue;
            }
            let raw = std::fs::read(&sidecar)?;
            match serde_json::from_slice::<ArtifactMetadata>(&raw) {
                Ok(meta) => out.push(meta),
                Err(e) => {
                    tracing::warn!(
                        path = %sidecar.display(),
                        error = %e,
                        "skipping corrupt artifact sidecar",
                    );
                }
            }
        }
        out.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
