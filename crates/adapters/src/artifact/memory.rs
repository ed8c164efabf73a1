// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory artifact store for tests.

use super::{artifact_id, Artifact, ArtifactStore, ArtifactStoreError, SaveArtifact};
use async_trait::async_trait;
use chrono::Utc;
use deespec_core::{ArtifactId, ArtifactMetadata, TaskId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Map-backed store; clones share contents.
#[derive(Clone, Default)]
pub struct MemoryArtifactStore {
    artifacts: Arc<Mutex<HashMap<(TaskId, ArtifactId), Artifact>>>,
    instructions: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an instruction document at a workspace-relative path.
    pub fn put_instruction(&self, path: impl Into<String>, text: impl Into<String>) {
        self.instructions.lock().insert(path.into(), text.into());
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn save(&self, req: SaveArtifact) -> Result<ArtifactMetadata, ArtifactStoreError> {
        let uploaded_at = Utc::now();
        let id = artifact_id(&req.content, uploaded_at.timestamp_millis().max(0) as u64);
        let meta = ArtifactMetadata {
            id: id.clone(),
            task_id: req.task_id.clone(),
            kind: req.kind,
            storage_path: format!("memory://{}/{}", req.task_id, id),
            content_type: req.content_type,
            size: req.content.len() as u64,
            uploaded_at,
            metadata: req.metadata,
        };
        self.artifacts.lock().insert(
            (req.task_id, id),
            Artifact {
                metadata: meta.clone(),
                content: req.content,
            },
        );
        Ok(meta)
    }

    async fn load(
        &self,
        task_id: &TaskId,
        artifact_id: &ArtifactId,
    ) -> Result<Artifact, ArtifactStoreError> {
        self.artifacts
            .lock()
            .get(&(task_id.clone(), artifact_id.clone()))
            .cloned()
            .ok_or_else(|| ArtifactStoreError::NotFound(format!("{task_id}/{artifact_id}")))
    }

    async fn load_instruction(&self, path: &str) -> Result<String, ArtifactStoreError> {
        self.instructions
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| ArtifactStoreError::InstructionNotFound(path.to_string()))
    }

    async fn list(&self, task_id: &TaskId) -> Result<Vec<ArtifactMetadata>, ArtifactStoreError> {
        let mut out: Vec<ArtifactMetadata> = self
            .artifacts
            .lock()
            .iter()
            .filter(|((tid, _), _)| tid == task_id)
            .map(|(_, a)| a.metadata.clone())
            .collect();
        out.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
