// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact storage port.
//!
//! Stores immutable turn artifacts and serves instruction documents.
//! Implementations generate the artifact id (content hash prefix plus
//! timestamp); the engine treats ids as opaque. Metadata must round-trip
//! exactly — the sidecar is the only index.

mod fs;

pub use fs::FsArtifactStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod memory;
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryArtifactStore;

use async_trait::async_trait;
use deespec_core::{ArtifactId, ArtifactKind, ArtifactMetadata, TaskId};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from artifact operations.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("instruction not found: {0}")]
    InstructionNotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("corrupt metadata for {id}: {message}")]
    Corrupt { id: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A save request; everything except the id, which the store generates.
#[derive(Debug, Clone)]
pub struct SaveArtifact {
    pub task_id: TaskId,
    pub kind: ArtifactKind,
    pub content: Vec<u8>,
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

impl SaveArtifact {
    pub fn text(task_id: TaskId, kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            task_id,
            kind,
            content: content.into().into_bytes(),
            content_type: "text/markdown".to_string(),
            metadata: BTreeMap::new(),
        }
    }
}

/// A loaded artifact: sidecar metadata plus content.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub metadata: ArtifactMetadata,
    pub content: Vec<u8>,
}

/// Port to artifact storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist content and return the generated metadata.
    async fn save(&self, req: SaveArtifact) -> Result<ArtifactMetadata, ArtifactStoreError>;

    /// Load one artifact with its metadata.
    async fn load(
        &self,
        task_id: &TaskId,
        artifact_id: &ArtifactId,
    ) -> Result<Artifact, ArtifactStoreError>;

    /// Load an instruction document by workspace-relative path.
    async fn load_instruction(&self, path: &str) -> Result<String, ArtifactStoreError>;

    /// All artifact metadata for one task, ordered by upload time.
    async fn list(&self, task_id: &TaskId) -> Result<Vec<ArtifactMetadata>, ArtifactStoreError>;
}

/// Content-addressed id: first 12 hex chars of sha256(content), a dash,
/// and the upload timestamp in epoch millis.
pub(crate) fn artifact_id(content: &[u8], epoch_ms: u64) -> ArtifactId {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(content);
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    ArtifactId::new(format!("{hex}-{epoch_ms}"))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
