// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact metadata.
//!
//! Artifacts are immutable blobs produced during a turn (agent output,
//! specs, logs). The storage gateway generates the content-addressed id
//! and persists a `metadata.json` sidecar that mirrors
//! [`ArtifactMetadata`] exactly, so the camelCase field names here are
//! the on-disk format.

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

crate::define_id! {
    /// Content-addressed artifact identifier:
    /// `first 12 hex chars of sha256(content)` + `-` + epoch millis.
    pub struct ArtifactId;
}

/// Category of produced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Code,
    Spec,
    Data,
    Log,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Code => write!(f, "code"),
            ArtifactKind::Spec => write!(f, "spec"),
            ArtifactKind::Data => write!(f, "data"),
            ArtifactKind::Log => write!(f, "log"),
        }
    }
}

/// Sidecar metadata for one stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub id: ArtifactId,
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub storage_path: String,
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
