// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-SBI `meta.yaml` registration metadata.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sentinel sort key for unset POR/priority; sorts last.
pub const UNSET_ORDER: u32 = 999;

/// Contents of `specs/sbi/<id>/meta.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub por: Option<u32>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl TaskMeta {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            priority: None,
            por: None,
            depends_on: Vec::new(),
            phase: None,
            role: None,
            labels: Vec::new(),
        }
    }

    /// Pick ordering key: `(POR, priority, id)`, unset values last.
    pub fn order_key(&self) -> (u32, u32, &str) {
        (
            self.por.unwrap_or(UNSET_ORDER),
            self.priority.unwrap_or(UNSET_ORDER),
            self.id.as_str(),
        )
    }
}

/// Load `meta.yaml` from a spec directory.
pub fn load_meta(dir: &Path) -> Result<TaskMeta, EngineError> {
    let path = dir.join("meta.yaml");
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| EngineError::Meta(format!("{}: {e}", path.display())))?;
    serde_yaml::from_str(&raw).map_err(|e| EngineError::Meta(format!("{}: {e}", path.display())))
}

/// Write `meta.yaml` into a spec directory.
pub fn save_meta(dir: &Path, meta: &TaskMeta) -> Result<(), EngineError> {
    std::fs::create_dir_all(dir)?;
    let raw = serde_yaml::to_string(meta)?;
    std::fs::write(dir.join("meta.yaml"), raw)?;
    Ok(())
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
