// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine errors, runner classification, and the presenter taxonomy.

use deespec_adapters::{AgentError, ArtifactStoreError};
use deespec_core::TaskError;
use deespec_storage::StoreError;
use std::fmt;
use thiserror::Error;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("agent: {0}")]
    Agent(#[from] AgentError),
    #[error("artifact store: {0}")]
    Artifact(#[from] ArtifactStoreError),
    #[error("prompt error: {0}")]
    Prompt(String),
    #[error("task metadata error: {0}")]
    Meta(String),
    #[error("lock held: {0}")]
    LockHeld(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("canceled")]
    Canceled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// How the continuous runner reacts to a failed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry next tick.
    Temporary,
    /// Keep running; an operator has to fix something.
    Configuration,
    /// Stop the loop.
    Critical,
    /// Keep running, but nothing is known about the cause.
    Unknown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Temporary => write!(f, "temporary"),
            ErrorClass::Configuration => write!(f, "configuration"),
            ErrorClass::Critical => write!(f, "critical"),
            ErrorClass::Unknown => write!(f, "unknown"),
        }
    }
}

impl EngineError {
    /// Classify for the runner's continue/stop policy.
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Agent(AgentError::Transport(_))
            | EngineError::Agent(AgentError::DeadlineExceeded(_))
            | EngineError::Store(StoreError::Unavailable(_))
            | EngineError::Store(StoreError::VersionConflict { .. })
            | EngineError::LockHeld(_) => ErrorClass::Temporary,
            EngineError::Prompt(_)
            | EngineError::Meta(_)
            | EngineError::Configuration(_)
            | EngineError::Agent(AgentError::Configuration(_)) => ErrorClass::Configuration,
            EngineError::Io(_) | EngineError::Store(StoreError::Sqlite(_)) => ErrorClass::Critical,
            _ => ErrorClass::Unknown,
        }
    }

    /// Tag from the error taxonomy, carried in structured output.
    pub fn taxonomy(&self) -> &'static str {
        match self {
            EngineError::Store(StoreError::NotFound { .. }) => "NotFound",
            EngineError::Store(StoreError::VersionConflict { .. }) => "VersionConflict",
            EngineError::Store(StoreError::NotOwner { .. }) => "NotOwner",
            EngineError::Store(StoreError::Unavailable(_)) => "StoreUnavailable",
            EngineError::Store(StoreError::Corrupt(_)) => "Corrupt",
            EngineError::Store(StoreError::Task(TaskError::Hierarchy(_)))
            | EngineError::Task(TaskError::Hierarchy(_)) => "HierarchyViolation",
            EngineError::Store(StoreError::Task(_)) => "ValidationError",
            EngineError::Store(_) => "StoreUnavailable",
            EngineError::Task(_) => "ValidationError",
            EngineError::Agent(AgentError::DeadlineExceeded(_)) => "DeadlineExceeded",
            EngineError::Agent(AgentError::Canceled) | EngineError::Canceled => "Canceled",
            EngineError::Agent(_) => "TransportError",
            EngineError::Artifact(ArtifactStoreError::NotFound(_)) => "NotFound",
            EngineError::Artifact(_) => "TransportError",
            EngineError::LockHeld(_) => "LockHeld",
            EngineError::Prompt(_) | EngineError::Meta(_) | EngineError::Configuration(_) => {
                "ValidationError"
            }
            EngineError::Io(_) | EngineError::Yaml(_) => "Corrupt",
        }
    }

    /// Whether a caller may reasonably retry the same operation.
    pub fn retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Temporary)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
