// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent gateway port.
//!
//! A gateway executes one prompt and returns text plus metadata; it must
//! respect the request timeout and the caller's cancellation, and it
//! must never mutate engine state. An agent *refusal* is a successful
//! response whose output explains itself — only transport-level failures
//! are errors.

mod claude;

pub use claude::ClaudeGateway;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAgentGateway;

use crate::cancel::CancelToken;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors from gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
    #[error("canceled")]
    Canceled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("agent misconfigured: {0}")]
    Configuration(String),
}

impl AgentError {
    /// Transport errors are retried by the workflow engine's backoff
    /// policy; everything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Transport(_))
    }
}

/// One prompt execution request.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub prompt: String,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Free-form context forwarded to the agent (task id, turn, ...).
    pub context: HashMap<String, String>,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            timeout,
            max_tokens: None,
            temperature: None,
            context: HashMap::new(),
        }
    }
}

/// Result of one prompt execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub output: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub tokens_used: Option<u64>,
    pub agent_kind: String,
    pub metadata: HashMap<String, String>,
}

/// What a gateway's backing agent can do.
#[derive(Debug, Clone)]
pub struct AgentCapability {
    pub supports_code_generation: bool,
    pub supports_review: bool,
    pub supports_test: bool,
    pub max_prompt_size: usize,
    /// Worker-pool width the runner may use with this agent.
    pub concurrent_tasks: usize,
    pub agent_kind: String,
}

impl AgentCapability {
    /// Conservative default: one task at a time, generous prompt size.
    pub fn basic(agent_kind: impl Into<String>) -> Self {
        Self {
            supports_code_generation: true,
            supports_review: true,
            supports_test: false,
            max_prompt_size: 200_000,
            concurrent_tasks: 1,
            agent_kind: agent_kind.into(),
        }
    }
}

/// Port to an AI agent backend.
#[async_trait]
pub trait AgentGateway: Send + Sync + std::fmt::Debug {
    /// Execute one prompt.
    ///
    /// Returns `DeadlineExceeded` when `req.timeout` elapses and
    /// `Canceled` when the token fires; either way the underlying work
    /// is aborted before returning.
    async fn execute(
        &self,
        req: AgentRequest,
        cancel: &CancelToken,
    ) -> Result<AgentResponse, AgentError>;

    fn capability(&self) -> AgentCapability;

    /// Cheap liveness probe of the backend.
    async fn health_check(&self) -> Result<(), AgentError>;
}

/// Select a gateway by agent name.
///
/// `claude` (the default) drives the Claude CLI; the factory is where
/// provider API keys are read from the environment.
pub fn gateway_for(agent_name: &str) -> Result<std::sync::Arc<dyn AgentGateway>, AgentError> {
    match agent_name {
        "" | "claude" | "claude-code" => Ok(std::sync::Arc::new(ClaudeGateway::from_env())),
        other => Err(AgentError::Configuration(format!(
            "unknown agent backend: {other}"
        ))),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
