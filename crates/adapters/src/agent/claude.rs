// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude CLI gateway.
//!
//! Runs the `claude` binary in non-interactive print mode, feeding the
//! prompt on stdin and reading the response from stdout. The subprocess
//! is killed on timeout or cancellation (`kill_on_drop`), so an aborted
//! turn leaves nothing running.

use super::{AgentCapability, AgentError, AgentGateway, AgentRequest, AgentResponse};
use crate::cancel::CancelToken;
use crate::env::ANTHROPIC_API_KEY_ENV;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Gateway driving the Claude CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct ClaudeGateway {
    command: String,
    api_key: Option<String>,
}

impl ClaudeGateway {
    pub fn new(command: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            command: command.into(),
            api_key,
        }
    }

    /// Read provider configuration from the environment.
    pub fn from_env() -> Self {
        let api_key = std::env::var(ANTHROPIC_API_KEY_ENV).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("{ANTHROPIC_API_KEY_ENV} not set; relying on the CLI's own credentials");
        }
        Self::new("claude", api_key)
    }

    fn build_command(&self, req: &AgentRequest) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("-p")
            .arg("--output-format")
            .arg("text")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = &self.api_key {
            cmd.env(ANTHROPIC_API_KEY_ENV, key);
        }
        for (k, v) in &req.context {
            cmd.env(format!("DEESPEC_CTX_{}", k.to_uppercase()), v);
        }
        cmd
    }
}

#[async_trait]
impl AgentGateway for ClaudeGateway {
    async fn execute(
        &self,
        req: AgentRequest,
        cancel: &CancelToken,
    ) -> Result<AgentResponse, AgentError> {
        let started = Instant::now();
        let mut child = self
            .build_command(&req)
            .spawn()
            .map_err(|e| AgentError::Transport(format!("spawn {}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(req.prompt.as_bytes())
                .await
                .map_err(|e| AgentError::Transport(format!("write prompt: {e}")))?;
            // Close stdin so the CLI knows the prompt is complete
            drop(stdin);
        }

        let work = child.wait_with_output();
        let output = tokio::select! {
            out = work => out.map_err(|e| AgentError::Transport(format!("wait: {e}")))?,
            _ = tokio::time::sleep(req.timeout) => {
                return Err(AgentError::DeadlineExceeded(req.timeout));
            }
            _ = cancel.canceled() => {
                return Err(AgentError::Canceled);
            }
        };

        let duration = started.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(exit_code, ms = duration.as_millis() as u64, "claude call finished");

        let mut metadata = std::collections::HashMap::new();
        if !stderr.is_empty() {
            metadata.insert("stderr".to_string(), stderr);
        }

        Ok(AgentResponse {
            output: stdout,
            exit_code,
            duration,
            tokens_used: None,
            agent_kind: "claude".to_string(),
            metadata,
        })
    }

    fn capability(&self) -> AgentCapability {
        AgentCapability {
            supports_test: true,
            ..AgentCapability::basic("claude")
        }
    }

    async fn health_check(&self) -> Result<(), AgentError> {
        let status = Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| AgentError::Transport(format!("spawn {}: {e}", self.command)))?;
        if status.success() {
            Ok(())
        } else {
            Err(AgentError::Configuration(format!(
                "{} --version exited with {status}",
                self.command
            )))
        }
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
