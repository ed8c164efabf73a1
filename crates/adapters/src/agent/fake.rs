// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted agent gateway for tests.

use super::{AgentCapability, AgentError, AgentGateway, AgentRequest, AgentResponse};
use crate::cancel::CancelToken;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Queue-driven fake: each `execute` pops the next scripted result and
/// records the request for later inspection. An empty queue yields an
/// "ok" response so simple tests need no scripting at all.
#[derive(Debug, Clone, Default)]
pub struct FakeAgentGateway {
    script: Arc<Mutex<VecDeque<Result<String, AgentError>>>>,
    calls: Arc<Mutex<Vec<AgentRequest>>>,
    concurrent_tasks: usize,
}

impl FakeAgentGateway {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            concurrent_tasks: 1,
        }
    }

    /// Script the next response's output text.
    pub fn push_output(&self, output: impl Into<String>) {
        self.script.lock().push_back(Ok(output.into()));
    }

    /// Script the next call to fail.
    pub fn push_error(&self, err: AgentError) {
        self.script.lock().push_back(Err(err));
    }

    /// Requests seen so far, in order.
    pub fn calls(&self) -> Vec<AgentRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AgentGateway for FakeAgentGateway {
    async fn execute(
        &self,
        req: AgentRequest,
        cancel: &CancelToken,
    ) -> Result<AgentResponse, AgentError> {
        if cancel.is_canceled() {
            return Err(AgentError::Canceled);
        }
        self.calls.lock().push(req);

        let next = self.script.lock().pop_front();
        let output = match next {
            Some(Ok(output)) => output,
            Some(Err(err)) => return Err(err),
            None => "ok".to_string(),
        };

        Ok(AgentResponse {
            output,
            exit_code: 0,
            duration: Duration::from_millis(1),
            tokens_used: Some(128),
            agent_kind: "fake".to_string(),
            metadata: Default::default(),
        })
    }

    fn capability(&self) -> AgentCapability {
        AgentCapability {
            concurrent_tasks: self.concurrent_tasks.max(1),
            ..AgentCapability::basic("fake")
        }
    }

    async fn health_check(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
