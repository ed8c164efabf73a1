// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring: builds the engine object graph for one CLI invocation.

use deespec_adapters::{agent, ArtifactStore, FsArtifactStore};
use deespec_core::{Clock, HolderId, SystemClock};
use deespec_engine::{
    Decomposer, EngineError, LockConfig, LockService, PickResolver, Runner, RunnerConfig,
    WorkflowConfig, WorkflowEngine, Workspace,
};
use deespec_storage::{Journal, Store};
use std::sync::Arc;

/// Shared handles for one command invocation.
pub struct AppContext {
    pub ws: Workspace,
    pub store: Arc<Store>,
    pub journal: Journal,
    pub clock: Arc<dyn Clock>,
    holder: HolderId,
}

impl AppContext {
    /// Open (initializing if needed) the workspace selected by the
    /// environment.
    pub fn open() -> Result<Self, EngineError> {
        let ws = Workspace::from_env();
        ws.init()?;
        let store = Arc::new(Store::open(&ws.db_path())?);
        let journal = Journal::new(ws.journal_path());
        let holder = HolderId::new(format!(
            "{}@{}",
            uuid::Uuid::new_v4(),
            hostname().unwrap_or_else(|| "localhost".into()),
        ));
        Ok(Self {
            ws,
            store,
            journal,
            clock: Arc::new(SystemClock),
            holder,
        })
    }

    pub fn resolver(&self) -> PickResolver {
        PickResolver::new(
            self.ws.clone(),
            Arc::clone(&self.store),
            self.journal.clone(),
            Arc::clone(&self.clock),
        )
    }

    pub fn lock_service(&self) -> Arc<LockService> {
        Arc::new(LockService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.holder.clone(),
            LockConfig::default(),
        ))
    }

    pub fn artifacts(&self) -> Arc<dyn ArtifactStore> {
        Arc::new(FsArtifactStore::new(self.ws.base()))
    }

    pub fn engine(&self, agent_name: &str) -> Result<WorkflowEngine, EngineError> {
        let gateway = agent::gateway_for(agent_name)?;
        Ok(WorkflowEngine::new(
            Arc::clone(&self.store),
            self.journal.clone(),
            self.ws.clone(),
            gateway,
            self.artifacts(),
            Arc::clone(&self.clock),
            WorkflowConfig::default(),
        ))
    }

    pub fn decomposer(&self, agent_name: &str) -> Result<Decomposer, EngineError> {
        let gateway = agent::gateway_for(agent_name)?;
        Ok(Decomposer::new(
            Arc::clone(&self.store),
            self.ws.clone(),
            gateway,
            self.artifacts(),
            Arc::clone(&self.clock),
        ))
    }

    pub fn runner(&self, agent_name: &str) -> Result<Runner, EngineError> {
        Ok(Runner::new(
            self.resolver(),
            self.engine(agent_name)?,
            self.lock_service(),
            Arc::clone(&self.clock),
            RunnerConfig::default(),
        )
        .with_stats_path(self.ws.runner_stats_path()))
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty())
}
