// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::meta::TaskMeta;
use crate::pick::PickResolver;
use crate::workflow::{WorkflowConfig, WorkflowEngine};
use crate::workspace::Workspace;
use deespec_adapters::{FakeAgentGateway, MemoryArtifactStore};
use deespec_core::{AnyTask, BackoffPolicy, Clock, FakeClock, Sbi, TaskId};
use deespec_storage::{tasks, Journal, Store};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Harness {
    pub dir: TempDir,
    pub ws: Workspace,
    pub store: Arc<Store>,
    pub journal: Journal,
    pub clock: FakeClock,
    pub agent: FakeAgentGateway,
    pub artifacts: MemoryArtifactStore,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let ws = Workspace::new(dir.path());
        ws.init().expect("workspace init");
        let store = Arc::new(Store::open(&ws.db_path()).expect("open store"));
        let journal = Journal::new(ws.journal_path());
        Self {
            dir,
            ws,
            store,
            journal,
            clock: FakeClock::new(),
            agent: FakeAgentGateway::new(),
            artifacts: MemoryArtifactStore::new(),
        }
    }

    pub fn clock_arc(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    /// Workflow engine with near-instant backoff so retry tests run fast.
    pub fn engine(&self) -> WorkflowEngine {
        let config = WorkflowConfig {
            backoff: BackoffPolicy {
                base: Duration::from_millis(1),
                cap: Duration::from_millis(10),
                ..BackoffPolicy::default()
            },
            ..WorkflowConfig::default()
        };
        WorkflowEngine::new(
            Arc::clone(&self.store),
            self.journal.clone(),
            self.ws.clone(),
            Arc::new(self.agent.clone()),
            Arc::new(self.artifacts.clone()),
            self.clock_arc(),
            config,
        )
    }

    pub fn resolver(&self) -> PickResolver {
        PickResolver::new(
            self.ws.clone(),
            Arc::clone(&self.store),
            self.journal.clone(),
            self.clock_arc(),
        )
    }

    /// Register an SBI in the store and its meta.yaml on disk.
    pub fn create_sbi(&self, id: &str, max_turns: u32) -> Sbi {
        let mut sbi = Sbi::new(TaskId::new(id), format!("task {id}"), None, &self.clock)
            .expect("new sbi");
        sbi.common.description = format!("description of {id}");
        sbi.execution.max_turns = max_turns;
        self.store
            .with_tx(|tx| tasks::insert(tx, &AnyTask::Sbi(sbi.clone())))
            .expect("insert sbi");
        crate::meta::save_meta(&self.ws.sbi_dir(&sbi.common.id), &TaskMeta::new(id))
            .expect("save meta");
        sbi
    }

    pub fn load_sbi(&self, id: &str) -> Sbi {
        self.store
            .with_conn(|c| tasks::get_sbi(c, &TaskId::new(id)))
            .expect("load sbi")
    }

    /// Meta-only candidate (no store row), as produced by registration.
    pub fn write_meta(&self, meta: &TaskMeta) {
        let dir = self.ws.sbi_dir(&TaskId::new(meta.id.as_str()));
        crate::meta::save_meta(&dir, meta).expect("save meta");
    }
}
