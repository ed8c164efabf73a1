//! Shared fixture: a full engine stack in a temporary workspace with a
//! scripted agent.

use deespec_adapters::{FakeAgentGateway, MemoryArtifactStore};
use deespec_core::{
    AnyTask, BackoffPolicy, Clock, FakeClock, HolderId, Sbi, TaskId,
};
use deespec_engine::{
    LockConfig, LockService, PickResolver, Runner, RunnerConfig, WorkflowConfig, WorkflowEngine,
    Workspace,
};
use deespec_storage::{tasks, Journal, Store};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Stack {
    pub dir: TempDir,
    pub ws: Workspace,
    pub store: Arc<Store>,
    pub journal: Journal,
    pub clock: FakeClock,
    pub agent: FakeAgentGateway,
    pub artifacts: MemoryArtifactStore,
}

impl Stack {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        ws.init().unwrap();
        let store = Arc::new(Store::open(&ws.db_path()).unwrap());
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

    pub fn engine(&self) -> WorkflowEngine {
        WorkflowEngine::new(
            Arc::clone(&self.store),
            self.journal.clone(),
            self.ws.clone(),
            Arc::new(self.agent.clone()),
            Arc::new(self.artifacts.clone()),
            self.clock_arc(),
            WorkflowConfig {
                backoff: BackoffPolicy {
                    base: Duration::from_millis(1),
                    cap: Duration::from_millis(5),
                    ..BackoffPolicy::default()
                },
                ..WorkflowConfig::default()
            },
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

    pub fn lock_service(&self, holder: &str) -> Arc<LockService> {
        Arc::new(LockService::new(
            Arc::clone(&self.store),
            self.clock_arc(),
            HolderId::new(holder),
            LockConfig::default(),
        ))
    }

    pub fn runner(&self, holder: &str) -> Runner {
        Runner::new(
            self.resolver(),
            self.engine(),
            self.lock_service(holder),
            self.clock_arc(),
            RunnerConfig {
                interval: Duration::from_millis(5),
                ..RunnerConfig::default()
            },
        )
    }

    /// Register an SBI: store row plus meta.yaml for the resolver.
    pub fn register_sbi(&self, id: &str, max_turns: u32, priority: u32, deps: &[&str]) -> Sbi {
        let mut sbi = Sbi::new(TaskId::new(id), format!("task {id}"), None, &self.clock).unwrap();
        sbi.common.description = format!("build {id}");
        sbi.priority = Some(priority);
        sbi.execution.max_turns = max_turns;
        self.store
            .with_tx(|tx| tasks::insert(tx, &AnyTask::Sbi(sbi.clone())))
            .unwrap();

        let mut meta = deespec_engine::meta::TaskMeta::new(id);
        meta.priority = Some(priority);
        meta.depends_on = deps.iter().map(|d| d.to_string()).collect();
        deespec_engine::meta::save_meta(&self.ws.sbi_dir(&TaskId::new(id)), &meta).unwrap();
        sbi
    }

    pub fn load_sbi(&self, id: &str) -> Sbi {
        self.store
            .with_conn(|c| tasks::get_sbi(c, &TaskId::new(id)))
            .unwrap()
    }
}
