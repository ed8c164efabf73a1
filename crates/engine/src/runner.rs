// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Continuous runner.
//!
//! Polls the pick resolver on an interval; each tick drives exactly one
//! turn of one task: pick → run-lock → turn → release. Errors are
//! classified — temporary and configuration failures keep the loop
//! alive, critical ones stop it. Shutdown stops new picks, waits a
//! bounded grace period for the in-flight turn, then stops the lock
//! service's background loops.

use crate::error::{EngineError, ErrorClass};
use crate::lock::LockService;
use crate::pick::{PickOutcome, PickResolver};
use crate::workflow::{TurnOutcome, WorkflowEngine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use deespec_adapters::CancelToken;
use deespec_core::{Clock, LockId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Runner tuning.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Poll interval between ticks.
    pub interval: Duration,
    /// TTL requested for each run-lock (heartbeats extend it).
    pub lock_ttl: ChronoDuration,
    /// Bound on waiting for an in-flight turn during shutdown.
    pub shutdown_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            lock_ttl: ChronoDuration::minutes(10),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Aggregate counters, guarded by a reader-writer lock.
///
/// Snapshotted to `var/runner_stats.json` after every tick so a status
/// command in another process can report on a live run loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerStats {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<DateTime<Utc>>,
    #[serde(default)]
    pub average_interval_ms: u64,
}

/// Read a persisted stats snapshot; absent or garbled files read as
/// `None` (a broken sidecar must not fail a status query).
pub fn load_stats(path: &Path) -> Result<Option<RunnerStats>, EngineError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&raw) {
        Ok(stats) => Ok(Some(stats)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping corrupt runner stats");
            Ok(None)
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing ready to run.
    Idle,
    /// A task was picked but its lock is held elsewhere.
    LockBusy(LockId),
    /// One turn ran to an outcome.
    Ran(TurnOutcome),
}

/// The polling loop around resolver, locks, and workflow engine.
pub struct Runner {
    resolver: PickResolver,
    engine: WorkflowEngine,
    locks: Arc<LockService>,
    clock: Arc<dyn Clock>,
    config: RunnerConfig,
    stats: RwLock<RunnerStats>,
    stats_path: Option<PathBuf>,
}

impl Runner {
    pub fn new(
        resolver: PickResolver,
        engine: WorkflowEngine,
        locks: Arc<LockService>,
        clock: Arc<dyn Clock>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            resolver,
            engine,
            locks,
            clock,
            config,
            stats: RwLock::new(RunnerStats::default()),
            stats_path: None,
        }
    }

    /// Snapshot stats to `path` after every tick.
    pub fn with_stats_path(mut self, path: PathBuf) -> Self {
        self.stats_path = Some(path);
        self
    }

    pub fn stats(&self) -> RunnerStats {
        self.stats.read().clone()
    }

    /// Write the snapshot via tmp + rename so readers never observe a
    /// partial file. Best-effort: a failed snapshot is logged, never
    /// surfaced over the tick's own result.
    fn persist_stats(&self, stats: &RunnerStats) {
        let Some(path) = &self.stats_path else {
            return;
        };
        let result = (|| -> Result<(), std::io::Error> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, serde_json::to_vec_pretty(stats).unwrap_or_default())?;
            std::fs::rename(&tmp, path)
        })();
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "runner stats snapshot failed");
        }
    }

    /// Execute one tick: pick, lock, one turn, release.
    pub async fn tick(&self, cancel: &CancelToken) -> Result<TickOutcome, EngineError> {
        let selection = match self.resolver.pick()? {
            PickOutcome::Picked(selection) => selection,
            PickOutcome::NoTask { reason } => {
                if let Some(reason) = reason {
                    info!(%reason, "no task ready");
                }
                return Ok(TickOutcome::Idle);
            }
        };

        let lock_id = LockId::new(selection.task_id.as_str());
        let Some(_lock) = self.locks.acquire_run(&lock_id, self.config.lock_ttl)? else {
            info!(task_id = %selection.task_id, "run lock held elsewhere");
            return Ok(TickOutcome::LockBusy(lock_id));
        };

        let outcome = self.engine.run_turn(&selection.task_id, cancel).await;

        // The lock is released on every path; failures there are logged,
        // not surfaced over the turn's own result.
        if let Err(e) = self.locks.release(&lock_id) {
            warn!(task_id = %selection.task_id, error = %e, "run lock release failed");
        }

        outcome.map(TickOutcome::Ran)
    }

    /// Run ticks until canceled. Starts and stops the lock service's
    /// background loops around the loop.
    pub async fn run(&self, cancel: CancelToken) -> Result<(), EngineError> {
        self.locks.start();
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.canceled() => break,
                _ = interval.tick() => {}
            }

            let tick = self.tick(&cancel);
            tokio::pin!(tick);
            let result = tokio::select! {
                result = &mut tick => Some(result),
                _ = cancel.canceled() => {
                    // Cancellation already propagated into the turn via
                    // the shared token; wait a bounded grace for it to
                    // commit or abort.
                    match tokio::time::timeout(self.config.shutdown_grace, &mut tick).await {
                        Ok(result) => Some(result),
                        Err(_) => {
                            warn!("in-flight turn exceeded shutdown grace");
                            None
                        }
                    }
                }
            };

            if let Some(result) = result {
                let stop = self.record(result);
                if stop {
                    break;
                }
            }
            if cancel.is_canceled() {
                break;
            }
        }

        self.locks.stop().await;
        info!("runner stopped");
        Ok(())
    }

    /// Update stats; returns true when the loop must stop.
    fn record(&self, result: Result<TickOutcome, EngineError>) -> bool {
        let now = self.clock.now_utc();
        let mut stats = self.stats.write();

        if let Some(previous) = stats.last_execution {
            let gap = (now - previous).num_milliseconds().max(0) as u64;
            stats.average_interval_ms = if stats.total == 0 {
                gap
            } else {
                (stats.average_interval_ms * stats.total + gap) / (stats.total + 1)
            };
        }
        stats.total += 1;
        stats.last_execution = Some(now);

        let stop = match result {
            Ok(outcome) => {
                stats.success += 1;
                if let TickOutcome::Ran(outcome) = outcome {
                    info!(?outcome, "tick complete");
                }
                false
            }
            Err(e) => {
                stats.failure += 1;
                stats.last_error = Some(e.to_string());
                match e.class() {
                    ErrorClass::Temporary => {
                        warn!(error = %e, "temporary failure; continuing");
                        false
                    }
                    ErrorClass::Configuration => {
                        warn!(error = %e, "configuration problem; continuing until fixed");
                        false
                    }
                    ErrorClass::Critical => {
                        error!(error = %e, "critical failure; stopping runner");
                        true
                    }
                    ErrorClass::Unknown => {
                        warn!(error = %e, "unclassified failure; continuing");
                        false
                    }
                }
            }
        };

        let snapshot = stats.clone();
        drop(stats);
        self.persist_stats(&snapshot);
        stop
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
