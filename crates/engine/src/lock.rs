// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock service: run-lock and state-lock leasing with background
//! heartbeat and expiry sweeping.
//!
//! Acquisition never blocks; a held lock yields `None` and callers poll
//! with backoff. The heartbeat loop extends only locks this process
//! still owns (holder-scoped CAS); the sweeper deletes any expired row,
//! which is how crashed holders' locks are reclaimed.

use crate::error::EngineError;
use chrono::Duration as ChronoDuration;
use deespec_core::{Clock, HolderId, LockId, LockMode, RunLock, StateLock};
use deespec_storage::{locks, Store};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tuning for the background loops.
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub heartbeat_interval: Duration,
    pub cleanup_interval: Duration,
    /// TTL written by heartbeats (and the default for acquisitions).
    pub ttl: ChronoDuration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(60),
            ttl: ChronoDuration::minutes(10),
        }
    }
}

struct Background {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Process-wide lock manager.
pub struct LockService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    holder: HolderId,
    config: LockConfig,
    owned_run: Arc<Mutex<HashSet<LockId>>>,
    owned_state: Arc<Mutex<HashSet<LockId>>>,
    background: Mutex<Option<Background>>,
}

impl LockService {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        holder: HolderId,
        config: LockConfig,
    ) -> Self {
        Self {
            store,
            clock,
            holder,
            config,
            owned_run: Arc::new(Mutex::new(HashSet::new())),
            owned_state: Arc::new(Mutex::new(HashSet::new())),
            background: Mutex::new(None),
        }
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    /// Take the exclusive run-lock for a task; `None` when a live lock
    /// exists elsewhere.
    pub fn acquire_run(
        &self,
        lock_id: &LockId,
        ttl: ChronoDuration,
    ) -> Result<Option<RunLock>, EngineError> {
        let now = self.clock.now_utc();
        let lock = self
            .store
            .with_tx(|tx| locks::acquire_run(tx, lock_id, &self.holder, ttl, now))?;
        if lock.is_some() {
            self.owned_run.lock().insert(lock_id.clone());
        }
        Ok(lock)
    }

    /// Take a state-lock in the given mode.
    pub fn acquire_state(
        &self,
        lock_id: &LockId,
        mode: LockMode,
        ttl: ChronoDuration,
    ) -> Result<Option<StateLock>, EngineError> {
        let now = self.clock.now_utc();
        let lock = self
            .store
            .with_tx(|tx| locks::acquire_state(tx, lock_id, &self.holder, mode, ttl, now))?;
        if lock.is_some() {
            self.owned_state.lock().insert(lock_id.clone());
        }
        Ok(lock)
    }

    /// Release a lock this process holds (either kind).
    pub fn release(&self, lock_id: &LockId) -> Result<(), EngineError> {
        if self.owned_run.lock().remove(lock_id) {
            self.store
                .with_tx(|tx| locks::release_run(tx, lock_id, &self.holder))?;
            return Ok(());
        }
        if self.owned_state.lock().remove(lock_id) {
            self.store
                .with_tx(|tx| locks::release_state(tx, lock_id, &self.holder))?;
            return Ok(());
        }
        // Not tracked locally; attempt a run-lock release so callers get
        // the store's NotOwner/NotFound verdict.
        self.store
            .with_tx(|tx| locks::release_run(tx, lock_id, &self.holder))?;
        Ok(())
    }

    pub fn find_run(&self, lock_id: &LockId) -> Result<Option<RunLock>, EngineError> {
        Ok(self.store.with_conn(|c| locks::find_run(c, lock_id))?)
    }

    pub fn list_run(&self) -> Result<Vec<RunLock>, EngineError> {
        Ok(self.store.with_conn(locks::list_run)?)
    }

    pub fn list_state(&self) -> Result<Vec<StateLock>, EngineError> {
        Ok(self.store.with_conn(locks::list_state)?)
    }

    /// One heartbeat pass: extend every owned lock; drop ownership of
    /// rows that are no longer ours.
    pub fn heartbeat_once(&self) -> Result<(), EngineError> {
        let now = self.clock.now_utc();
        let ttl = self.config.ttl;

        let run_ids: Vec<LockId> = self.owned_run.lock().iter().cloned().collect();
        for id in run_ids {
            let kept = self
                .store
                .with_conn(|c| locks::heartbeat_run(c, &id, &self.holder, ttl, now))?;
            if !kept {
                warn!(lock_id = %id, "run lock lost; dropping ownership");
                self.owned_run.lock().remove(&id);
            }
        }

        let state_ids: Vec<LockId> = self.owned_state.lock().iter().cloned().collect();
        for id in state_ids {
            let kept = self
                .store
                .with_conn(|c| locks::heartbeat_state(c, &id, &self.holder, ttl, now))?;
            if !kept {
                warn!(lock_id = %id, "state lock lost; dropping ownership");
                self.owned_state.lock().remove(&id);
            }
        }
        Ok(())
    }

    /// One sweeper pass: reap expired rows of both kinds.
    pub fn sweep_once(&self) -> Result<usize, EngineError> {
        let now = self.clock.now_utc();
        let reaped = self.store.with_conn(|c| locks::sweep_expired(c, now))?;
        if reaped > 0 {
            debug!(reaped, "swept expired locks");
        }
        Ok(reaped)
    }

    /// Start the heartbeat and sweeper loops.
    pub fn start(self: &Arc<Self>) {
        let mut background = self.background.lock();
        if background.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let heartbeat = {
            let service = Arc::clone(self);
            let mut shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(service.config.heartbeat_interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            if let Err(e) = service.heartbeat_once() {
                                warn!(error = %e, "heartbeat pass failed");
                            }
                        }
                        _ = shutdown.changed() => return,
                    }
                }
            })
        };

        let sweeper = {
            let service = Arc::clone(self);
            let mut shutdown = shutdown_rx;
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(service.config.cleanup_interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            if let Err(e) = service.sweep_once() {
                                warn!(error = %e, "sweep pass failed");
                            }
                        }
                        _ = shutdown.changed() => return,
                    }
                }
            })
        };

        *background = Some(Background {
            shutdown: shutdown_tx,
            handles: vec![heartbeat, sweeper],
        });
    }

    /// Stop the background loops, waiting for them to exit so no lock is
    /// left with a frozen heartbeat.
    pub async fn stop(&self) {
        let background = self.background.lock().take();
        if let Some(background) = background {
            let _ = background.shutdown.send(true);
            for handle in background.handles {
                let _ = handle.await;
            }
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
