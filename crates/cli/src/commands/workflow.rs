// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow commands: pick, single turns, the continuous runner, and
//! status.

use crate::context::AppContext;
use crate::output::{self, OutputFormat};
use chrono::Duration as ChronoDuration;
use clap::Subcommand;
use deespec_adapters::{cancel_pair, CancelToken};
use deespec_core::{Clock, LockId, Step, TaskId, TaskStatus};
use deespec_engine::{api, EngineError, PickOutcome, TurnOutcome};
use deespec_storage::tasks;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    /// Select the next ready task and journal the selection
    Pick,
    /// Run one implement/review turn for a task
    Implement {
        id: String,
        #[arg(long, default_value = "claude")]
        agent: String,
    },
    /// Re-run a turn for a task sitting in review
    Review {
        id: String,
        #[arg(long, default_value = "claude")]
        agent: String,
    },
    /// Force-complete a task that passed review
    Complete { id: String },
    /// Poll and execute turns continuously until interrupted
    Run {
        #[arg(long, default_value = "claude")]
        agent: String,
    },
    /// Show status counts and live locks
    Status,
}

pub async fn run(command: WorkflowCommand, format: OutputFormat) -> Result<(), EngineError> {
    let ctx = AppContext::open()?;

    match command {
        WorkflowCommand::Pick => pick(&ctx, format),
        WorkflowCommand::Implement { id, agent } => {
            one_turn(&ctx, &TaskId::new(id), &agent, format).await
        }
        WorkflowCommand::Review { id, agent } => {
            let id = TaskId::new(id);
            let task = api::get(&ctx.store, &id)?;
            if !matches!(task.status, TaskStatus::Reviewing | TaskStatus::ReviewAndWip) {
                return Err(EngineError::Task(deespec_core::TaskError::Validation(
                    format!("task {id} is {}, not in review", task.status),
                )));
            }
            one_turn(&ctx, &id, &agent, format).await
        }
        WorkflowCommand::Complete { id } => complete(&ctx, &TaskId::new(id), format),
        WorkflowCommand::Run { agent } => {
            let runner = ctx.runner(&agent)?;
            let (src, token) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received; shutting down");
                    src.cancel();
                }
            });
            runner.run(token).await
        }
        WorkflowCommand::Status => {
            let counts = api::status_counts(&ctx.store)?;
            let locks = ctx.lock_service().list_run()?;
            let stats = deespec_engine::load_stats(&ctx.ws.runner_stats_path())?;
            output::print_status(
                &counts,
                &locks,
                stats.as_ref(),
                ctx.clock.now_utc(),
                format,
            );
            Ok(())
        }
    }
}

pub fn pick(ctx: &AppContext, format: OutputFormat) -> Result<(), EngineError> {
    match ctx.resolver().pick()? {
        PickOutcome::Picked(selection) => {
            output::print(
                &serde_json::json!({
                    "task_id": &selection.task_id,
                    "pick_reason": &selection.pick_reason,
                    "spec_dir": &selection.spec_dir,
                }),
                format,
                |_| println!("picked {} ({})", selection.task_id, selection.pick_reason),
            );
            Ok(())
        }
        PickOutcome::NoTask { reason } => {
            output::print(
                &serde_json::json!({ "task_id": null, "reason": &reason }),
                format,
                |_| match &reason {
                    Some(reason) => println!("no task ready: {reason}"),
                    None => println!("no task ready"),
                },
            );
            Ok(())
        }
    }
}

async fn one_turn(
    ctx: &AppContext,
    id: &TaskId,
    agent: &str,
    format: OutputFormat,
) -> Result<(), EngineError> {
    let locks = ctx.lock_service();
    let lock_id = LockId::new(id.as_str());
    let Some(_lock) = locks.acquire_run(&lock_id, ChronoDuration::minutes(10))? else {
        return Err(EngineError::LockHeld(id.to_string()));
    };

    let outcome = ctx.engine(agent)?.run_turn(id, &CancelToken::none()).await;
    if let Err(e) = locks.release(&lock_id) {
        tracing::warn!(task_id = %id, error = %e, "run lock release failed");
    }

    match outcome? {
        TurnOutcome::Completed(report) => {
            output::print(
                &serde_json::json!({
                    "task_id": id,
                    "turn": report.turn,
                    "decision": report.decision,
                    "status": report.status,
                }),
                format,
                |_| {
                    println!(
                        "turn {} of {id}: {} -> {}",
                        report.turn, report.decision, report.status
                    )
                },
            );
            Ok(())
        }
        TurnOutcome::Superseded => {
            output::print(&serde_json::json!({"task_id": id, "superseded": true}), format, |_| {
                println!("turn superseded by another writer")
            });
            Ok(())
        }
        TurnOutcome::Canceled => Err(EngineError::Canceled),
    }
}

/// Administrative completion of a reviewed task: flips `Reviewing` to
/// `Done` under CAS and journals the transition.
fn complete(ctx: &AppContext, id: &TaskId, format: OutputFormat) -> Result<(), EngineError> {
    let mut sbi = ctx.store.with_conn(|c| tasks::get_sbi(c, id))?;
    let now = ctx.clock.now_utc();
    let prev = sbi.common.version;
    sbi.common.update_status(TaskStatus::Done, now)?;
    sbi.common.update_step(Step::Done, now);

    let record = deespec_core::JournalRecord::new(
        now,
        id.clone(),
        sbi.execution.current_turn,
        Step::Done,
        TaskStatus::Done,
    );
    ctx.store.with_tx(|tx| {
        tasks::update(tx, &deespec_core::AnyTask::Sbi(sbi.clone()), prev)?;
        ctx.journal.append(&record)?;
        Ok(())
    })?;

    output::print(&serde_json::json!({"task_id": id, "status": "DONE"}), format, |_| {
        println!("{id} completed")
    });
    Ok(())
}
