// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task management commands, shared by `epic`, `pbi`, and `sbi`.

use crate::context::AppContext;
use crate::output::{self, OutputFormat};
use clap::Subcommand;
use deespec_adapters::CancelToken;
use deespec_core::{TaskId, TaskKind};
use deespec_engine::{api, CreateTask, EngineError};

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Create a task
    Create {
        /// Task identifier (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Parent task id (EPIC for a PBI, PBI for an SBI)
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        priority: Option<u32>,
        /// Priority-of-requirements ordering key
        #[arg(long)]
        por: Option<u32>,
        /// Labels (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,
    },
    /// Show one task
    Get { id: String },
    /// List tasks of this kind
    List,
    /// Pick the next ready task (SBI only)
    Pick,
    /// Run a decomposition turn (EPIC/PBI), producing an approval manifest
    #[command(alias = "generate")]
    Decompose {
        id: String,
        /// Agent backend
        #[arg(long, default_value = "claude")]
        agent: String,
    },
    /// Register the approved children from the manifest
    #[command(alias = "apply")]
    Approve { id: String },
    /// Summarize task counts by status
    Status,
    /// Delete a task with no live children
    Delete { id: String },
}

pub async fn run(
    kind: TaskKind,
    command: TaskCommand,
    format: OutputFormat,
) -> Result<(), EngineError> {
    let ctx = AppContext::open()?;

    match command {
        TaskCommand::Create {
            id,
            title,
            description,
            parent,
            priority,
            por,
            labels,
        } => {
            let id = id.unwrap_or_else(|| {
                format!("{}-{}", kind.to_string().to_lowercase(), short_uuid())
            });
            let req = CreateTask {
                id,
                title,
                description,
                parent: parent.map(TaskId::new),
                priority,
                por,
                labels,
            };
            let summary = api::create(&ctx.store, &ctx.ws, &ctx.clock, kind, req)?;
            output::print_summary(&summary, format);
            Ok(())
        }
        TaskCommand::Get { id } => {
            let summary = api::get(&ctx.store, &TaskId::new(id))?;
            output::print_summary(&summary, format);
            Ok(())
        }
        TaskCommand::List => {
            let summaries = api::list(&ctx.store, Some(kind))?;
            output::print_summaries(&summaries, format);
            Ok(())
        }
        TaskCommand::Pick => super::workflow::pick(&ctx, format),
        TaskCommand::Decompose { id, agent } => {
            if kind == TaskKind::Sbi {
                return Err(EngineError::Task(deespec_core::TaskError::Validation(
                    "SBIs are executed, not decomposed".into(),
                )));
            }
            let manifest = ctx
                .decomposer(&agent)?
                .decompose(&TaskId::new(id), &CancelToken::none())
                .await?;
            output::print(&manifest, format, |m| {
                println!("{} proposed child(ren); approve via the manifest", m.items.len());
                for item in &m.items {
                    println!("  {} [{:?}]", item.file, item.status);
                }
            });
            Ok(())
        }
        TaskCommand::Approve { id } => {
            let created = ctx.decomposer("claude")?.register_approved(&TaskId::new(id))?;
            output::print(&created, format, |ids| {
                println!("registered {} child task(s)", ids.len());
                for id in ids {
                    println!("  {id}");
                }
            });
            Ok(())
        }
        TaskCommand::Status => {
            let counts = api::status_counts(&ctx.store)?;
            output::print(&counts, format, |counts| {
                for (status, count) in counts {
                    println!("{status}: {count}");
                }
            });
            Ok(())
        }
        TaskCommand::Delete { id } => {
            api::delete(&ctx.store, &TaskId::new(id))?;
            Ok(())
        }
    }
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}
