// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! deespec: CLI for the hierarchical task orchestrator.
//!
//! Thin adapter over `deespec-engine`: argument parsing, presenters,
//! and exit-code mapping live here; every behavior belongs to the
//! engine crates.

mod color;
mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};
use commands::{task::TaskCommand, workflow::WorkflowCommand};
use deespec_core::TaskKind;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "deespec", version, about = "Hierarchical task orchestrator driving AI coding agents")]
struct Cli {
    /// Output format for results and errors
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Cli)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage EPICs
    Epic {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Manage PBIs
    Pbi {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Manage SBIs
    Sbi {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Drive the execution workflow
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Print the version
    Version,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.output;

    let result = match cli.command {
        Command::Epic { command } => commands::task::run(TaskKind::Epic, command, format).await,
        Command::Pbi { command } => commands::task::run(TaskKind::Pbi, command, format).await,
        Command::Sbi { command } => commands::task::run(TaskKind::Sbi, command, format).await,
        Command::Workflow { command } => commands::workflow::run(command, format).await,
        Command::Version => {
            output::print_version(format);
            Ok(())
        }
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            output::print_error(&e, format);
            std::process::exit(output::exit_code(&e));
        }
    }
}
