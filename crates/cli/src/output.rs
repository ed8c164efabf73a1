// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Presenters and exit-code mapping.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use crate::color;
use deespec_core::{format_elapsed, format_elapsed_ms, RunLock, TaskStatus};
use deespec_engine::{EngineError, ErrorClass, RunnerStats, TaskSummary};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Cli,
    /// Machine-readable JSON
    Json,
}

/// Exit codes: 0 success, 1 user error, 2 transient/configuration,
/// 3 critical.
pub fn exit_code(err: &EngineError) -> i32 {
    match err.class() {
        ErrorClass::Temporary | ErrorClass::Configuration => 2,
        ErrorClass::Critical => 3,
        ErrorClass::Unknown => 1,
    }
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    taxonomy: &'static str,
    details: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<&'a str>,
}

pub fn print_error(err: &EngineError, format: OutputFormat) {
    match format {
        OutputFormat::Cli => {
            let tag = color::error_tag(err.taxonomy(), color::should_colorize());
            eprintln!("error[{tag}]: {err}");
        }
        OutputFormat::Json => {
            let payload = ErrorPayload {
                taxonomy: err.taxonomy(),
                details: err.to_string(),
                retryable: err.retryable(),
                class: None,
            };
            println!(
                "{}",
                serde_json::to_string(&payload)
                    .unwrap_or_else(|_| format!("{{\"details\":\"{}\"}}", err.taxonomy()))
            );
        }
    }
}

pub fn print_version(format: OutputFormat) {
    match format {
        OutputFormat::Cli => println!("deespec {}", env!("CARGO_PKG_VERSION")),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
        }
    }
}

/// Print any serializable payload as JSON, or fall back to the given
/// human renderer.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, human: impl FnOnce(&T)) {
    match format {
        OutputFormat::Cli => human(value),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error[Corrupt]: {e}"),
        },
    }
}

pub fn print_summary(summary: &TaskSummary, format: OutputFormat) {
    print(summary, format, |s| {
        let colorize = color::should_colorize();
        println!(
            "{} {} [{}] {} (step {}, turn {})",
            s.kind,
            s.id,
            color::status(&s.status.to_string(), colorize),
            s.title,
            s.step,
            s.turn.map_or("-".to_string(), |t| t.to_string()),
        );
        if let Some(parent) = &s.parent_id {
            println!("{}", color::muted(&format!("  parent: {parent}"), colorize));
        }
        if !s.child_ids.is_empty() {
            let children: Vec<&str> = s.child_ids.iter().map(|c| c.as_str()).collect();
            println!(
                "{}",
                color::muted(&format!("  children: {}", children.join(", ")), colorize)
            );
        }
        if let Some(err) = &s.last_error {
            println!("  last error: {err}");
        }
    });
}

/// The `workflow status` view: counts by status, live run-locks, and
/// the persisted runner stats when a run loop has recorded any.
pub fn print_status(
    counts: &[(TaskStatus, u32)],
    locks: &[RunLock],
    stats: Option<&RunnerStats>,
    now: DateTime<Utc>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            print(
                &serde_json::json!({
                    "statuses": counts,
                    "run_locks": locks,
                    "runner": stats,
                }),
                format,
                |_| {},
            );
        }
        OutputFormat::Cli => {
            let colorize = color::should_colorize();
            for (status, count) in counts {
                println!("{}: {count}", color::status(&status.to_string(), colorize));
            }
            if locks.is_empty() {
                println!("no live run-locks");
            }
            for lock in locks {
                println!(
                    "{}",
                    color::muted(
                        &format!(
                            "lock {} held by {} until {}",
                            lock.lock_id, lock.holder_id, lock.expires_at
                        ),
                        colorize,
                    )
                );
            }
            match stats {
                Some(stats) => {
                    println!(
                        "runner: {} tick(s), {} ok, {} failed, avg interval {}",
                        stats.total,
                        stats.success,
                        stats.failure,
                        format_elapsed_ms(stats.average_interval_ms),
                    );
                    if let Some(last) = stats.last_execution {
                        let ago = (now - last).num_seconds().max(0) as u64;
                        println!(
                            "{}",
                            color::muted(&format!("  last tick {} ago", format_elapsed(ago)), colorize)
                        );
                    }
                    if let Some(err) = &stats.last_error {
                        println!("  last error: {err}");
                    }
                }
                None => println!("no runner stats recorded"),
            }
        }
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

pub fn print_summaries(summaries: &[TaskSummary], format: OutputFormat) {
    match format {
        OutputFormat::Cli => {
            for summary in summaries {
                print_summary(summary, format);
            }
            if summaries.is_empty() {
                println!("no tasks");
            }
        }
        OutputFormat::Json => print(&summaries, format, |_| {}),
    }
}
