// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal colors for the human presenter.
//!
//! Callers resolve [`should_colorize`] once per invocation and pass the
//! flag down, so output stays deterministic in tests and pipelines.

use std::io::IsTerminal;

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
/// Secondary text: darker grey (ANSI-256).
const MUTED: &str = "\x1b[38;5;240m";

/// Whether to emit ANSI codes.
///
/// Priority: `NO_COLOR=1` disables → `COLOR=1` forces → TTY check.
pub fn should_colorize() -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| v == "1") {
        return false;
    }
    if std::env::var("COLOR").is_ok_and(|v| v == "1") {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn paint(code: &str, text: &str, colorize: bool) -> String {
    if colorize {
        format!("{code}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Secondary lines (parents, children, lock holders).
pub fn muted(text: &str, colorize: bool) -> String {
    paint(MUTED, text, colorize)
}

/// Error taxonomy tags.
pub fn error_tag(text: &str, colorize: bool) -> String {
    paint(RED, text, colorize)
}

/// Colorize a status or decision token by its meaning: green for
/// terminal success, red for terminal failure, yellow for anything
/// still moving. Unknown tokens stay plain.
pub fn status(text: &str, colorize: bool) -> String {
    if !colorize {
        return text.to_string();
    }
    let code = match text.trim().to_uppercase().as_str() {
        "DONE" | "SUCCEEDED" => GREEN,
        "FAILED" | "CANCELED" => RED,
        "PENDING" | "PICKED" | "IMPLEMENTING" | "REVIEWING" | "REVIEW&WIP" | "NEEDS_CHANGES" => {
            YELLOW
        }
        _ => return text.to_string(),
    };
    paint(code, text, true)
}

#[cfg(test)]
#[path = "color_tests.rs"]
mod tests;
