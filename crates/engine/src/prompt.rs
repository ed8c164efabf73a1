// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt template resolution and composition.

use crate::error::EngineError;
use crate::workspace::Workspace;
use deespec_core::TaskStatus;
use tracing::warn;

/// Template file used for a task in the given status.
pub fn template_for_status(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Reviewing => "REVIEW.md",
        TaskStatus::ReviewAndWip => "REVIEW_AND_WIP.md",
        _ => "WIP.md",
    }
}

/// Load a template by file name; a missing or unreadable template is a
/// `Prompt` error (the pick resolver reports it as `PROMPT_ERROR`).
pub fn load_template(ws: &Workspace, name: &str) -> Result<String, EngineError> {
    let path = ws.prompt_path(name);
    std::fs::read_to_string(&path)
        .map_err(|e| EngineError::Prompt(format!("{}: {e}", path.display())))
}

/// Concatenated content of the labels' prompt files.
///
/// A label without a prompt file contributes nothing; that is normal
/// (labels double as plain tags), so it only warrants a debug-level
/// skip, not an error.
pub fn labels_content(ws: &Workspace, labels: &[String]) -> String {
    let mut out = String::new();
    for label in labels {
        let path = ws.label_prompt_path(label);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                out.push_str(&format!("\n## Label: {label}\n\n{text}\n"));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(label, error = %e, "unreadable label prompt, skipping");
            }
        }
    }
    out
}

/// Assemble the implement-step prompt: template, instruction document,
/// label content, then prior notes.
pub fn compose_implement(
    template: &str,
    instruction: &str,
    labels: &str,
    prior_notes: Option<&str>,
) -> String {
    let mut prompt = String::with_capacity(
        template.len() + instruction.len() + labels.len() + 64,
    );
    prompt.push_str(template);
    prompt.push_str("\n## Instruction\n\n");
    prompt.push_str(instruction);
    prompt.push('\n');
    prompt.push_str(labels);
    if let Some(notes) = prior_notes {
        if !notes.is_empty() {
            prompt.push_str("\n## Prior notes\n\n");
            prompt.push_str(notes);
            prompt.push('\n');
        }
    }
    prompt
}

/// Assemble the review-step prompt: template plus the artifact to
/// review.
pub fn compose_review(template: &str, artifact_path: &str, artifact_content: &str) -> String {
    format!("{template}\n## Implementation artifact ({artifact_path})\n\n{artifact_content}\n")
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
