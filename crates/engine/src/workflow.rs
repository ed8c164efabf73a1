// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow engine: one turn of one SBI.
//!
//! A turn walks the step machine — plan (template check), implement
//! (agent call, artifact, notes), review (agent call, decision) — and
//! commits each state advance under CAS on the task's version. The two
//! journaled commits (implement, review) append their journal record
//! inside the same store transaction, so state and audit trail land
//! together. Preconditions: the caller holds the task's run-lock.

use crate::error::EngineError;
use crate::prompt;
use crate::workspace::Workspace;
use deespec_adapters::{
    AgentError, AgentGateway, AgentRequest, AgentResponse, ArtifactStore, ArtifactStoreError,
    CancelToken, SaveArtifact,
};
use deespec_core::{
    AnyTask, ArtifactKind, BackoffPolicy, Clock, Decision, JournalRecord, Sbi, Step, TaskId,
    TaskStatus,
};
use deespec_storage::{append_note, tasks, Journal, Store, StoreError};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-turn tuning.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub implement_timeout: Duration,
    pub review_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            implement_timeout: Duration::from_secs(300),
            review_timeout: Duration::from_secs(120),
            backoff: BackoffPolicy::default(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// What one completed turn did.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub decision: Decision,
    pub status: TaskStatus,
    pub turn: u32,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(TurnReport),
    /// Another writer advanced the task past this turn; nothing was
    /// journaled by us.
    Superseded,
    /// Cancellation observed; journaled, state not advanced.
    Canceled,
}

enum CommitOutcome {
    Committed,
    Conflict,
}

enum AgentCall {
    Response(AgentResponse, u32),
    Canceled,
}

/// Drives turns for SBIs.
pub struct WorkflowEngine {
    store: Arc<Store>,
    journal: Journal,
    ws: Workspace,
    agent: Arc<dyn AgentGateway>,
    artifacts: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<Store>,
        journal: Journal,
        ws: Workspace,
        agent: Arc<dyn AgentGateway>,
        artifacts: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            journal,
            ws,
            agent,
            artifacts,
            clock,
            config,
        }
    }

    /// Run one full turn (plan → implement → review) for `id`.
    pub async fn run_turn(
        &self,
        id: &TaskId,
        cancel: &CancelToken,
    ) -> Result<TurnOutcome, EngineError> {
        let mut sbi = self.store.with_conn(|c| tasks::get_sbi(c, id))?;
        if sbi.common.status.is_terminal() {
            return Err(EngineError::Task(deespec_core::TaskError::Validation(
                format!("task {id} is {}", sbi.common.status),
            )));
        }

        // plan: the turn needs a usable template for the current status
        let template_name = prompt::template_for_status(sbi.common.status);
        let template = prompt::load_template(&self.ws, template_name)?;

        if sbi.execution.turns_exhausted() {
            return self.fail_task(&mut sbi, "max turns reached".to_string()).await;
        }

        let now = self.clock.now_utc();
        if sbi.common.status == TaskStatus::Pending {
            sbi.common.update_status(TaskStatus::Picked, now)?;
            if let CommitOutcome::Conflict = self.commit(&mut sbi, None)? {
                return Ok(TurnOutcome::Superseded);
            }
        }

        // A task found in Reviewing was interrupted after its implement
        // committed; re-enter at the review step against the last
        // artifact instead of re-implementing.
        let (turn, artifact_path, artifact_content) =
            if sbi.common.status == TaskStatus::Reviewing {
                let turn = sbi.execution.current_turn.max(1);
                let path = sbi
                    .execution
                    .artifact_paths
                    .last()
                    .cloned()
                    .unwrap_or_else(|| format!("specs/sbi/{id}/impl_notes.md"));
                let content =
                    std::fs::read_to_string(self.ws.sbi_dir(id).join("impl_notes.md"))
                        .unwrap_or_default();
                (turn, path, content)
            } else {
                // implement
                let turn = sbi.execution.current_turn + 1;
                sbi.common.update_status(TaskStatus::Implementing, now)?;
                sbi.common.update_step(Step::Implement, now);
                sbi.execution.current_attempt = 0;
                if let CommitOutcome::Conflict = self.commit(&mut sbi, None)? {
                    return Ok(TurnOutcome::Superseded);
                }

                let implement_prompt = self.build_implement_prompt(&sbi, &template).await?;
                let implement_started = Instant::now();
                let (response, attempts) = match self
                    .call_agent(
                        &mut sbi,
                        implement_prompt,
                        self.config.implement_timeout,
                        turn,
                        cancel,
                    )
                    .await?
                {
                    AgentCall::Response(response, attempts) => (response, attempts),
                    AgentCall::Canceled => return self.canceled(&sbi, Step::Implement),
                };

                let mut save =
                    SaveArtifact::text(id.clone(), ArtifactKind::Code, response.output.clone());
                save.metadata.insert("turn".into(), turn.to_string());
                let artifact_meta = self.artifacts.save(save).await?;

                let notes_path = self.ws.sbi_dir(id).join("impl_notes.md");
                append_note(
                    &notes_path,
                    &format!("## Turn {turn}\n\n{}\n", response.output),
                )?;

                sbi.execution.advance_turn()?;
                sbi.execution
                    .artifact_paths
                    .push(artifact_meta.storage_path.clone());
                let mut record = JournalRecord::new(
                    self.clock.now_utc(),
                    id.clone(),
                    turn,
                    Step::Implement,
                    sbi.common.status,
                );
                record.attempt = attempts;
                record.elapsed_ms = implement_started.elapsed().as_millis() as u64;
                record.artifacts.push(deespec_core::ArtifactRef::path(
                    artifact_meta.storage_path.clone(),
                ));
                if let CommitOutcome::Conflict = self.commit(&mut sbi, Some(&record))? {
                    return Ok(TurnOutcome::Superseded);
                }
                debug!(task_id = %id, turn, "implement committed");

                let now = self.clock.now_utc();
                sbi.common.update_status(TaskStatus::Reviewing, now)?;
                sbi.common.update_step(Step::Review, now);
                if let CommitOutcome::Conflict = self.commit(&mut sbi, None)? {
                    return Ok(TurnOutcome::Superseded);
                }
                (turn, artifact_meta.storage_path.clone(), response.output)
            };

        // review
        let review_template = prompt::load_template(&self.ws, "REVIEW.md")?;
        let review_prompt =
            prompt::compose_review(&review_template, &artifact_path, &artifact_content);
        let review_started = Instant::now();
        let (review_response, review_attempts) = match self
            .call_agent(&mut sbi, review_prompt, self.config.review_timeout, turn, cancel)
            .await?
        {
            AgentCall::Response(response, attempts) => (response, attempts),
            AgentCall::Canceled => return self.canceled(&sbi, Step::Review),
        };

        let decision = match Decision::parse(&review_response.output) {
            Some(decision) => decision,
            None => {
                warn!(task_id = %id, turn, "review output carried no decision token");
                Decision::NeedsChanges
            }
        };

        let now = self.clock.now_utc();
        let mut record =
            JournalRecord::new(now, id.clone(), turn, Step::Review, sbi.common.status);
        record.attempt = review_attempts;
        record.elapsed_ms = review_started.elapsed().as_millis() as u64;
        record.decision = Some(decision);

        match decision {
            Decision::Succeeded => {
                sbi.common.update_status(TaskStatus::Done, now)?;
                sbi.common.update_step(Step::Done, now);
                let done_rel = format!("specs/sbi/{id}/done_{turn}.md");
                std::fs::write(
                    self.ws.sbi_dir(id).join(format!("done_{turn}.md")),
                    &review_response.output,
                )?;
                sbi.execution.artifact_paths.push(done_rel.clone());
                record
                    .artifacts
                    .push(deespec_core::ArtifactRef::path(done_rel));
            }
            Decision::NeedsChanges => {
                if sbi.execution.turns_exhausted() {
                    sbi.common.update_status(TaskStatus::Failed, now)?;
                    sbi.common.update_step(Step::Done, now);
                    sbi.execution.last_error = Some("max turns reached".to_string());
                    record.error = Some("max turns reached".to_string());
                } else {
                    sbi.common.update_status(TaskStatus::ReviewAndWip, now)?;
                    sbi.common.update_step(Step::Implement, now);
                }
            }
            Decision::Failed => {
                sbi.common.update_status(TaskStatus::Failed, now)?;
                sbi.common.update_step(Step::Done, now);
                let reason = first_line(&review_response.output);
                sbi.execution.last_error = Some(reason.clone());
                record.error = Some(reason);
            }
        }
        record.status = sbi.common.status;

        if let CommitOutcome::Conflict = self.commit(&mut sbi, Some(&record))? {
            return Ok(TurnOutcome::Superseded);
        }

        info!(task_id = %id, turn, %decision, status = %sbi.common.status, "turn complete");
        Ok(TurnOutcome::Completed(TurnReport {
            decision,
            status: sbi.common.status,
            turn,
        }))
    }

    /// Compose the implement prompt from template, instruction, labels,
    /// and prior notes.
    async fn build_implement_prompt(
        &self,
        sbi: &Sbi,
        template: &str,
    ) -> Result<String, EngineError> {
        let instruction_rel = format!("specs/sbi/{}/instruction.md", sbi.common.id);
        let instruction = match self.artifacts.load_instruction(&instruction_rel).await {
            Ok(text) => text,
            Err(ArtifactStoreError::InstructionNotFound(_)) => {
                // Fall back to the registered title/description
                format!("{}\n\n{}", sbi.common.title, sbi.common.description)
            }
            Err(e) => return Err(e.into()),
        };

        let labels = prompt::labels_content(&self.ws, &sbi.labels);
        let notes_path = self.ws.sbi_dir(&sbi.common.id).join("impl_notes.md");
        let prior_notes = std::fs::read_to_string(notes_path).ok();
        Ok(prompt::compose_implement(
            template,
            &instruction,
            &labels,
            prior_notes.as_deref(),
        ))
    }

    /// Call the agent, retrying transport failures with backoff up to
    /// the attempt budget. Returns the attempts consumed.
    async fn call_agent(
        &self,
        sbi: &mut Sbi,
        prompt_text: String,
        timeout: Duration,
        turn: u32,
        cancel: &CancelToken,
    ) -> Result<AgentCall, EngineError> {
        loop {
            let mut req = AgentRequest::new(prompt_text.clone(), timeout);
            req.max_tokens = self.config.max_tokens;
            req.temperature = self.config.temperature;
            req.context
                .insert("task_id".into(), sbi.common.id.to_string());
            req.context.insert("turn".into(), turn.to_string());

            match self.agent.execute(req, cancel).await {
                Ok(response) => {
                    return Ok(AgentCall::Response(response, sbi.execution.current_attempt))
                }
                Err(AgentError::Canceled) => return Ok(AgentCall::Canceled),
                Err(AgentError::Transport(message)) => {
                    let attempt = match sbi.execution.record_attempt() {
                        Ok(attempt) => attempt,
                        Err(_) => {
                            return self
                                .surface_step_error(sbi, AgentError::Transport(message))
                                .await;
                        }
                    };
                    let unit = rand::rng().random_range(-1.0..=1.0);
                    let delay = self.config.backoff.jittered(attempt, unit);
                    warn!(
                        task_id = %sbi.common.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transport failure, backing off",
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.canceled() => return Ok(AgentCall::Canceled),
                    }
                }
                Err(other) => return self.surface_step_error(sbi, other).await,
            }
        }
    }

    /// Journal a step failure, persist `last_error`, and surface it.
    ///
    /// The record carries `current_turn` (not the target turn): before
    /// the implement commit that is the previous turn, after it the
    /// advanced one, which keeps journal turns monotone either way.
    async fn surface_step_error(
        &self,
        sbi: &mut Sbi,
        err: AgentError,
    ) -> Result<AgentCall, EngineError> {
        let message = err.to_string();
        sbi.execution.last_error = Some(message.clone());
        let mut record = JournalRecord::new(
            self.clock.now_utc(),
            sbi.common.id.clone(),
            sbi.execution.current_turn,
            sbi.common.step,
            sbi.common.status,
        );
        record.attempt = sbi.execution.current_attempt;
        record.error = Some(message);
        // Best-effort: a conflict here means another writer took over
        let _ = self.commit(sbi, Some(&record))?;
        Err(err.into())
    }

    /// Journal the cancellation without advancing state.
    fn canceled(&self, sbi: &Sbi, step: Step) -> Result<TurnOutcome, EngineError> {
        let mut record = JournalRecord::new(
            self.clock.now_utc(),
            sbi.common.id.clone(),
            sbi.execution.current_turn,
            step,
            sbi.common.status,
        );
        record.error = Some("canceled".to_string());
        self.journal.append(&record)?;
        info!(task_id = %sbi.common.id, "turn canceled");
        Ok(TurnOutcome::Canceled)
    }

    /// Terminal failure outside the review path (e.g. the turn budget
    /// was already exhausted when the turn started).
    async fn fail_task(
        &self,
        sbi: &mut Sbi,
        reason: String,
    ) -> Result<TurnOutcome, EngineError> {
        let now = self.clock.now_utc();
        let turn = sbi.execution.current_turn;
        sbi.execution.last_error = Some(reason.clone());
        if sbi.common.status.can_transition(TaskStatus::Failed) {
            sbi.common.update_status(TaskStatus::Failed, now)?;
        }
        sbi.common.update_step(Step::Done, now);
        let mut record =
            JournalRecord::new(now, sbi.common.id.clone(), turn, Step::Done, sbi.common.status);
        record.error = Some(reason);
        if let CommitOutcome::Conflict = self.commit(sbi, Some(&record))? {
            return Ok(TurnOutcome::Superseded);
        }
        Ok(TurnOutcome::Completed(TurnReport {
            decision: Decision::Failed,
            status: sbi.common.status,
            turn,
        }))
    }

    /// CAS-commit the task state, appending `record` in the same store
    /// transaction when given.
    fn commit(
        &self,
        sbi: &mut Sbi,
        record: Option<&JournalRecord>,
    ) -> Result<CommitOutcome, EngineError> {
        let prev = sbi.common.version;
        let result = self.store.with_tx(|tx| {
            let version = tasks::update(tx, &AnyTask::Sbi(sbi.clone()), prev)?;
            if let Some(record) = record {
                self.journal.append(record)?;
            }
            Ok(version)
        });
        match result {
            Ok(version) => {
                sbi.common.version = version;
                Ok(CommitOutcome::Committed)
            }
            Err(StoreError::VersionConflict { .. }) => {
                warn!(task_id = %sbi.common.id, "version conflict; turn superseded");
                Ok(CommitOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("failed")
        .to_string()
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
