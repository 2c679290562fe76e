// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use orc_config::AgentConfig;
use orc_model::Message;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::agent::{AgentDriver, AgentError};
use crate::directive::{self, Directive};
use crate::display::{DisplaySink, Speaker};
use crate::round_control;
use crate::session_log::{SessionLog, SessionMetadata};

/// The Orchestrator's exclusively-owned current abort handle (§3 ownership
/// rule). Each interruptible call re-arms a fresh channel, which is what
/// makes ESC fire on every subsequent turn rather than only the first one
/// (the "pause flag must be cleared on entry, not only in the handler"
/// fix): there is no stale `paused` bit to forget to clear, because arming
/// always replaces whatever was there.
pub struct AbortHandle {
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl AbortHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { current: Mutex::new(None) })
    }

    pub fn arm(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.current.lock().unwrap() = Some(tx);
        rx
    }

    /// Fire the currently-armed handle, if any (ESC listener / watchdog).
    pub fn trigger(&self) {
        if let Some(tx) = self.current.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

/// Static wiring needed to construct an [`Orchestrator`]: everything that
/// does not change once a session starts.
pub struct OrchestratorConfig {
    pub work_dir: PathBuf,
    pub initial_remaining_rounds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Exit,
}

/// The outer turn-taking state machine (§4.6): user input → Instructor →
/// directive → Worker → Instructor review → … until `DONE` or the round
/// budget is exhausted. Exclusively owns its two agent drivers, their
/// histories, the session log, and the shared abort handle; the Tool
/// Executor each driver holds exclusively owns allow-sets/grant-sets.
pub struct Orchestrator {
    instructor: AgentDriver,
    worker: AgentDriver,
    instructor_history: Vec<Message>,
    worker_history: Vec<Message>,
    session: SessionLog,
    session_id: String,
    created_at: chrono::DateTime<Utc>,
    work_dir: PathBuf,
    current_round: u64,
    remaining_rounds: Option<u64>,
    agent_config: AgentConfig,
    abort: Arc<AbortHandle>,
    interrupted: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        instructor: AgentDriver,
        worker: AgentDriver,
        session: SessionLog,
        session_id: String,
        agent_config: AgentConfig,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            instructor,
            worker,
            instructor_history: Vec::new(),
            worker_history: Vec::new(),
            session,
            session_id,
            created_at: Utc::now(),
            work_dir: config.work_dir,
            current_round: 0,
            remaining_rounds: config.initial_remaining_rounds,
            agent_config,
            abort: AbortHandle::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resume from a replayed session: the Instructor history and scalar
    /// state are restored; the Worker history always starts empty (it is
    /// never persisted, per the ephemeral-Worker-history rationale).
    pub fn resume(
        instructor: AgentDriver,
        worker: AgentDriver,
        session: SessionLog,
        agent_config: AgentConfig,
        work_dir: PathBuf,
        instructor_history: Vec<Message>,
        metadata: SessionMetadata,
    ) -> Self {
        Self {
            instructor,
            worker,
            instructor_history,
            worker_history: Vec::new(),
            session,
            session_id: metadata.session_id,
            created_at: metadata.created_at,
            work_dir,
            current_round: metadata.current_round,
            remaining_rounds: metadata.remaining_rounds,
            agent_config,
            abort: AbortHandle::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Exposed so the root binary's ESC-key listener task can trigger
    /// cancellation of whatever turn is currently in flight.
    pub fn abort_handle(&self) -> Arc<AbortHandle> {
        self.abort.clone()
    }

    pub fn current_round(&self) -> u64 {
        self.current_round
    }

    pub fn remaining_rounds(&self) -> Option<u64> {
        self.remaining_rounds
    }

    pub fn instructor_history(&self) -> &[Message] {
        &self.instructor_history
    }

    /// Process one line of user input (or the initial CLI instruction,
    /// treated identically). Handles `exit`/`quit`, round-control token
    /// consumption, and a full Instructor/Worker/Review cycle.
    pub async fn handle_user_line(&mut self, line: &str, sink: &mut dyn DisplaySink) -> anyhow::Result<LineOutcome> {
        self.interrupted.store(false, Ordering::SeqCst);

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            return Ok(LineOutcome::Exit);
        }

        let parsed = round_control::parse(line);
        if !parsed.adjustments.is_empty() {
            let before = self.remaining_rounds.unwrap_or(0);
            let after = round_control::apply(before, &parsed.adjustments);
            self.remaining_rounds = Some(after);
            sink.on_status(&format!("round budget adjusted: {before} -> {after}"));
        }

        if parsed.cleaned.is_empty() {
            sink.on_status("empty instruction after round-control tokens were stripped; please try again");
            return Ok(LineOutcome::Continue);
        }

        self.current_round += 1;
        self.run_request(&parsed.cleaned, sink).await?;
        self.persist_metadata()?;
        Ok(LineOutcome::Continue)
    }

    async fn run_request(&mut self, user_text: &str, sink: &mut dyn DisplaySink) -> anyhow::Result<()> {
        let mut directive = match self.call_instructor(user_text, sink).await? {
            InstructorCall::Directive(d) => d,
            InstructorCall::Cancelled => return Ok(()),
        };

        loop {
            directive = match directive {
                Directive::Done => return Ok(()),
                Directive::Malformed => match self.run_correction_loop(sink).await? {
                    InstructorCall::Directive(d) => d,
                    InstructorCall::Cancelled => return Ok(()),
                },
                Directive::TellWorker { instruction, model_override } => {
                    if self.remaining_rounds == Some(0) {
                        sink.on_status(
                            "no rounds remaining for this request; use [r+n] or [r=n] to add more before the worker can run",
                        );
                        return Ok(());
                    }
                    if let Some(r) = &mut self.remaining_rounds {
                        *r -= 1;
                    }

                    let worker_output = match self.run_worker_turn(&instruction, model_override.as_deref(), sink).await? {
                        WorkerCall::Output(text) => text,
                        WorkerCall::Cancelled => return Ok(()),
                    };

                    // The review always runs, even with zero rounds left: the
                    // instructor still needs the chance to say DONE. Only a
                    // directive that would start another worker turn gets
                    // overridden below.
                    let review_input = format!("Worker says: {worker_output}");
                    let reviewed = match self.call_instructor(&review_input, sink).await? {
                        InstructorCall::Directive(d) => d,
                        InstructorCall::Cancelled => return Ok(()),
                    };

                    if self.remaining_rounds == Some(0) && matches!(reviewed, Directive::TellWorker { .. }) {
                        sink.on_status("round budget exhausted; forcing completion after this worker turn");
                        Directive::Done
                    } else {
                        reviewed
                    }
                }
            };
        }
    }

    /// `Correction(k)`, `k` bounded by `max_correction_attempts`. Each
    /// attempt re-sends a fixed reminder and counts as its own round.
    async fn run_correction_loop(&mut self, sink: &mut dyn DisplaySink) -> anyhow::Result<InstructorCall> {
        const REMINDER: &str = "Please continue. Remember to use \"Tell worker: [instruction]\" \
            (optionally \"Tell worker(use <model>): ...\") or \"DONE\" when the task is fully complete.";

        for _ in 0..self.agent_config.max_correction_attempts {
            match self.call_instructor(REMINDER, sink).await? {
                InstructorCall::Directive(Directive::Malformed) => continue,
                other => return Ok(other),
            }
        }
        sink.on_status("instructor failed to produce a valid directive after the maximum correction attempts");
        Ok(InstructorCall::Directive(Directive::Done))
    }

    async fn call_instructor(&mut self, input: &str, sink: &mut dyn DisplaySink) -> anyhow::Result<InstructorCall> {
        self.current_round += 1;
        self.maybe_compact_instructor_history(sink).await;

        let mut cancel = self.abort.arm();
        let result = self.instructor.run_turn(&mut self.instructor_history, input, None, &mut cancel, sink).await;
        self.session.append_instructor_messages(&self.instructor_history)?;

        let pending_compaction = self.instructor.tools().take_pending_worker_compaction();
        if let Some(reason) = pending_compaction {
            sink.on_status(&format!("compacting worker context ({reason})"));
            self.compact_worker_history(sink).await;
        }

        match result {
            Ok(outcome) => Ok(InstructorCall::Directive(directive::parse(&outcome.text))),
            Err(e) if is_cancelled(&e) => {
                self.interrupted.store(true, Ordering::SeqCst);
                sink.on_status("interrupted; returning to prompt");
                Ok(InstructorCall::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    /// `compact_worker_context` meta-tool's effect: summarize the Worker's
    /// older history via one tool-free Worker-model call and rebuild it as
    /// `[summary] + recent_tail`, the same shape `maybe_compact_instructor_history`
    /// uses for the Instructor's own history. Falls back to the deterministic
    /// `emergency_compact` path if the summary call fails or the history is
    /// empty/too small to split meaningfully.
    async fn compact_worker_history(&mut self, sink: &mut dyn DisplaySink) {
        if self.worker_history.is_empty() {
            return;
        }
        let keep_recent = self.agent_config.compaction_keep_recent;
        let split = crate::compact::split_keeping_tool_groups_intact(&self.worker_history, keep_recent);
        if split == 0 {
            crate::compact::emergency_compact(&mut self.worker_history, keep_recent);
            return;
        }

        let recent_tail: Vec<Message> = self.worker_history[split..].to_vec();
        let mut to_compact = self.worker_history[..split].to_vec();
        crate::compact::compact_session_with_strategy(&mut to_compact, self.agent_config.compaction_strategy);

        match self.worker.summarize(&to_compact).await {
            Ok(summary) => {
                self.worker_history.clear();
                self.worker_history.push(Message::assistant(summary));
                self.worker_history.extend(recent_tail);
            }
            Err(e) => {
                sink.on_status(&format!("worker compaction summary call failed ({e:#}); emergency-compacting instead"));
                crate::compact::emergency_compact(&mut self.worker_history, keep_recent);
            }
        }
    }

    /// `WorkerTurn`. Runs an inactivity watchdog concurrently with the
    /// Worker's turn, keyed off the last time a text chunk arrived (not off
    /// turn start), and distinguishes watchdog-triggered cancellation from
    /// user ESC-cancellation by a shared flag both set through the same
    /// [`AbortHandle`].
    async fn run_worker_turn(
        &mut self,
        instruction: &str,
        model_override: Option<&str>,
        sink: &mut dyn DisplaySink,
    ) -> anyhow::Result<WorkerCall> {
        self.current_round += 1;

        let last_activity = Arc::new(Mutex::new(Instant::now()));
        let collected = Arc::new(Mutex::new(String::new()));
        let timed_out = Arc::new(AtomicBool::new(false));
        let mut tracking =
            ActivityTrackingSink { inner: &mut *sink, last_activity: last_activity.clone(), collected: collected.clone() };

        let mut cancel = self.abort.arm();
        let timeout_secs = self.agent_config.worker_inactivity_timeout_secs;
        let watchdog_abort = self.abort.clone();
        let watchdog_flag = timed_out.clone();
        let watchdog_activity = last_activity.clone();
        let watchdog = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if watchdog_activity.lock().unwrap().elapsed().as_secs() >= timeout_secs {
                    watchdog_flag.store(true, Ordering::SeqCst);
                    watchdog_abort.trigger();
                    break;
                }
            }
        });

        let result = self.worker.run_turn(&mut self.worker_history, instruction, model_override, &mut cancel, &mut tracking).await;
        watchdog.abort();

        match result {
            Ok(outcome) => Ok(WorkerCall::Output(outcome.text)),
            Err(e) if is_cancelled(&e) => {
                if timed_out.load(Ordering::SeqCst) {
                    let partial = collected.lock().unwrap().clone();
                    let synthetic = if partial.is_empty() {
                        format!("[No response received - TIMEOUT after {timeout_secs}s]")
                    } else {
                        format!("{partial} [TIMEOUT after {timeout_secs}s]")
                    };
                    sink.on_status(&format!("worker timed out after {timeout_secs}s of inactivity"));
                    Ok(WorkerCall::Output(synthetic))
                } else {
                    self.interrupted.store(true, Ordering::SeqCst);
                    sink.on_status("interrupted; returning to prompt");
                    Ok(WorkerCall::Cancelled)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Triggered at `compaction_threshold` of `context_window_tokens` (§9:
    /// "compaction is triggered at ≈80% of a 200k budget"). Summarizes the
    /// older portion of the Instructor history via one tool-free model call
    /// and rebuilds history as `[summary] + recent_tail`; if that call fails
    /// or the session is already too large for even the summarization
    /// prompt to fit, falls back to the deterministic `emergency_compact`
    /// path, which never calls the model and always succeeds.
    async fn maybe_compact_instructor_history(&mut self, sink: &mut dyn DisplaySink) {
        let total: usize = self.instructor_history.iter().map(Message::approx_tokens).sum();
        let threshold =
            (self.agent_config.context_window_tokens as f32 * self.agent_config.compaction_threshold) as usize;
        if total <= threshold || self.instructor_history.is_empty() {
            return;
        }
        sink.on_status(&format!("compacting instructor history ({total} approx tokens over {threshold} threshold)"));

        let keep_recent = self.agent_config.compaction_keep_recent;
        let split = crate::compact::split_keeping_tool_groups_intact(&self.instructor_history, keep_recent);
        let recent_tail: Vec<Message> = self.instructor_history[split..].to_vec();
        let recent_tokens: usize = recent_tail.iter().map(Message::approx_tokens).sum();
        let old_tokens = total.saturating_sub(recent_tokens);
        let emergency_fraction = 0.95_f32;
        let would_overflow =
            split == 0 || (old_tokens as f32 / self.agent_config.context_window_tokens as f32) >= emergency_fraction;

        if would_overflow {
            sink.on_status("history too large even for a compaction summary call; emergency-compacting instead");
            crate::compact::emergency_compact(&mut self.instructor_history, keep_recent);
            self.session.mark_compacted();
            return;
        }

        let mut to_compact = self.instructor_history[..split].to_vec();
        crate::compact::compact_session_with_strategy(&mut to_compact, self.agent_config.compaction_strategy);

        match self.instructor.summarize(&to_compact).await {
            Ok(summary) => {
                self.instructor_history.clear();
                self.instructor_history.push(Message::assistant(summary));
                self.instructor_history.extend(recent_tail);
            }
            Err(e) => {
                sink.on_status(&format!("compaction summary call failed ({e:#}); emergency-compacting instead"));
                crate::compact::emergency_compact(&mut self.instructor_history, keep_recent);
            }
        }
        self.session.mark_compacted();
    }

    fn persist_metadata(&mut self) -> anyhow::Result<()> {
        let metadata = SessionMetadata {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            last_updated_at: Utc::now(),
            current_round: self.current_round,
            remaining_rounds: self.remaining_rounds,
            work_dir: self.work_dir.clone(),
            config: serde_json::json!({}),
        };
        self.session.append_metadata(&metadata)
    }
}

enum InstructorCall {
    Directive(Directive),
    Cancelled,
}

enum WorkerCall {
    Output(String),
    Cancelled,
}

fn is_cancelled(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<AgentError>(), Some(AgentError::Cancelled))
}

/// Forwards to the real sink while recording the last-activity timestamp and
/// accumulating streamed text, so the caller can build the watchdog's
/// synthetic timeout output without the Agent Driver knowing anything about
/// timeouts.
struct ActivityTrackingSink<'a> {
    inner: &'a mut dyn DisplaySink,
    last_activity: Arc<Mutex<Instant>>,
    collected: Arc<Mutex<String>>,
}

impl<'a> DisplaySink for ActivityTrackingSink<'a> {
    fn on_text(&mut self, who: Speaker, chunk: &str) {
        *self.last_activity.lock().unwrap() = Instant::now();
        self.collected.lock().unwrap().push_str(chunk);
        self.inner.on_text(who, chunk);
    }

    fn on_status(&mut self, line: &str) {
        self.inner.on_status(line);
    }
}
