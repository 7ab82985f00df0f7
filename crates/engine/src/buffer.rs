// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Buffer: a single-owner actor that accumulates messages into an
//! in-progress Step and emits completed Steps to its configured handler.
//!
//! `BufferHandle` is the cheap, cloneable front door; `run` is the owner
//! loop, spawned once per pipeline, that actually mutates `current_step`.
//! Every operation on the handle round-trips through the loop's mailbox, so
//! `current_step`, counters, and the pending timeout are never touched from
//! more than one place.

use crate::detector::{Decision, Detector};
use crate::error::BufferError;
use serde::{Deserialize, Serialize};
use stepwise_core::{Clock, Message, Step, StepId, StepStatus, StepType};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::{instrument, warn};

/// Resource ceilings and the inactivity timeout, matching the engine's
/// published configuration surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub buffer_timeout_ms: u64,
    pub max_buffer_size: usize,
    pub max_memory_mb: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_timeout_ms: 5_000,
            max_buffer_size: 100,
            max_memory_mb: 50,
        }
    }
}

/// Bytes-per-message used for the soft memory estimate; deliberately rough,
/// matching the informal `~1 KiB` budget.
const ESTIMATED_BYTES_PER_MESSAGE: usize = 1024;

/// A snapshot of Buffer counters and current state, for the Observer
/// surface.
#[derive(Debug, Clone, Default)]
pub struct BufferStatus {
    pub buffered_messages: usize,
    pub estimated_memory_mb: usize,
    pub current_step_id: Option<StepId>,
    pub steps_emitted: u64,
    pub timeouts: u64,
    pub errors: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    steps_emitted: u64,
    timeouts: u64,
    errors: u64,
}

enum Command {
    AddMessage(Message, oneshot::Sender<Result<(), BufferError>>),
    Flush(oneshot::Sender<()>),
    Status(oneshot::Sender<BufferStatus>),
    Shutdown,
}

/// Cheap, cloneable handle to a running Buffer actor.
#[derive(Clone)]
pub struct BufferHandle {
    tx: mpsc::Sender<Command>,
}

impl BufferHandle {
    /// Enqueue a message. Resolves once the owner loop has applied it,
    /// returning a resource error if a ceiling was tripped.
    pub async fn add_message(&self, message: Message) -> Result<(), BufferError> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::AddMessage(message, tx)).await.is_err() {
            return Ok(());
        }
        rx.await.unwrap_or(Ok(()))
    }

    /// Force-complete and emit the in-progress Step, if any. Idempotent.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Observer snapshot of buffer size, memory estimate, and counters.
    pub async fn status(&self) -> BufferStatus {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Status(tx)).await.is_ok() {
            return rx.await.unwrap_or_default();
        }
        BufferStatus::default()
    }

    /// Stop the owner loop. Flushes any in-progress Step first.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

/// Spawn the Buffer's owner loop and return a handle to it. Emitted Steps
/// are pushed onto `emit_tx`; the Controller reads from the paired
/// receiver.
pub fn spawn<C, I>(
    config: BufferConfig,
    detector: Detector,
    clock: C,
    id_gen: I,
    emit_tx: mpsc::Sender<Step>,
) -> BufferHandle
where
    C: Clock + Send + 'static,
    I: Fn() -> String + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(run(config, detector, clock, id_gen, emit_tx, rx));
    BufferHandle { tx }
}

struct State<C, I> {
    config: BufferConfig,
    detector: Detector,
    clock: C,
    id_gen: I,
    current_step: Option<Step>,
    counters: Counters,
}

async fn run<C, I>(
    config: BufferConfig,
    detector: Detector,
    clock: C,
    id_gen: I,
    emit_tx: mpsc::Sender<Step>,
    mut rx: mpsc::Receiver<Command>,
) where
    C: Clock + Send + 'static,
    I: Fn() -> String + Send + 'static,
{
    let mut state = State {
        config,
        detector,
        clock,
        id_gen,
        current_step: None,
        counters: Counters::default(),
    };
    let timeout = tokio::time::sleep(Duration::from_secs(3600));
    tokio::pin!(timeout);
    let mut timer_armed = false;

    loop {
        tokio::select! {
            () = &mut timeout, if timer_armed => {
                timer_armed = false;
                state.force_timeout(&emit_tx).await;
            }
            cmd = rx.recv() => {
                match cmd {
                    Some(Command::AddMessage(message, respond)) => {
                        let result = state.add_message(message, &emit_tx).await;
                        if state.current_step.is_some() {
                            timeout.as_mut().reset(tokio::time::Instant::now() + Duration::from_millis(state.config.buffer_timeout_ms));
                            timer_armed = true;
                        } else {
                            timer_armed = false;
                        }
                        let _ = respond.send(result);
                    }
                    Some(Command::Flush(respond)) => {
                        state.flush(&emit_tx).await;
                        timer_armed = false;
                        let _ = respond.send(());
                    }
                    Some(Command::Status(respond)) => {
                        let _ = respond.send(state.status());
                    }
                    Some(Command::Shutdown) | None => {
                        state.flush(&emit_tx).await;
                        break;
                    }
                }
            }
        }
    }
}

impl<C, I> State<C, I>
where
    C: Clock,
    I: Fn() -> String,
{
    #[instrument(skip(self, message, emit_tx), fields(session_id = %message.session_id))]
    async fn add_message(&mut self, message: Message, emit_tx: &mpsc::Sender<Step>) -> Result<(), BufferError> {
        if let Some(step) = &self.current_step {
            let projected = step.messages.len() + 1;
            if projected > self.config.max_buffer_size {
                self.counters.errors += 1;
                self.force_complete(StepStatus::Error, emit_tx).await;
                return Err(BufferError::BufferSizeExceeded {
                    actual: projected,
                    max: self.config.max_buffer_size,
                });
            }
            let estimated_mb = projected * ESTIMATED_BYTES_PER_MESSAGE / (1024 * 1024).max(1);
            if estimated_mb > self.config.max_memory_mb {
                self.counters.errors += 1;
                self.force_complete(StepStatus::Error, emit_tx).await;
                return Err(BufferError::MemoryLimitExceeded {
                    actual_mb: estimated_mb,
                    max_mb: self.config.max_memory_mb,
                });
            }
        }

        let buffer_snapshot: Vec<Message> = self.current_step.as_ref().map(|s| s.messages.clone()).unwrap_or_default();
        let tools_so_far: Vec<String> = self.current_step.as_ref().map(|s| s.tools_used.clone()).unwrap_or_default();
        let decision = self.detector.analyze(&message, &buffer_snapshot, &tools_so_far);

        match decision {
            Decision::StepStart(step_type, meta) => {
                // A placeholder `unknown` step (created when an earlier
                // message matched no pattern) is reclassified in place
                // rather than force-completed: the Detector never saw it
                // as a typed step, so from its perspective this *is* the
                // first message of `step_type`.
                match &mut self.current_step {
                    Some(step) if step.step_type == StepType::Unknown => {
                        step.step_type = step_type;
                        step.merge_metadata(meta);
                        step.push_message(message);
                    }
                    Some(_) => {
                        self.force_complete(StepStatus::Completed, emit_tx).await;
                        self.start_step(step_type, message, meta);
                    }
                    None => self.start_step(step_type, message, meta),
                }
            }
            Decision::StepContinue => {
                if self.current_step.is_none() {
                    self.start_step(StepType::Unknown, message, Default::default());
                } else if let Some(step) = &mut self.current_step {
                    step.push_message(message);
                    if step.messages.len() > self.config.max_buffer_size {
                        self.force_complete(StepStatus::Completed, emit_tx).await;
                    }
                }
            }
            Decision::StepEnd(meta) => {
                if let Some(step) = &mut self.current_step {
                    step.push_message(message);
                    step.merge_metadata(meta);
                } else {
                    self.start_step(StepType::Unknown, message, meta);
                }
                self.emit_current(StepStatus::Completed, emit_tx).await;
            }
            Decision::StepBoundary(step_type, meta) => {
                self.force_complete(StepStatus::Completed, emit_tx).await;
                self.start_step(step_type, message, meta);
            }
        }
        Ok(())
    }

    fn start_step(&mut self, step_type: StepType, first: Message, meta: crate::detector::Metadata) {
        let id = StepId::new((self.id_gen)());
        let mut step = Step::start(id, step_type, first, self.clock.now());
        step.merge_metadata(meta);
        self.current_step = Some(step);
    }

    async fn force_complete(&mut self, status: StepStatus, emit_tx: &mpsc::Sender<Step>) {
        self.emit_current(status, emit_tx).await;
    }

    async fn force_timeout(&mut self, emit_tx: &mpsc::Sender<Step>) {
        if self.current_step.is_some() {
            self.counters.timeouts += 1;
            self.emit_current(StepStatus::Timeout, emit_tx).await;
        }
    }

    /// Force-complete the current Step (public entry point for `flush()`);
    /// idempotent when no Step is in progress.
    async fn flush(&mut self, emit_tx: &mpsc::Sender<Step>) {
        if self.current_step.is_some() {
            self.emit_current(StepStatus::Timeout, emit_tx).await;
        }
    }

    async fn emit_current(&mut self, status: StepStatus, emit_tx: &mpsc::Sender<Step>) {
        let Some(mut step) = self.current_step.take() else {
            return;
        };
        step.recompute_tools_used();
        step.complete(status, self.clock.now());
        self.detector.reset();
        self.counters.steps_emitted += 1;
        if emit_tx.send(step).await.is_err() {
            warn!("emission channel closed; dropping completed Step");
            self.counters.errors += 1;
        }
    }

    fn status(&self) -> BufferStatus {
        let buffered = self.current_step.as_ref().map(|s| s.messages.len()).unwrap_or(0);
        BufferStatus {
            buffered_messages: buffered,
            estimated_memory_mb: buffered * ESTIMATED_BYTES_PER_MESSAGE / (1024 * 1024).max(1),
            current_step_id: self.current_step.as_ref().map(|s| s.id.clone()),
            steps_emitted: self.counters.steps_emitted,
            timeouts: self.counters.timeouts,
            errors: self.counters.errors,
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
