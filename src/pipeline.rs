// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Pipeline` facade: wires Pattern/Detector, Buffer, Controller, and
//! History into one flow — `message iterator -> Detector -> Buffer ->
//! Step emission -> Controller -> History` — behind a single type a host
//! application constructs once per conversation.

use std::sync::Arc;
use stepwise_adapters::{MessageSource, MessageSourceError};
use stepwise_core::{Checkpoint, CheckpointId, Clock, IdGen, Message, Pattern, PatternError, Step, SystemClock, UuidIdGen};
use stepwise_engine::{
    spawn_buffer, BufferError, BufferHandle, BufferStatus, Controller, ControllerError, ControllerStatus, Detector,
    InterventionHandler, NextStep, ResumeDecision, ReviewHandler, builtin_patterns,
};
use stepwise_storage::{
    History, HistoryError, HistoryStats, PersistenceAdapter, PruneOptions, PruneResult, ReplayItem, ReplayOptions,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::PipelineConfig;

/// Everything the Pipeline needs beyond serializable configuration:
/// collaborators that carry behavior rather than data. `patterns: None`
/// installs the built-in vocabulary.
#[derive(Clone, Default)]
pub struct PipelineCollaborators {
    pub patterns: Option<Vec<Pattern>>,
    pub review_handler: Option<Arc<dyn ReviewHandler>>,
    pub intervention_handler: Option<Arc<dyn InterventionHandler>>,
}

/// Errors raised assembling or driving a Pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pattern configuration: {0}")]
    Config(#[from] PatternError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Aggregated status snapshot across every component, for a host
/// application that wants to observe the pipeline without driving it.
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub buffer: BufferStatus,
    pub controller: ControllerStatus,
    pub history: HistoryStats,
}

/// The assembled Step pipeline for one conversation.
pub struct Pipeline<A: PersistenceAdapter, C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    buffer: BufferHandle,
    controller: Controller<C>,
    history: History<A, C, I>,
}

impl<A: PersistenceAdapter> Pipeline<A, SystemClock, UuidIdGen> {
    /// Assemble a Pipeline backed by the system clock and UUID ids.
    pub async fn new(
        conversation_id: impl Into<String>,
        config: PipelineConfig,
        adapter: A,
        collaborators: PipelineCollaborators,
    ) -> Result<Self, PipelineError> {
        Self::with_clock_and_ids(conversation_id, config, adapter, collaborators, SystemClock, UuidIdGen).await
    }
}

impl<A: PersistenceAdapter, C: Clock, I: IdGen> Pipeline<A, C, I> {
    /// Assemble a Pipeline with an injected clock and id generator, for
    /// deterministic tests.
    pub async fn with_clock_and_ids(
        conversation_id: impl Into<String>,
        config: PipelineConfig,
        adapter: A,
        collaborators: PipelineCollaborators,
        clock: C,
        id_gen: I,
    ) -> Result<Self, PipelineError> {
        let conversation_id = conversation_id.into();
        let patterns = collaborators.patterns.unwrap_or_else(builtin_patterns);
        for pattern in &patterns {
            pattern.validate()?;
        }

        let detector = Detector::new(
            patterns,
            config.detection.strategy.into(),
            config.detection.confidence_threshold,
            config.detection.max_history,
        );

        let (emit_tx, emit_rx) = mpsc::channel(64);
        let buffer_id_gen = {
            let id_gen = id_gen.clone();
            move || id_gen.next()
        };
        let buffer = spawn_buffer(config.buffer, detector, clock.clone(), buffer_id_gen, emit_tx);

        let mode = config.control.mode.into_controller_mode(config.control.pause_between_steps);
        let controller = Controller::with_clock(
            emit_rx,
            mode,
            config.control.control_timeout_ms,
            collaborators.review_handler,
            collaborators.intervention_handler,
            clock.clone(),
        );

        let history = History::load_with(adapter, conversation_id, config.history, clock, id_gen).await?;

        Ok(Self { buffer, controller, history })
    }

    /// Feed a single Message into the Buffer. Callers driving their own
    /// loop over a `MessageSource` use this directly; [`Self::run_source`]
    /// is the convenience wrapper that owns the loop.
    pub async fn feed(&self, message: Message) -> Result<(), BufferError> {
        self.buffer.add_message(message).await
    }

    /// Drain a [`MessageSource`] into the Buffer until it closes, flushing
    /// any in-progress Step once the source is exhausted.
    pub async fn run_source<S: MessageSource>(&self, mut source: S) -> Result<(), MessageSourceError> {
        loop {
            match source.next_message().await {
                Ok(Some(message)) => {
                    if let Err(error) = self.buffer.add_message(message).await {
                        warn!(%error, "buffer rejected message; continuing");
                    }
                }
                Ok(None) => {
                    self.buffer.flush().await;
                    return Ok(());
                }
                Err(error) => {
                    warn!(%error, "message source closed with an error; flushing buffer");
                    self.buffer.flush().await;
                    return Err(error);
                }
            }
        }
    }

    /// Stop the Buffer's owner loop, flushing any in-progress Step first.
    pub async fn shutdown(&self) {
        self.buffer.shutdown().await;
    }

    /// Pull the next Step through the Controller; a terminal `Ready` Step
    /// is additionally appended to History before being returned.
    pub async fn next_step(&mut self) -> Result<NextStep, PipelineError> {
        let next = self.controller.next_step().await?;
        if let NextStep::Ready(step) = &next {
            self.history.save_step(step.clone()).await?;
        }
        Ok(next)
    }

    /// Apply a resume decision to the currently paused/waiting Step.
    pub async fn resume(&mut self, decision: ResumeDecision) -> Result<(), PipelineError> {
        Ok(self.controller.resume(decision).await?)
    }

    pub fn get_history(&self) -> &[Step] {
        self.history.get_history()
    }

    pub fn get_checkpoints(&self) -> &[Checkpoint] {
        self.history.get_checkpoints()
    }

    pub async fn create_checkpoint(&mut self, label: impl Into<String>) -> Result<CheckpointId, PipelineError> {
        Ok(self.history.create_checkpoint(label).await?)
    }

    pub async fn restore_checkpoint(&mut self, id: &CheckpointId) -> Result<(), PipelineError> {
        Ok(self.history.restore_checkpoint(id).await?)
    }

    pub async fn prune_history(&mut self, opts: PruneOptions) -> Result<PruneResult, PipelineError> {
        Ok(self.history.prune(opts).await?)
    }

    pub fn replay_conversation(&self, opts: ReplayOptions) -> Result<Vec<ReplayItem>, PipelineError> {
        Ok(self.history.replay(opts)?)
    }

    pub async fn clear_history(&mut self) -> Result<(), PipelineError> {
        Ok(self.history.clear().await?)
    }

    /// Aggregated Observer snapshot across Buffer, Controller, and History.
    pub async fn status(&self) -> PipelineStatus {
        PipelineStatus {
            buffer: self.buffer.status().await,
            controller: self.controller.status(),
            history: self.history.stats(),
        }
    }
}
