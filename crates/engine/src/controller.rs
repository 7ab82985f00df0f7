// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Controller: wraps the Buffer's Step stream and presents a pull
//! interface (`next_step` / `resume`) to the consumer, with optional
//! pausing and review gating.

use crate::error::ControllerError;
use async_trait::async_trait;
use std::collections::HashMap;
use stepwise_core::{Clock, Intervention, MetadataValue, Step, StepStatus, SystemClock};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::{instrument, warn};

/// How the Controller gates Step delivery.
#[derive(Debug, Clone, Copy)]
pub enum ControllerMode {
    /// Each pulled Step is returned immediately, unless `pause_between_steps`
    /// is set, in which case every Step first yields `Paused`.
    Automatic { pause_between_steps: bool },
    /// Every Step yields `Paused`; the consumer must call `resume`.
    Manual,
    /// Every Step is submitted to the configured review handler; falls back
    /// to `Manual` if none is configured.
    ReviewRequired,
}

/// A decision the consumer makes in response to a `Paused`/`WaitingReview`
/// pull.
#[derive(Debug, Clone)]
pub enum ResumeDecision {
    /// Mark the current Step `completed`, resume pulling.
    Continue,
    /// Remain paused.
    Pause,
    /// Mark the current Step `aborted`, resume pulling.
    Skip,
    /// Terminal: all further pulls return an error.
    Abort,
    /// Append the Intervention (through the intervention handler, if any)
    /// and otherwise behave as `Continue`.
    Intervene(Intervention),
}

/// Outcome of a review handler call.
#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    Approved,
    Rejected,
    ApprovedWithChanges {
        description: Option<String>,
        metadata: HashMap<String, MetadataValue>,
        interventions: Vec<Intervention>,
    },
    /// The handler returned or raised an error; treated the same as a
    /// review timeout (conservative `rejected` default).
    Error(String),
}

#[async_trait]
pub trait ReviewHandler: Send + Sync {
    async fn review_step(&self, step: &Step) -> ReviewOutcome;
}

/// A transformer applied when an Intervention is accepted. `Err` is this
/// pipeline's stand-in for "the handler raised": the Step is left
/// unchanged and the batch this intervention belongs to is rolled back.
#[async_trait]
pub trait InterventionHandler: Send + Sync {
    async fn apply(&self, intervention: &Intervention, step: Step) -> Result<Step, String>;
}

/// What a pull returns.
#[derive(Debug, Clone)]
pub enum NextStep {
    /// A Step is ready to hand to the consumer.
    Ready(Step),
    /// A Step is waiting on `resume`.
    Paused(Step),
    /// A Step is waiting on a review handler; poll again to check progress.
    WaitingReview(Step),
    /// The Step stream is exhausted.
    Completed,
}

enum ControllerState {
    Running,
    Paused(Step),
    /// `resume` resolved the paused Step; the resolved Step is delivered on
    /// the next pull.
    ReadyToDeliver(Step),
    WaitingReview(Step, oneshot::Receiver<ReviewOutcome>),
    Completed,
    Aborted,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    errors: u64,
}

/// Observer snapshot for the Controller.
#[derive(Debug, Clone, Default)]
pub struct ControllerStatus {
    pub errors: u64,
    pub completed: bool,
    pub aborted: bool,
}

pub struct Controller<C: Clock = SystemClock> {
    receiver: mpsc::Receiver<Step>,
    mode: ControllerMode,
    control_timeout_ms: u64,
    review_handler: Option<std::sync::Arc<dyn ReviewHandler>>,
    intervention_handler: Option<std::sync::Arc<dyn InterventionHandler>>,
    clock: C,
    state: ControllerState,
    counters: Counters,
}

impl Controller<SystemClock> {
    /// Construct a Controller backed by the system clock.
    pub fn new(
        receiver: mpsc::Receiver<Step>,
        mode: ControllerMode,
        control_timeout_ms: u64,
        review_handler: Option<std::sync::Arc<dyn ReviewHandler>>,
        intervention_handler: Option<std::sync::Arc<dyn InterventionHandler>>,
    ) -> Self {
        Self::with_clock(receiver, mode, control_timeout_ms, review_handler, intervention_handler, SystemClock)
    }
}

impl<C: Clock> Controller<C> {
    /// Construct a Controller with an injected clock (tests use `FakeClock`).
    pub fn with_clock(
        receiver: mpsc::Receiver<Step>,
        mode: ControllerMode,
        control_timeout_ms: u64,
        review_handler: Option<std::sync::Arc<dyn ReviewHandler>>,
        intervention_handler: Option<std::sync::Arc<dyn InterventionHandler>>,
        clock: C,
    ) -> Self {
        Self {
            receiver,
            mode,
            control_timeout_ms,
            review_handler,
            intervention_handler,
            clock,
            state: ControllerState::Running,
            counters: Counters::default(),
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            errors: self.counters.errors,
            completed: matches!(self.state, ControllerState::Completed),
            aborted: matches!(self.state, ControllerState::Aborted),
        }
    }

    /// Pull the next Step. Idempotent while not `running`: repeated pulls
    /// in `Paused`/`WaitingReview` observe the same Step (polling the
    /// review outcome each time for `WaitingReview`).
    #[instrument(skip(self))]
    pub async fn next_step(&mut self) -> Result<NextStep, ControllerError> {
        // Take ownership of the state so branches needing `&mut self` (the
        // review poll, the Buffer pull) don't fight a live borrow of it.
        match std::mem::replace(&mut self.state, ControllerState::Running) {
            ControllerState::Aborted => {
                self.state = ControllerState::Aborted;
                Err(ControllerError::Aborted)
            }
            ControllerState::Completed => {
                self.state = ControllerState::Completed;
                Ok(NextStep::Completed)
            }
            ControllerState::Paused(step) => {
                self.state = ControllerState::Paused(step.clone());
                Ok(NextStep::Paused(step))
            }
            ControllerState::ReadyToDeliver(step) => Ok(NextStep::Ready(step)),
            ControllerState::WaitingReview(step, rx) => Ok(self.poll_review(step, rx).await),
            ControllerState::Running => {
                let Some(step) = self.receiver.recv().await else {
                    self.state = ControllerState::Completed;
                    return Ok(NextStep::Completed);
                };
                Ok(self.begin(step))
            }
        }
    }

    fn begin(&mut self, step: Step) -> NextStep {
        match self.mode {
            ControllerMode::Manual => {
                self.state = ControllerState::Paused(step.clone());
                NextStep::Paused(step)
            }
            ControllerMode::Automatic { pause_between_steps: true } => {
                self.state = ControllerState::Paused(step.clone());
                NextStep::Paused(step)
            }
            ControllerMode::Automatic { pause_between_steps: false } => {
                self.state = ControllerState::Running;
                NextStep::Ready(step)
            }
            ControllerMode::ReviewRequired => match self.review_handler.clone() {
                None => {
                    self.state = ControllerState::Paused(step.clone());
                    NextStep::Paused(step)
                }
                Some(handler) => {
                    let rx = self.spawn_review(handler, step.clone());
                    self.state = ControllerState::WaitingReview(step.clone(), rx);
                    NextStep::WaitingReview(step)
                }
            },
        }
    }

    fn spawn_review(&self, handler: std::sync::Arc<dyn ReviewHandler>, step: Step) -> oneshot::Receiver<ReviewOutcome> {
        let (tx, rx) = oneshot::channel();
        let timeout_ms = self.control_timeout_ms;
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), handler.review_step(&step)).await {
                Ok(outcome) => outcome,
                Err(_) => ReviewOutcome::Error("review timed out".to_string()),
            };
            let _ = tx.send(outcome);
        });
        rx
    }

    async fn poll_review(&mut self, step: Step, mut rx: oneshot::Receiver<ReviewOutcome>) -> NextStep {
        match rx.try_recv() {
            Ok(outcome) => self.apply_review_outcome(step, outcome).await,
            Err(oneshot::error::TryRecvError::Empty) => {
                self.state = ControllerState::WaitingReview(step.clone(), rx);
                NextStep::WaitingReview(step)
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                self.apply_review_outcome(step, ReviewOutcome::Error("review task dropped".to_string())).await
            }
        }
    }

    async fn apply_review_outcome(&mut self, mut step: Step, outcome: ReviewOutcome) -> NextStep {
        use stepwise_core::ReviewStatus;
        match outcome {
            ReviewOutcome::Approved => {
                step.review_status = Some(ReviewStatus::Approved);
                step.set_status(StepStatus::Completed, self.clock.now());
            }
            ReviewOutcome::Rejected => {
                step.review_status = Some(ReviewStatus::Rejected);
                step.set_status(StepStatus::Aborted, self.clock.now());
            }
            ReviewOutcome::ApprovedWithChanges { description, metadata, interventions } => {
                let snapshot = step.clone();
                let mut edited = step;
                if let Some(description) = description {
                    edited.description = description;
                }
                edited.merge_metadata(metadata);
                let (applied, ok) = self.apply_intervention_batch(edited, interventions).await;
                if ok {
                    let mut applied = applied;
                    applied.review_status = Some(ReviewStatus::Approved);
                    applied.set_status(StepStatus::Completed, self.clock.now());
                    step = applied;
                } else {
                    self.counters.errors += 1;
                    step = snapshot;
                    step.review_status = Some(ReviewStatus::Rejected);
                    step.set_status(StepStatus::Aborted, self.clock.now());
                }
            }
            ReviewOutcome::Error(reason) => {
                warn!(reason = %reason, "review handler error or timeout; defaulting to rejected");
                self.counters.errors += 1;
                step.review_status = Some(ReviewStatus::Rejected);
                step.set_status(StepStatus::Aborted, self.clock.now());
            }
        }
        self.state = ControllerState::Running;
        NextStep::Ready(step)
    }

    /// Apply a resume decision to the currently paused/waiting Step.
    pub async fn resume(&mut self, decision: ResumeDecision) -> Result<(), ControllerError> {
        let step = match &self.state {
            ControllerState::Paused(step) => step.clone(),
            _ => return Err(ControllerError::NoPendingStep),
        };

        match decision {
            ResumeDecision::Pause => Ok(()),
            ResumeDecision::Abort => {
                self.state = ControllerState::Aborted;
                Ok(())
            }
            ResumeDecision::Continue => {
                let mut step = step;
                step.set_status(StepStatus::Completed, self.clock.now());
                self.finish_paused(step);
                Ok(())
            }
            ResumeDecision::Skip => {
                let mut step = step;
                step.set_status(StepStatus::Aborted, self.clock.now());
                self.finish_paused(step);
                Ok(())
            }
            ResumeDecision::Intervene(intervention) => {
                let (applied, ok) = self.apply_intervention_batch(step, vec![intervention]).await;
                if ok {
                    let mut applied = applied;
                    applied.set_status(StepStatus::Completed, self.clock.now());
                    self.finish_paused(applied);
                } else {
                    // Exception leaves the Step unchanged; stay paused with
                    // the original Step so the consumer can retry or skip.
                    self.counters.errors += 1;
                }
                Ok(())
            }
        }
    }

    fn finish_paused(&mut self, step: Step) {
        self.state = ControllerState::ReadyToDeliver(step);
    }

    /// Sort by priority (critical first), apply sequentially via the
    /// intervention handler (falling back to a bare append when none is
    /// configured), marking each Intervention `applied` as it succeeds.
    /// On any failure, the failing Intervention is marked `failed` and
    /// every already-applied Intervention in this batch is marked
    /// `rolled_back` before reverting to the pre-batch snapshot.
    async fn apply_intervention_batch(&self, step: Step, mut interventions: Vec<Intervention>) -> (Step, bool) {
        interventions.sort_by_key(|i| i.priority.apply_order());
        let snapshot = step.clone();
        let mut current = step;
        let mut applied: Vec<Intervention> = Vec::new();
        for mut intervention in interventions {
            let outcome = match &self.intervention_handler {
                Some(handler) => handler.apply(&intervention, current).await,
                None => Ok(current),
            };
            match outcome {
                Ok(mut next) => {
                    intervention.mark_applied(self.clock.now());
                    next.push_intervention(intervention.clone());
                    applied.push(intervention);
                    current = next;
                }
                Err(reason) => {
                    intervention.mark_failed();
                    warn!(intervention_id = %intervention.id, reason = %reason, "intervention handler failed; rolling back batch");
                    for mut done in applied {
                        done.mark_rolled_back();
                    }
                    return (snapshot, false);
                }
            }
        }
        (current, true)
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
