// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `stepwise`: the facade crate assembling `stepwise-core`'s data model,
//! `stepwise-engine`'s Detector/Buffer/Controller, and `stepwise-storage`'s
//! History into one `Pipeline` per conversation (`message iterator ->
//! Detector -> Buffer -> Step emission -> Controller -> History`).
//!
//! Library crates in this workspace never install a `tracing` subscriber;
//! [`logging::init_tracing`] is the one place that does, matching the
//! teacher's daemon-owns-the-subscriber convention.

pub mod config;
pub mod logging;
mod pipeline;

pub use config::{ControlConfig, ControlModeConfig, DetectionConfig, DetectionStrategyConfig, PipelineConfig};
pub use logging::init_tracing;
pub use pipeline::{Pipeline, PipelineCollaborators, PipelineError, PipelineStatus};

// Re-exported so a caller can build a Pipeline against this crate alone,
// without depending on the workspace's member crates directly.
pub use stepwise_adapters::{MessageSource, MessageSourceError, NoOpMessageSource};
pub use stepwise_core::{
    Checkpoint, CheckpointId, Clock, FakeClock, Intervention, InterventionId, InterventionPriority, InterventionStatus,
    InterventionType, Message, MessageKind, Pattern, Step, StepId, StepStatus, StepType, SystemClock,
};
pub use stepwise_engine::{ControllerMode, InterventionHandler, NextStep, ResumeDecision, ReviewHandler, ReviewOutcome};
pub use stepwise_storage::{
    FileSystemAdapter, HistoryConfig, PersistenceAdapter, PruneOptions, PruneResult, ReplayFrom, ReplayItem, ReplayOptions,
    ReplayTo,
};

#[cfg(any(test, feature = "test-support"))]
pub use stepwise_adapters::{FakeInterventionHandler, FakeMessageSource, FakeReviewHandler};
#[cfg(any(test, feature = "test-support"))]
pub use stepwise_storage::InMemoryAdapter;
