// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors the engine surfaces to its caller. Detection and timeout
//! failures are localized internally and never reach these types.

use thiserror::Error;

/// `resource_error`s raised by the Buffer when a ceiling configured in
/// `BufferConfig` is tripped.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("buffer size {actual} exceeds the configured maximum {max}")]
    BufferSizeExceeded { actual: usize, max: usize },
    #[error("estimated buffer memory {actual_mb}MB exceeds the configured maximum {max_mb}MB")]
    MemoryLimitExceeded { actual_mb: usize, max_mb: usize },
}

/// `protocol_error`s raised by the Controller for an invalid control-plane
/// call. The Controller's state is unchanged when one of these is returned.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no Step is pending a decision")]
    NoPendingStep,
    #[error("the pipeline was aborted and accepts no further decisions")]
    Aborted,
    #[error("unknown intervention type: {0}")]
    UnknownInterventionType(String),
}
