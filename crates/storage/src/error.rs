// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors for the History component and its persistence adapters.

use thiserror::Error;

/// `handler_error`/`corruption_error` kinds surfaced by [`crate::history::History`].
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("persistence adapter error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("loaded conversation state failed integrity checks: {0}")]
    Corrupted(String),
    #[error("no checkpoint with id {0}")]
    CheckpointNotFound(String),
    #[error("no step with id {0} in history")]
    StepNotFound(String),
}

/// Errors from a [`crate::persistence::PersistenceAdapter`] implementation.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compress(String),
    #[error("conversation not found: {0}")]
    NotFound(String),
}
