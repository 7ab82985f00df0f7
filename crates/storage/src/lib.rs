// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stepwise-storage: the History component — an append-only, bounded,
//! checkpointable log of completed Steps, plus the `PersistenceAdapter`
//! contract it delegates durable storage to and a reference
//! zstd-compressed file-based adapter.

pub mod error;
pub mod file_adapter;
pub mod history;
pub mod persistence;

pub use error::{HistoryError, PersistenceError};
pub use file_adapter::{FileOps, FileSystemAdapter, RealFileOps};
pub use history::{
    History, HistoryConfig, HistoryStats, PruneOptions, PruneResult, ReplayFrom, ReplayItem, ReplayOptions, ReplayTo, StepSummary,
};
pub use persistence::{ConversationData, PersistenceAdapter};

#[cfg(any(test, feature = "test-support"))]
pub use persistence::InMemoryAdapter;
