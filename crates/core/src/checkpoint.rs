// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A named snapshot of the step history at a point in time.

use crate::step::Step;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a Checkpoint.
    pub struct CheckpointId;
}

/// A checkpoint captures the full history as it stood at creation time, so
/// `restore_checkpoint` can replace history wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub step_count: usize,
    pub snapshot: Vec<Step>,
}

impl Checkpoint {
    pub fn new(id: CheckpointId, label: impl Into<String>, created_at: DateTime<Utc>, steps: Vec<Step>) -> Self {
        Self {
            id,
            label: label.into(),
            step_count: steps.len(),
            snapshot: steps,
            created_at,
        }
    }

    /// Step ids referenced by this checkpoint's snapshot, used by History's
    /// pruning to decide what must be preserved.
    pub fn referenced_step_ids(&self) -> impl Iterator<Item = &crate::step::StepId> {
        self.snapshot.iter().map(|s| &s.id)
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
