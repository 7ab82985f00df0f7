// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The History component: an append-only, bounded, checkpointable log of
//! completed Steps, delegating durable storage to a
//! [`crate::persistence::PersistenceAdapter`].
//!
//! History is owned exclusively by whoever assembles the pipeline (the
//! facade crate) — there is no internal actor loop here, unlike the
//! Buffer/Controller. Single-writer access falls out of ordinary Rust
//! ownership (`&mut self`) rather than a mailbox, since nothing else in the
//! pipeline touches History concurrently.

use crate::error::HistoryError;
use crate::persistence::{ConversationData, PersistenceAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use stepwise_core::{Checkpoint, CheckpointId, Clock, IdGen, Step, StepId, StepStatus, StepType, SystemClock, UuidIdGen};
use tracing::{instrument, warn};

/// Resource bound and auto-checkpoint cadence for a History instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_step_history: usize,
    pub auto_checkpoint_interval: usize,
    pub enable_recovery: bool,
    pub preserve_checkpoints: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_step_history: 100,
            auto_checkpoint_interval: 20,
            enable_recovery: true,
            preserve_checkpoints: true,
        }
    }
}

/// Observer snapshot of History's internal counters.
#[derive(Debug, Clone, Default)]
pub struct HistoryStats {
    pub total_steps: usize,
    pub checkpoint_count: usize,
    pub steps_since_checkpoint: usize,
    pub saves: u64,
    pub prunes: u64,
    pub errors: u64,
}

/// Options for [`History::prune`]. `None` falls back to the configured
/// default for that field.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneOptions {
    pub max_step_history: Option<usize>,
    pub preserve_checkpoints: Option<bool>,
}

/// Result of a prune pass; `prune_history` surfaces the count removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneResult {
    pub pruned: usize,
}

/// Where a replay starts.
#[derive(Debug, Clone)]
pub enum ReplayFrom {
    Beginning,
    FromStep(StepId),
    FromCheckpoint(CheckpointId),
}

/// Where a replay ends.
#[derive(Debug, Clone)]
pub enum ReplayTo {
    End,
    ToStep(StepId),
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub from: ReplayFrom,
    pub to: ReplayTo,
    /// Project to summary form instead of returning full Steps.
    pub summary: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            from: ReplayFrom::Beginning,
            to: ReplayTo::End,
            summary: false,
        }
    }
}

/// Summary projection of a Step for replay (id, type, description,
/// timestamps, status, tools_used).
#[derive(Debug, Clone, PartialEq)]
pub struct StepSummary {
    pub id: StepId,
    pub step_type: StepType,
    pub description: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: StepStatus,
    pub tools_used: Vec<String>,
}

impl From<&Step> for StepSummary {
    fn from(step: &Step) -> Self {
        Self {
            id: step.id.clone(),
            step_type: step.step_type,
            description: step.description.clone(),
            started_at: step.started_at,
            completed_at: step.completed_at,
            status: step.status,
            tools_used: step.tools_used.clone(),
        }
    }
}

/// One item yielded by [`History::replay`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayItem {
    Full(Box<Step>),
    Summary(StepSummary),
}

/// The bounded, checkpointable step log for one conversation.
pub struct History<A: PersistenceAdapter, C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    adapter: A,
    conversation_id: String,
    config: HistoryConfig,
    clock: C,
    id_gen: I,
    steps: Vec<Step>,
    checkpoints: Vec<Checkpoint>,
    since_checkpoint: usize,
    stats: HistoryStats,
}

impl<A: PersistenceAdapter> History<A, SystemClock, UuidIdGen> {
    /// Initialize History for `conversation_id`, loading any existing
    /// record via the adapter. With `enable_recovery`, a load failure is
    /// logged and treated as an empty history rather than a fatal error.
    pub async fn load(adapter: A, conversation_id: impl Into<String>, config: HistoryConfig) -> Result<Self, HistoryError> {
        Self::load_with(adapter, conversation_id, config, SystemClock, UuidIdGen)
            .await
    }
}

impl<A: PersistenceAdapter, C: Clock, I: IdGen> History<A, C, I> {
    /// Same as [`History::load`] but with an injected clock and id
    /// generator, for deterministic tests.
    pub async fn load_with(
        adapter: A,
        conversation_id: impl Into<String>,
        config: HistoryConfig,
        clock: C,
        id_gen: I,
    ) -> Result<Self, HistoryError> {
        let conversation_id = conversation_id.into();
        adapter.init().await?;

        let loaded = adapter.load_conversation(&conversation_id).await;
        let (steps, checkpoints, since_checkpoint) = match loaded {
            Ok(Some(data)) => (data.step_history, data.checkpoints, data.step_count_since_checkpoint),
            Ok(None) => (Vec::new(), Vec::new(), 0),
            Err(e) if config.enable_recovery => {
                warn!(error = %e, %conversation_id, "failed to load conversation history; starting empty");
                (Vec::new(), Vec::new(), 0)
            }
            Err(e) => return Err(HistoryError::Persistence(e)),
        };

        Ok(Self {
            adapter,
            conversation_id,
            config,
            clock,
            id_gen,
            steps,
            checkpoints,
            since_checkpoint,
            stats: HistoryStats::default(),
        })
    }

    /// Append a completed Step, persist, and auto-checkpoint every
    /// `auto_checkpoint_interval` saves.
    #[instrument(skip(self, step), fields(step_id = %step.id))]
    pub async fn save_step(&mut self, step: Step) -> Result<(), HistoryError> {
        self.steps.push(step);
        self.since_checkpoint += 1;
        self.stats.saves += 1;

        if self.config.auto_checkpoint_interval > 0 && self.since_checkpoint >= self.config.auto_checkpoint_interval {
            let label = format!("auto-{}", self.clock.now().timestamp());
            self.checkpoint_now(label)?;
        }

        self.persist().await
    }

    /// Create a named checkpoint of the current history, resetting the
    /// auto-checkpoint counter.
    pub async fn create_checkpoint(&mut self, label: impl Into<String>) -> Result<CheckpointId, HistoryError> {
        let id = self.checkpoint_now(label)?;
        self.persist().await?;
        Ok(id)
    }

    fn checkpoint_now(&mut self, label: impl Into<String>) -> Result<CheckpointId, HistoryError> {
        let id = CheckpointId::new(self.id_gen.next());
        let checkpoint = Checkpoint::new(id.clone(), label, self.clock.now(), self.steps.clone());
        self.checkpoints.push(checkpoint);
        self.since_checkpoint = 0;
        Ok(id)
    }

    /// Replace history wholesale with the named checkpoint's snapshot.
    /// Other checkpoints are left untouched; resets the auto-checkpoint
    /// counter.
    pub async fn restore_checkpoint(&mut self, id: &CheckpointId) -> Result<(), HistoryError> {
        let snapshot = self
            .checkpoints
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.snapshot.clone())
            .ok_or_else(|| HistoryError::CheckpointNotFound(id.to_string()))?;
        self.steps = snapshot;
        self.since_checkpoint = 0;
        self.persist().await
    }

    pub fn get_history(&self) -> &[Step] {
        &self.steps
    }

    pub fn get_checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Remove oldest Steps first until `|history| <= max_step_history`.
    /// Steps referenced by any checkpoint snapshot are preserved (unless
    /// `preserve_checkpoints=false`), possibly leaving the log above the
    /// bound. Retained Steps are re-sorted by `started_at`; equal
    /// timestamps keep their relative insertion order (a stable sort).
    pub async fn prune(&mut self, opts: PruneOptions) -> Result<PruneResult, HistoryError> {
        let max = opts.max_step_history.unwrap_or(self.config.max_step_history);
        let preserve = opts.preserve_checkpoints.unwrap_or(self.config.preserve_checkpoints);

        if self.steps.len() <= max {
            return Ok(PruneResult { pruned: 0 });
        }

        let referenced: HashSet<StepId> = if preserve {
            self.checkpoints
                .iter()
                .flat_map(|c| c.referenced_step_ids().cloned())
                .collect()
        } else {
            HashSet::new()
        };

        let mut by_age: Vec<usize> = (0..self.steps.len()).collect();
        by_age.sort_by_key(|&i| self.steps[i].started_at);

        let mut to_remove = self.steps.len() - max;
        let mut remove: HashSet<usize> = HashSet::new();
        for i in by_age {
            if to_remove == 0 {
                break;
            }
            if preserve && referenced.contains(&self.steps[i].id) {
                continue;
            }
            remove.insert(i);
            to_remove -= 1;
        }

        let pruned = remove.len();
        let mut retained: Vec<Step> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(i, _)| !remove.contains(i))
            .map(|(_, s)| s.clone())
            .collect();
        retained.sort_by_key(|s| s.started_at);
        self.steps = retained;
        self.stats.prunes += 1;

        self.persist().await?;
        Ok(PruneResult { pruned })
    }

    /// Drop all Steps and checkpoints.
    pub async fn clear(&mut self) -> Result<(), HistoryError> {
        self.steps.clear();
        self.checkpoints.clear();
        self.since_checkpoint = 0;
        self.persist().await
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_steps: self.steps.len(),
            checkpoint_count: self.checkpoints.len(),
            steps_since_checkpoint: self.since_checkpoint,
            ..self.stats.clone()
        }
    }

    /// Stream Steps (or summaries) between two anchors. `from_checkpoint`
    /// starts right after the last Step present in that checkpoint's
    /// snapshot (i.e. the history as it stood when the checkpoint was
    /// taken).
    pub fn replay(&self, opts: ReplayOptions) -> Result<Vec<ReplayItem>, HistoryError> {
        let start = match &opts.from {
            ReplayFrom::Beginning => 0,
            ReplayFrom::FromStep(id) => self.index_of(id)?,
            ReplayFrom::FromCheckpoint(id) => {
                let checkpoint = self
                    .checkpoints
                    .iter()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| HistoryError::CheckpointNotFound(id.to_string()))?;
                checkpoint.snapshot.len()
            }
        };
        let end = match &opts.to {
            ReplayTo::End => self.steps.len(),
            ReplayTo::ToStep(id) => self.index_of(id)? + 1,
        };

        let end = end.max(start);
        Ok(self.steps[start.min(self.steps.len())..end.min(self.steps.len())]
            .iter()
            .map(|step| {
                if opts.summary {
                    ReplayItem::Summary(StepSummary::from(step))
                } else {
                    ReplayItem::Full(Box::new(step.clone()))
                }
            })
            .collect())
    }

    fn index_of(&self, id: &StepId) -> Result<usize, HistoryError> {
        self.steps
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| HistoryError::StepNotFound(id.to_string()))
    }

    async fn persist(&mut self) -> Result<(), HistoryError> {
        let data = ConversationData {
            conversation_id: self.conversation_id.clone(),
            step_history: self.steps.clone(),
            checkpoints: self.checkpoints.clone(),
            step_count_since_checkpoint: self.since_checkpoint,
            updated_at: self.clock.now(),
        };
        match self.adapter.save_conversation(&self.conversation_id, &data).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stats.errors += 1;
                Err(HistoryError::Persistence(e))
            }
        }
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
