// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The central entity: a [`Step`] bundles the messages of one coherent,
//! reviewable unit of work together with its detected kind, tools used,
//! timing, status, and any applied interventions.

use crate::intervention::Intervention;
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a Step, stable for its lifetime.
    pub struct StepId;
}

/// The detected kind of a Step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    FileOperation,
    CodeModification,
    SystemCommand,
    Exploration,
    Analysis,
    Communication,
    Unknown,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepType::FileOperation => "file_operation",
            StepType::CodeModification => "code_modification",
            StepType::SystemCommand => "system_command",
            StepType::Exploration => "exploration",
            StepType::Analysis => "analysis",
            StepType::Communication => "communication",
            StepType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a Step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Timeout,
    Aborted,
    Error,
}

impl StepStatus {
    /// Terminal statuses set `completed_at`; `InProgress` is the only
    /// non-terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::InProgress)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Timeout => "timeout",
            StepStatus::Aborted => "aborted",
            StepStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a `review_required` controller pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// A value stored in a Step's metadata map. Kept intentionally small and
/// JSON-shaped: the pipeline never interprets these values itself, it only
/// merges and carries them: a mapping from symbolic key to opaque value.
pub type MetadataValue = serde_json::Value;

/// A coherent, reviewable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub step_type: StepType,
    pub description: String,
    pub messages: Vec<Message>,
    pub tools_used: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_status: Option<ReviewStatus>,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

impl Step {
    /// Start a new in-progress Step seeded with its first message.
    pub fn start(id: StepId, step_type: StepType, first: Message, started_at: DateTime<Utc>) -> Self {
        let description = default_description(&first, step_type);
        let mut step = Self {
            id,
            step_type,
            description,
            messages: Vec::new(),
            tools_used: Vec::new(),
            started_at,
            completed_at: None,
            status: StepStatus::InProgress,
            review_status: None,
            metadata: HashMap::new(),
            interventions: Vec::new(),
        };
        step.push_message(first);
        step
    }

    /// Append a message, preserving arrival order, and recompute `tools_used`.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.recompute_tools_used();
    }

    /// Recompute `tools_used` as the de-duplicated, insertion-ordered set of
    /// tool names extracted from `messages`.
    pub fn recompute_tools_used(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let mut ordered = Vec::new();
        for message in &self.messages {
            for tool in message.tool_names() {
                if seen.insert(tool.clone()) {
                    ordered.push(tool);
                }
            }
        }
        self.tools_used = ordered;
    }

    /// Merge metadata entries, never overwriting the map in bulk.
    pub fn merge_metadata(&mut self, entries: impl IntoIterator<Item = (String, MetadataValue)>) {
        for (key, value) in entries {
            self.metadata.insert(key, value);
        }
    }

    /// Transition to a terminal status, stamping `completed_at`. No-op if
    /// already terminal: the Buffer calls this exactly once per Step, at
    /// emission, and a second call must never clobber the first timestamp.
    pub fn complete(&mut self, status: StepStatus, at: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        debug_assert!(status.is_terminal(), "complete() requires a terminal status");
        self.status = status;
        self.completed_at = Some(at);
    }

    /// Override the Step's disposition, even if already terminal. The
    /// Buffer hands the Controller an already-completed Step (it must set a
    /// terminal status before emission, per the detection pipeline's own
    /// rules); the Controller then has the final say on the Step's outcome
    /// (`resume` decisions, review verdicts) and must be able to supersede
    /// that provisional status rather than be blocked by it: an emitted
    /// Step is mutable only via Controller-applied, status-setting
    /// transitions.
    pub fn set_status(&mut self, status: StepStatus, at: DateTime<Utc>) {
        debug_assert!(status.is_terminal(), "set_status() requires a terminal status");
        self.status = status;
        self.completed_at = Some(at);
    }

    /// Append an intervention. Additive only.
    pub fn push_intervention(&mut self, intervention: Intervention) {
        self.interventions.push(intervention);
    }

    /// `true` once the Step has reached a terminal status and is eligible
    /// for emission.
    pub fn is_emittable(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Derive a short human description from the first assistant message, or
/// fall back to the pattern/type name if the first message carries no
/// useful text (e.g. a tool_result or system message).
fn default_description(first: &Message, step_type: StepType) -> String {
    let trimmed = first.content.trim();
    if trimmed.is_empty() {
        return format!("{step_type} step");
    }
    let mut desc: String = trimmed.chars().take(120).collect();
    if trimmed.chars().count() > 120 {
        desc.push('…');
    }
    desc
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
