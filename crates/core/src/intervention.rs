// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interventions: additive modifications applied to a Step in flight
//! (guidance, correction, or extra context).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for an Intervention.
    pub struct InterventionId;
}

/// The kind of intervention applied to a Step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    Guidance,
    Correction,
    Context,
}

/// Priority used to order intervention application: critical applies
/// before high, before medium, before low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPriority {
    // Declaration order is application order (lowest variant first);
    // `apply_order()` reverses it so Critical sorts first.
    Low,
    Medium,
    High,
    Critical,
}

impl InterventionPriority {
    /// Key such that sorting ascending by this key yields
    /// critical, high, medium, low.
    pub fn apply_order(self) -> std::cmp::Reverse<Self> {
        std::cmp::Reverse(self)
    }
}

impl fmt::Display for InterventionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterventionPriority::Low => "low",
            InterventionPriority::Medium => "medium",
            InterventionPriority::High => "high",
            InterventionPriority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of an intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Pending,
    Applied,
    Failed,
    RolledBack,
}

/// An additive modification applied to a Step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    pub id: InterventionId,
    pub intervention_type: InterventionType,
    pub content: String,
    pub priority: InterventionPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    pub status: InterventionStatus,
}

impl Intervention {
    /// Construct a pending intervention.
    pub fn new(
        id: InterventionId,
        intervention_type: InterventionType,
        content: impl Into<String>,
        priority: InterventionPriority,
    ) -> Self {
        Self {
            id,
            intervention_type,
            content: content.into(),
            priority,
            applied_at: None,
            status: InterventionStatus::Pending,
        }
    }

    pub fn mark_applied(&mut self, at: DateTime<Utc>) {
        self.status = InterventionStatus::Applied;
        self.applied_at = Some(at);
    }

    pub fn mark_failed(&mut self) {
        self.status = InterventionStatus::Failed;
    }

    pub fn mark_rolled_back(&mut self) {
        self.status = InterventionStatus::RolledBack;
    }
}

#[cfg(test)]
#[path = "intervention_tests.rs"]
mod tests;
