// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake intervention handler for testing the Controller's intervention
//! batch application without a real transformer attached.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use stepwise_core::{Intervention, InterventionId, Step};
use stepwise_engine::InterventionHandler;

#[derive(Debug, Clone)]
pub struct InterventionCall {
    pub intervention_id: InterventionId,
    pub step_description: String,
}

struct FakeInterventionState {
    calls: Vec<InterventionCall>,
    fail_ids: HashSet<InterventionId>,
}

/// Applies interventions by appending their content to the Step's
/// description; `fail` marks specific interventions to reject instead, so
/// tests can exercise the Controller's rollback path.
#[derive(Clone)]
pub struct FakeInterventionHandler {
    inner: Arc<Mutex<FakeInterventionState>>,
}

impl Default for FakeInterventionHandler {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeInterventionState { calls: Vec::new(), fail_ids: HashSet::new() })),
        }
    }
}

impl FakeInterventionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `apply` return an error for this specific intervention id.
    pub fn fail(&self, id: InterventionId) {
        self.inner.lock().fail_ids.insert(id);
    }

    pub fn calls(&self) -> Vec<InterventionCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl InterventionHandler for FakeInterventionHandler {
    async fn apply(&self, intervention: &Intervention, mut step: Step) -> Result<Step, String> {
        let mut state = self.inner.lock();
        state.calls.push(InterventionCall {
            intervention_id: intervention.id.clone(),
            step_description: step.description.clone(),
        });
        if state.fail_ids.contains(&intervention.id) {
            return Err(format!("intervention {} rejected", intervention.id));
        }
        step.description = format!("{} [{}]", step.description, intervention.content);
        Ok(step)
    }
}

#[cfg(test)]
#[path = "intervention_tests.rs"]
mod tests;
