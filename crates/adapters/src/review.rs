// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake review handler for testing the Controller's `ReviewRequired` mode
//! without a real reviewer attached.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use stepwise_core::Step;
use stepwise_engine::{ReviewHandler, ReviewOutcome};

struct FakeReviewState {
    calls: Vec<Step>,
    queued: VecDeque<ReviewOutcome>,
    default: ReviewOutcome,
}

/// Reviews Steps against a queue of canned outcomes; once the queue is
/// drained, every further call returns the configured default (`Approved`
/// unless overridden).
#[derive(Clone)]
pub struct FakeReviewHandler {
    inner: Arc<Mutex<FakeReviewState>>,
}

impl Default for FakeReviewHandler {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeReviewState {
                calls: Vec::new(),
                queued: VecDeque::new(),
                default: ReviewOutcome::Approved,
            })),
        }
    }
}

impl FakeReviewHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return this outcome, with no queue involved.
    pub fn always(outcome: ReviewOutcome) -> Self {
        let handler = Self::new();
        handler.inner.lock().default = outcome;
        handler
    }

    /// Queue outcomes to be returned one per call, in order.
    pub fn queue(&self, outcome: ReviewOutcome) {
        self.inner.lock().queued.push_back(outcome);
    }

    /// Steps passed to `review_step`, in call order.
    pub fn calls(&self) -> Vec<Step> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl ReviewHandler for FakeReviewHandler {
    async fn review_step(&self, step: &Step) -> ReviewOutcome {
        let mut state = self.inner.lock();
        state.calls.push(step.clone());
        state.queued.pop_front().unwrap_or_else(|| state.default.clone())
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
