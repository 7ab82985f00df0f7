// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake message source for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{MessageSource, MessageSourceError};
use async_trait::async_trait;
use std::collections::VecDeque;
use stepwise_core::Message;

/// A fixed, in-memory message source for deterministic tests.
#[derive(Debug, Default)]
pub struct FakeMessageSource {
    queue: VecDeque<Message>,
    close_with_error: Option<String>,
}

impl FakeMessageSource {
    pub fn new(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            queue: messages.into_iter().collect(),
            close_with_error: None,
        }
    }

    /// After the queued messages are exhausted, return this error instead
    /// of a clean `Ok(None)` close.
    pub fn closing_with_error(mut self, reason: impl Into<String>) -> Self {
        self.close_with_error = Some(reason.into());
        self
    }

    pub fn push(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl MessageSource for FakeMessageSource {
    async fn next_message(&mut self) -> Result<Option<Message>, MessageSourceError> {
        match self.queue.pop_front() {
            Some(message) => Ok(Some(message)),
            None => match self.close_with_error.take() {
                Some(reason) => Err(MessageSourceError::Closed(reason)),
                None => Ok(None),
            },
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
