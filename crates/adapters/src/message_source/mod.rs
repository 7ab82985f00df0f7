// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The message source: the injected collaborator that feeds already-parsed
//! [`Message`]s to the pipeline in arrival order. Parsing the assistant
//! process's line-delimited JSON transport is explicitly out of scope;
//! this crate only defines the contract, a closed-from-the-start default,
//! and a fake for testing.

use async_trait::async_trait;
use stepwise_core::Message;
use thiserror::Error;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMessageSource;

/// Errors a `MessageSource` may surface while producing the next message.
#[derive(Debug, Error)]
pub enum MessageSourceError {
    #[error("message source closed: {0}")]
    Closed(String),
}

/// A finite or unbounded source of already-parsed messages, in arrival
/// order. `next_message` returning `Ok(None)` signals a clean close: the
/// pipeline flushes any in-progress Step and stops. An `Err` signals an
/// abnormal close.
#[async_trait]
pub trait MessageSource: Send + 'static {
    async fn next_message(&mut self) -> Result<Option<Message>, MessageSourceError>;
}

/// A source that is closed from the start; useful as a default before a
/// real source is wired up.
#[derive(Debug, Default)]
pub struct NoOpMessageSource;

#[async_trait]
impl MessageSource for NoOpMessageSource {
    async fn next_message(&mut self) -> Result<Option<Message>, MessageSourceError> {
        Ok(None)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
