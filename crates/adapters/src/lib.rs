// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the pipeline's external collaborators: the [`MessageSource`]
//! feeding in Messages, plus Fakes of `stepwise-engine`'s `ReviewHandler`
//! and `InterventionHandler` traits for wiring a Pipeline in tests without
//! a real reviewer or transformer attached.

pub mod message_source;

pub use message_source::{MessageSource, MessageSourceError, NoOpMessageSource};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod intervention;
#[cfg(any(test, feature = "test-support"))]
mod review;

#[cfg(any(test, feature = "test-support"))]
pub use intervention::{FakeInterventionHandler, InterventionCall};
#[cfg(any(test, feature = "test-support"))]
pub use message_source::FakeMessageSource;
#[cfg(any(test, feature = "test-support"))]
pub use review::FakeReviewHandler;
