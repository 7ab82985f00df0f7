// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence adapter contract History delegates durable storage to.
//! The core never picks a storage technology; it only depends on this
//! trait.

use crate::error::PersistenceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core::Checkpoint;
use stepwise_core::Step;

/// The durable record for one conversation: the full step history plus
/// checkpoints and the auto-checkpoint counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationData {
    pub conversation_id: String,
    pub step_history: Vec<Step>,
    pub checkpoints: Vec<Checkpoint>,
    pub step_count_since_checkpoint: usize,
    pub updated_at: DateTime<Utc>,
}

/// External persistence collaborator. Ordering and atomicity of the
/// underlying store are the adapter's responsibility; History assumes each
/// `save_conversation` call either fully succeeds or fails, with errors
/// surfacing intact to the caller.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync + 'static {
    /// One-time setup (e.g. create a base directory). Called once at
    /// History construction.
    async fn init(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn save_conversation(&self, conversation_id: &str, data: &ConversationData) -> Result<(), PersistenceError>;

    /// `Ok(None)` means no record exists yet for this conversation (distinct
    /// from a load failure, which is `Err`).
    async fn load_conversation(&self, conversation_id: &str) -> Result<Option<ConversationData>, PersistenceError>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), PersistenceError>;

    async fn list_conversations(&self) -> Result<Vec<String>, PersistenceError>;

    /// Optional housekeeping (e.g. removing orphaned temp files). Default
    /// no-op; adapters with nothing to clean up need not override it.
    async fn cleanup(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryAdapter;

#[cfg(any(test, feature = "test-support"))]
mod in_memory {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// In-memory [`PersistenceAdapter`] for deterministic tests: no I/O,
    /// optionally primed with a failure to exercise History's error paths.
    #[derive(Clone, Default)]
    pub struct InMemoryAdapter {
        inner: Arc<Mutex<HashMap<String, ConversationData>>>,
        fail_next_save: Arc<std::sync::atomic::AtomicBool>,
        fail_load: Arc<std::sync::atomic::AtomicBool>,
    }

    impl InMemoryAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Prime the adapter to return a persistence error on the next
        /// `save_conversation` call (auto-resets after firing once).
        pub fn fail_next_save(&self) {
            self.fail_next_save.store(true, std::sync::atomic::Ordering::SeqCst);
        }

        /// Prime the adapter so every `load_conversation` call fails, e.g.
        /// to exercise `enable_recovery`.
        pub fn fail_loads(&self, fail: bool) {
            self.fail_load.store(fail, std::sync::atomic::Ordering::SeqCst);
        }

        pub fn seeded(conversation_id: impl Into<String>, data: ConversationData) -> Self {
            let adapter = Self::new();
            adapter.inner.lock().insert(conversation_id.into(), data);
            adapter
        }
    }

    #[async_trait]
    impl PersistenceAdapter for InMemoryAdapter {
        async fn save_conversation(&self, conversation_id: &str, data: &ConversationData) -> Result<(), PersistenceError> {
            if self.fail_next_save.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(PersistenceError::Io(std::io::Error::other("injected save failure")));
            }
            self.inner.lock().insert(conversation_id.to_string(), data.clone());
            Ok(())
        }

        async fn load_conversation(&self, conversation_id: &str) -> Result<Option<ConversationData>, PersistenceError> {
            if self.fail_load.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(PersistenceError::Io(std::io::Error::other("injected load failure")));
            }
            Ok(self.inner.lock().get(conversation_id).cloned())
        }

        async fn delete_conversation(&self, conversation_id: &str) -> Result<(), PersistenceError> {
            self.inner.lock().remove(conversation_id);
            Ok(())
        }

        async fn list_conversations(&self) -> Result<Vec<String>, PersistenceError> {
            Ok(self.inner.lock().keys().cloned().collect())
        }
    }
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
