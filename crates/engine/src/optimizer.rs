// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An optional memoizing decorator in front of a [`Detector`]: an LRU
//! keyed by `(message kind, sorted tool set, content hash, current step
//! type)`, useful for benchmarking and repeatable-message workloads. Never
//! a correctness dependency — callers that don't construct one get
//! exactly `Detector`'s behavior.
//!
//! Follows a cache-with-miss-population pattern (a `Mutex<HashMap<...>>`
//! populated lazily and consulted before doing real work); here the cache
//! is owned outright rather than shared, since the Detector itself is
//! single-owner (the Buffer's loop).

use crate::detector::{Decision, Detector};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use stepwise_core::{Message, StepType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: stepwise_core::MessageKind,
    tools: Vec<String>,
    content_hash: u64,
    current_type: Option<StepType>,
}

impl CacheKey {
    fn new(message: &Message, tools_used_so_far: &[String], current_type: Option<StepType>) -> Self {
        let mut tools: Vec<String> = tools_used_so_far.to_vec();
        tools.sort_unstable();
        let mut hasher = DefaultHasher::new();
        message.content.hash(&mut hasher);
        Self {
            kind: message.kind,
            tools,
            content_hash: hasher.finish(),
            current_type,
        }
    }
}

/// Observer snapshot for the Optimizer cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizerStatus {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Wraps a [`Detector`], memoizing decisions for messages with an empty
/// in-progress buffer (i.e. the start of a candidate step) under a bounded
/// LRU. Messages mid-step (`buffer` non-empty) always fall through to the
/// inner Detector: `message_sequence` triggers depend on buffer contents
/// the key doesn't capture, so caching there would be unsound.
pub struct OptimizingDetector {
    inner: Detector,
    capacity: usize,
    cache: HashMap<CacheKey, Decision>,
    lru: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

impl OptimizingDetector {
    pub fn new(inner: Detector, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: HashMap::new(),
            lru: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn status(&self) -> OptimizerStatus {
        OptimizerStatus {
            hits: self.hits,
            misses: self.misses,
            size: self.cache.len(),
        }
    }

    pub fn current_type(&self) -> Option<StepType> {
        self.inner.current_type()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn analyze(&mut self, message: &Message, buffer: &[Message], tools_used_so_far: &[String]) -> Decision {
        if !buffer.is_empty() {
            return self.inner.analyze(message, buffer, tools_used_so_far);
        }

        let key = CacheKey::new(message, tools_used_so_far, self.inner.current_type());
        if let Some(decision) = self.cache.get(&key).cloned() {
            self.hits += 1;
            self.touch(&key);
            self.inner.observe(&decision);
            return decision;
        }

        self.misses += 1;
        let decision = self.inner.analyze(message, buffer, tools_used_so_far);
        self.insert(key, decision.clone());
        decision
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            if let Some(key) = self.lru.remove(pos) {
                self.lru.push_back(key);
            }
        }
    }

    fn insert(&mut self, key: CacheKey, decision: Decision) {
        if self.cache.len() >= self.capacity {
            if let Some(oldest) = self.lru.pop_front() {
                self.cache.remove(&oldest);
            }
        }
        self.lru.push_back(key.clone());
        self.cache.insert(key, decision);
    }
}

#[cfg(test)]
#[path = "optimizer_tests.rs"]
mod tests;
