// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializable configuration for every component the [`crate::Pipeline`]
//! assembles. Collaborators that cannot be expressed as plain data — the
//! pattern vocabulary, review/intervention handlers, the persistence
//! adapter — are supplied separately to [`crate::Pipeline::new`] rather
//! than folded into this struct.

use serde::{Deserialize, Serialize};
use stepwise_engine::{BufferConfig, ControllerMode, DetectionStrategy};
use stepwise_storage::HistoryConfig;

/// Mirrors [`DetectionStrategy`] with a serde-friendly representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategyConfig {
    PatternBased,
    Heuristic,
    Hybrid,
}

impl Default for DetectionStrategyConfig {
    fn default() -> Self {
        Self::PatternBased
    }
}

impl From<DetectionStrategyConfig> for DetectionStrategy {
    fn from(value: DetectionStrategyConfig) -> Self {
        match value {
            DetectionStrategyConfig::PatternBased => DetectionStrategy::PatternBased,
            DetectionStrategyConfig::Heuristic => DetectionStrategy::Heuristic,
            DetectionStrategyConfig::Hybrid => DetectionStrategy::Hybrid,
        }
    }
}

/// Detector configuration. The pattern vocabulary itself is not
/// represented here — it carries compiled regexes and optional closures,
/// neither of which round-trip through serde — and is instead passed to
/// [`crate::Pipeline::new`] directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub strategy: DetectionStrategyConfig,
    pub confidence_threshold: f64,
    pub max_history: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategyConfig::default(),
            confidence_threshold: 0.7,
            max_history: 10,
        }
    }
}

/// Mirrors [`ControllerMode`] minus its `pause_between_steps` payload,
/// which is configured separately so it can apply only to `automatic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlModeConfig {
    Automatic,
    Manual,
    ReviewRequired,
}

impl Default for ControlModeConfig {
    fn default() -> Self {
        Self::Automatic
    }
}

impl ControlModeConfig {
    pub fn into_controller_mode(self, pause_between_steps: bool) -> ControllerMode {
        match self {
            ControlModeConfig::Automatic => ControllerMode::Automatic { pause_between_steps },
            ControlModeConfig::Manual => ControllerMode::Manual,
            ControlModeConfig::ReviewRequired => ControllerMode::ReviewRequired,
        }
    }
}

/// Controller configuration. The review and intervention handlers are
/// external collaborators and are supplied directly to
/// [`crate::Pipeline::new`], not serialized here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub mode: ControlModeConfig,
    pub pause_between_steps: bool,
    pub control_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            mode: ControlModeConfig::default(),
            pause_between_steps: false,
            control_timeout_ms: 30_000,
        }
    }
}

/// Aggregates every serializable component configuration into the one
/// value a caller loads from a config file (e.g. via `toml`) and passes to
/// [`crate::Pipeline::new`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionConfig,
    pub buffer: BufferConfig,
    pub control: ControlConfig,
    pub history: HistoryConfig,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
