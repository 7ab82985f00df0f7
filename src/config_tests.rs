// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_config_matches_the_documented_defaults() {
    let config = PipelineConfig::default();
    assert_eq!(config.detection.confidence_threshold, 0.7);
    assert_eq!(config.detection.max_history, 10);
    assert_eq!(config.buffer.buffer_timeout_ms, 5_000);
    assert_eq!(config.control.control_timeout_ms, 30_000);
    assert_eq!(config.history.max_step_history, 100);
}

#[test]
fn round_trips_through_toml() {
    let config = PipelineConfig::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: PipelineConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.detection.confidence_threshold, config.detection.confidence_threshold);
    assert_eq!(parsed.control.control_timeout_ms, config.control.control_timeout_ms);
}

#[test]
fn a_partial_toml_document_falls_back_to_defaults() {
    let parsed: PipelineConfig = toml::from_str("[control]\nmode = \"manual\"\n").unwrap();
    assert!(matches!(parsed.control.mode, ControlModeConfig::Manual));
    assert_eq!(parsed.detection.confidence_threshold, 0.7);
}
