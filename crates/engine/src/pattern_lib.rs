// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in pattern vocabulary: one [`Pattern`] per [`StepType`], tuned
//! with the priority/confidence/trigger values a reviewer would expect from
//! file, code, shell, search, and chat activity.
//!
//! Callers that want a different vocabulary construct their own
//! `Vec<Pattern>` and pass it to [`crate::detector::Detector::new`] instead
//! of calling [`builtin_patterns`] — the pattern set is data, not a fixed
//! enum of strategies.

use stepwise_core::{Pattern, StepType, Trigger, Validator};
use std::collections::HashSet;
use std::sync::Arc;

fn tools(names: &[&str]) -> Arc<HashSet<String>> {
    Arc::new(names.iter().map(|s| s.to_string()).collect())
}

#[allow(clippy::panic)]
fn regex_trigger(pattern: &str) -> Trigger {
    Trigger::MessageContent(
        regex::Regex::new(pattern).unwrap_or_else(|e| panic!("builtin regex {pattern:?} is invalid: {e}")),
    )
}

/// The default pattern vocabulary, ordered roughly by specificity. Priority
/// and confidence values favor concrete tool usage over looser textual
/// matches when multiple patterns fire on the same message.
pub fn builtin_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            id: "file_operation".to_string(),
            name: "File operation".to_string(),
            step_type: StepType::FileOperation,
            triggers: vec![Trigger::ToolUsage(tools(&["Write", "Read", "NotebookEdit"]))],
            validators: vec![],
            priority: 90,
            confidence: 0.95,
        },
        Pattern {
            id: "code_modification".to_string(),
            name: "Code modification".to_string(),
            step_type: StepType::CodeModification,
            triggers: vec![
                Trigger::ToolUsage(tools(&["Edit", "MultiEdit", "Write"])),
                regex_trigger(r"(?i)implement|refactor|fix|update.*code"),
            ],
            validators: vec![Validator::ToolCount { min: Some(1), max: None }],
            priority: 85,
            confidence: 0.90,
        },
        Pattern {
            id: "system_command".to_string(),
            name: "System command".to_string(),
            step_type: StepType::SystemCommand,
            triggers: vec![
                Trigger::ToolUsage(tools(&["Bash", "BashOutput", "KillShell"])),
                regex_trigger(r"(?i)run|execute|command|shell|bash"),
            ],
            validators: vec![],
            priority: 80,
            confidence: 0.90,
        },
        Pattern {
            id: "exploration".to_string(),
            name: "Exploration".to_string(),
            step_type: StepType::Exploration,
            triggers: vec![
                Trigger::ToolUsage(tools(&["Glob", "Grep", "WebSearch", "WebFetch"])),
                regex_trigger(r"(?i)search|find|explore|browse|discover"),
            ],
            validators: vec![],
            priority: 70,
            confidence: 0.80,
        },
        Pattern {
            id: "analysis".to_string(),
            name: "Analysis".to_string(),
            step_type: StepType::Analysis,
            triggers: vec![
                Trigger::ToolUsage(tools(&["Read"])),
                regex_trigger(r"(?i)analyze|review|understand|examine|inspect"),
            ],
            validators: vec![],
            priority: 60,
            confidence: 0.75,
        },
        Pattern {
            id: "communication".to_string(),
            name: "Communication".to_string(),
            step_type: StepType::Communication,
            triggers: vec![regex_trigger(r"(?i)explain|describe|tell|show|help")],
            validators: vec![Validator::ToolCount { min: None, max: Some(0) }],
            priority: 30,
            confidence: 0.60,
        },
    ]
}

#[cfg(test)]
#[path = "pattern_lib_tests.rs"]
mod tests;
