// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn builtin_patterns_are_individually_valid() {
    for pattern in builtin_patterns() {
        pattern.validate().unwrap_or_else(|e| panic!("{}: {e}", pattern.id));
    }
}

#[test]
fn builtin_patterns_cover_every_step_type_but_unknown() {
    let types: HashSet<StepType> = builtin_patterns().into_iter().map(|p| p.step_type).collect();
    for expected in [
        StepType::FileOperation,
        StepType::CodeModification,
        StepType::SystemCommand,
        StepType::Exploration,
        StepType::Analysis,
        StepType::Communication,
    ] {
        assert!(types.contains(&expected), "missing pattern for {expected}");
    }
    assert!(!types.contains(&StepType::Unknown));
}

#[test]
fn builtin_patterns_are_ordered_by_descending_priority() {
    let priorities: Vec<u8> = builtin_patterns().into_iter().map(|p| p.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(priorities, sorted);
}

#[test]
fn code_modification_tool_set_is_not_fully_shadowed_by_file_operation() {
    // file_operation outranks code_modification on priority (90 vs 85), so
    // code_modification's tool set must not be a *subset* of
    // file_operation's — any tool exclusive to code_modification (e.g.
    // `Edit`/`MultiEdit`) must remain reachable as a pattern-based winner.
    let patterns = builtin_patterns();
    let tool_set = |id: &str| {
        patterns
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.triggers.iter().find_map(|t| match t {
                Trigger::ToolUsage(set) => Some(set.clone()),
                _ => None,
            }))
            .unwrap_or_else(|| panic!("{id}: no ToolUsage trigger"))
    };
    let file_op_tools = tool_set("file_operation");
    let code_mod_tools = tool_set("code_modification");
    assert!(
        !code_mod_tools.is_subset(&file_op_tools),
        "code_modification's tool set {code_mod_tools:?} is fully shadowed by file_operation's {file_op_tools:?}"
    );
}
