// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline's input type: a single parsed message from the assistant
//! process's line-delimited JSON transport.
//!
//! The transport itself (stdin/stdout plumbing, JSON framing, CLI option
//! assembly) is out of scope; the pipeline only ever sees already
//! parsed [`Message`] values in arrival order.

use serde::{Deserialize, Serialize};

/// The kind of record the assistant process emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    System,
    User,
    Assistant,
    ToolResult,
    Result,
}

/// A single structured content entry within a message, as produced by
/// assistants that encode tool use as tagged content blocks rather than
/// textual markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { name: String },
    ToolResult { tool_use_id: Option<String> },
}

/// A message consumed by the Step pipeline.
///
/// Opaque except for the fields the Detector and Buffer need: `kind` drives
/// sequence-based triggers, `content` drives regex/tool-name extraction, and
/// `session_id`/`timestamp` are carried through onto emitted Steps for
/// downstream bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub session_id: String,
    pub content: String,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    /// Construct a message with only the fields most call sites need.
    pub fn new(kind: MessageKind, session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            content: content.into(),
            content_blocks: Vec::new(),
            timestamp: None,
        }
    }

    /// Attach structured content blocks (builder style).
    pub fn with_blocks(mut self, blocks: Vec<ContentBlock>) -> Self {
        self.content_blocks = blocks;
        self
    }

    /// Attach a timestamp (builder style).
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// The set of tool names this message mentions, whether encoded as
    /// structured `tool_use` content blocks or as textual markers of the
    /// form `tool_use(Name, ...)` / `tool:Name` embedded in `content`.
    ///
    /// Order is insertion order as they appear in the message; callers that
    /// need a set should dedupe themselves (the Step's `tools_used` does,
    /// see [`crate::step::Step::recompute_tools_used`]).
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .content_blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { name } => Some(name.clone()),
                _ => None,
            })
            .collect();
        names.extend(extract_textual_tool_markers(&self.content));
        names
    }
}

/// Parse textual tool-use markers embedded in assistant content, of the
/// form `tool_use(Name, ...)` or `tool_use(Name)`.
fn extract_textual_tool_markers(content: &str) -> Vec<String> {
    let mut names = Vec::new();
    let marker = "tool_use(";
    let mut rest = content;
    while let Some(start) = rest.find(marker) {
        let after = &rest[start + marker.len()..];
        let end = after.find([',', ')']).unwrap_or(after.len());
        let name = after[..end].trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
        rest = &after[end..];
    }
    names
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
