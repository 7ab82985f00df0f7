// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turns each incoming message into a boundary decision: start a new Step,
//! continue the current one, end it on this message, or finalize the
//! current Step and start a new one in its place.

use std::collections::{HashMap, VecDeque};
use stepwise_core::{select_winner, MatchContext, Message, MessageKind, MetadataValue, Pattern, StepType};

/// Annotations a decision carries alongside its Step-boundary meaning, e.g.
/// which pattern won and at what confidence.
pub type Metadata = HashMap<String, MetadataValue>;

/// What a message implies for step boundaries, mirroring the Detector's
/// pull contract: the Buffer applies each variant without needing to know
/// which strategy produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Begin a new Step of this type; no Step was in progress.
    StepStart(StepType, Metadata),
    /// Fold this message into the currently open Step.
    StepContinue,
    /// This message is the last member of the currently open Step; finalize
    /// it with `completed` status.
    StepEnd(Metadata),
    /// Finalize the currently open Step *before* appending this message,
    /// then begin a new Step of `type` seeded with it.
    StepBoundary(StepType, Metadata),
}

/// Which detection strategy a [`Detector`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStrategy {
    /// Score every pattern and pick the highest-priority match above
    /// threshold; `step_continue` if none qualifies.
    PatternBased,
    /// Scan content for completion cues, else infer a type from the tools
    /// used so far; `step_continue` if neither applies.
    Heuristic,
    /// Pattern-based first; if it yields `step_continue`, prefer a
    /// non-continue heuristic result.
    Hybrid,
}

const COMPLETION_CUE_PATTERN: &str = r"(?i)\b(completed|finished|done|successfully|ready)\b";

/// Stateful wrapper around the pattern vocabulary: tracks the step type
/// currently in progress and a short rolling history of recent decisions.
/// Regexes and tool sets in the pattern vocabulary are compiled once, at
/// construction, and reused across every `analyze` call.
pub struct Detector {
    patterns: Vec<Pattern>,
    strategy: DetectionStrategy,
    confidence_threshold: f64,
    completion_cue: regex::Regex,
    max_history: usize,
    current_type: Option<StepType>,
    history: VecDeque<Decision>,
}

impl Detector {
    pub fn new(patterns: Vec<Pattern>, strategy: DetectionStrategy, confidence_threshold: f64, max_history: usize) -> Self {
        Self {
            patterns,
            strategy,
            confidence_threshold,
            #[allow(clippy::unwrap_used)]
            completion_cue: regex::Regex::new(COMPLETION_CUE_PATTERN).unwrap(),
            max_history: max_history.max(1),
            current_type: None,
            history: VecDeque::new(),
        }
    }

    pub fn current_type(&self) -> Option<StepType> {
        self.current_type
    }

    pub fn decision_history(&self) -> impl Iterator<Item = &Decision> {
        self.history.iter()
    }

    /// Classify `message` given the messages already buffered into the
    /// in-progress step (oldest first) and the tools used so far.
    pub fn analyze(&mut self, message: &Message, buffer: &[Message], tools_used_so_far: &[String]) -> Decision {
        let decision = match self.strategy {
            DetectionStrategy::PatternBased => self.analyze_pattern_based(message, buffer, tools_used_so_far),
            DetectionStrategy::Heuristic => self.analyze_heuristic(message, tools_used_so_far),
            DetectionStrategy::Hybrid => {
                let pattern_decision = self.analyze_pattern_based(message, buffer, tools_used_so_far);
                if pattern_decision == Decision::StepContinue {
                    self.analyze_heuristic(message, tools_used_so_far)
                } else {
                    pattern_decision
                }
            }
        };

        self.observe(&decision);
        decision
    }

    /// Apply the bookkeeping `analyze` performs after reaching a decision
    /// (current-type tracking, decision history), without re-running the
    /// strategies. Lets [`crate::optimizer::OptimizingDetector`] replay a
    /// cached decision's state effects without recomputing it.
    pub fn observe(&mut self, decision: &Decision) {
        match decision {
            Decision::StepStart(step_type, _) | Decision::StepBoundary(step_type, _) => {
                self.current_type = Some(*step_type);
            }
            Decision::StepEnd(_) => self.current_type = None,
            Decision::StepContinue => {}
        }
        self.push_history(decision.clone());
    }

    /// Reset boundary state, e.g. after the Buffer force-flushes on timeout
    /// or resource error, so the next message starts a fresh Step.
    pub fn reset(&mut self) {
        self.current_type = None;
    }

    fn analyze_pattern_based(&self, message: &Message, buffer: &[Message], tools_used_so_far: &[String]) -> Decision {
        let ctx = MatchContext {
            message,
            buffer,
            tools_used_so_far,
            content_text: message.content.as_str(),
            current_type: self.current_type,
        };
        let matches = self.patterns.iter().filter_map(|p| p.evaluate(&ctx)).collect::<Vec<_>>();
        match select_winner(matches, self.confidence_threshold) {
            Some(winner) => {
                let mut meta = Metadata::new();
                meta.insert("pattern_id".to_string(), MetadataValue::from(winner.pattern_id));
                meta.insert("match_confidence".to_string(), MetadataValue::from(winner.match_confidence));
                self.transition(winner.step_type, meta)
            }
            None => Decision::StepContinue,
        }
    }

    fn analyze_heuristic(&self, message: &Message, tools_used_so_far: &[String]) -> Decision {
        if self.current_type.is_some() && self.completion_cue.is_match(&message.content) {
            let mut meta = Metadata::new();
            meta.insert("completion_cue".to_string(), MetadataValue::from(true));
            return Decision::StepEnd(meta);
        }
        match heuristic_step_type(message, tools_used_so_far) {
            Some(candidate) => self.transition(candidate, Metadata::new()),
            None => Decision::StepContinue,
        }
    }

    fn transition(&self, candidate: StepType, meta: Metadata) -> Decision {
        match self.current_type {
            None => Decision::StepStart(candidate, meta),
            Some(current) if current == candidate => Decision::StepContinue,
            Some(_) => Decision::StepBoundary(candidate, meta),
        }
    }

    fn push_history(&mut self, decision: Decision) {
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(decision);
    }
}

/// Coarse type guess used by the heuristic strategy (and as the tie-break
/// for a message whose tools span more than one step type): two or more
/// distinct read/search tools imply exploration; a single read tool with no
/// search tool implies analysis.
fn heuristic_step_type(message: &Message, tools_used_so_far: &[String]) -> Option<StepType> {
    const READ_TOOLS: &[&str] = &["Read", "NotebookRead"];
    const SEARCH_TOOLS: &[&str] = &["Glob", "Grep", "WebSearch", "WebFetch"];
    const WRITE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];
    const SHELL_TOOLS: &[&str] = &["Bash", "BashOutput", "KillShell"];

    let names: Vec<String> = message.tool_names().into_iter().chain(tools_used_so_far.iter().cloned()).collect();
    if names.is_empty() {
        return match message.kind {
            MessageKind::Assistant | MessageKind::User => Some(StepType::Communication),
            _ => None,
        };
    }

    let distinct_read_search = names
        .iter()
        .filter(|n| READ_TOOLS.contains(&n.as_str()) || SEARCH_TOOLS.contains(&n.as_str()))
        .collect::<std::collections::HashSet<_>>()
        .len();

    if names.iter().any(|n| WRITE_TOOLS.contains(&n.as_str())) {
        return Some(StepType::FileOperation);
    }
    if names.iter().any(|n| SHELL_TOOLS.contains(&n.as_str())) {
        return Some(StepType::SystemCommand);
    }
    if distinct_read_search >= 2 {
        return Some(StepType::Exploration);
    }
    if names.iter().any(|n| READ_TOOLS.contains(&n.as_str())) {
        return Some(StepType::Analysis);
    }
    if names.iter().any(|n| SEARCH_TOOLS.contains(&n.as_str())) {
        return Some(StepType::Exploration);
    }
    None
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
