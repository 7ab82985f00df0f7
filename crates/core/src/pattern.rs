// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative step-kind patterns.
//!
//! A [`Pattern`] is a value, not a subtype: triggers and validators are a
//! small closed sum type evaluated by the Detector (`oj-engine`'s sibling
//! crate), never a trait object hierarchy. Regexes and tool sets are
//! compiled once, at pattern-set installation, and reused across every
//! `analyze` call.

use crate::message::Message;
use crate::step::StepType;
use regex::Regex;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while constructing a [`Pattern`] or installing a pattern
/// set. These are `config_error`s: fatal, surfaced synchronously at
/// construction.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regex in pattern {pattern}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("pattern {pattern} priority {priority} out of range [0,100]")]
    InvalidPriority { pattern: String, priority: u8 },
    #[error("pattern {pattern} confidence {confidence} out of range [0,1]")]
    InvalidConfidence { pattern: String, confidence: f64 },
    #[error("pattern {pattern} has no triggers")]
    NoTriggers { pattern: String },
}

/// Context a trigger or validator is evaluated against.
pub struct MatchContext<'a> {
    /// The message currently being classified.
    pub message: &'a Message,
    /// Messages accumulated in the current (in-progress) step, if any.
    pub buffer: &'a [Message],
    /// Tool names used so far in the current step, insertion-ordered.
    pub tools_used_so_far: &'a [String],
    /// `message.content`, hoisted for convenience.
    pub content_text: &'a str,
    /// The step type currently in progress, if any.
    pub current_type: Option<StepType>,
}

/// A custom, total, side-effect-free predicate over a [`MatchContext`].
///
/// "Total" is enforced defensively: a panicking closure is caught at the
/// call site and treated as no-match.
pub type CustomPredicate = Arc<dyn Fn(&MatchContext<'_>) -> bool + Send + Sync>;

/// Any-of-semantics trigger: a pattern is *triggered* if at
/// least one of its triggers matches.
#[derive(Clone)]
pub enum Trigger {
    /// Matches the message's textual content against a compiled regex.
    MessageContent(Regex),
    /// Matches if any tool in the set is used by the message.
    ToolUsage(Arc<HashSet<String>>),
    /// Matches if the last `N` message kinds (oldest first) equal this
    /// sequence, where `N = list.len()`.
    MessageSequence(Vec<crate::message::MessageKind>),
    /// Escape hatch; must be total and side-effect-free.
    Custom(CustomPredicate),
}

/// Default per-trigger confidences.
const CONTENT_TRIGGER_CONFIDENCE: f64 = 0.8;
const TOOL_TRIGGER_BASE_CONFIDENCE: f64 = 0.7;
const SEQUENCE_TRIGGER_CONFIDENCE: f64 = 0.85;
const CUSTOM_TRIGGER_CONFIDENCE: f64 = 0.9;

/// Outcome of evaluating a single trigger: whether it matched, and at what
/// confidence (tool-usage triggers scale with the fraction of the set that
/// actually matched).
struct TriggerHit {
    confidence: f64,
}

impl Trigger {
    fn evaluate(&self, ctx: &MatchContext<'_>) -> Option<TriggerHit> {
        match self {
            Trigger::MessageContent(re) => re.is_match(ctx.content_text).then_some(TriggerHit {
                confidence: CONTENT_TRIGGER_CONFIDENCE,
            }),
            Trigger::ToolUsage(set) => {
                let used = message_tool_set(ctx.message);
                let matched = used.intersection(set.as_ref()).count();
                if matched == 0 {
                    return None;
                }
                let fraction = matched as f64 / set.len().max(1) as f64;
                Some(TriggerHit {
                    confidence: (TOOL_TRIGGER_BASE_CONFIDENCE + 0.25 * fraction).min(1.0),
                })
            }
            Trigger::MessageSequence(list) => {
                if list.is_empty() || ctx.buffer.len() + 1 < list.len() {
                    return None;
                }
                let mut window: Vec<crate::message::MessageKind> = ctx
                    .buffer
                    .iter()
                    .rev()
                    .take(list.len().saturating_sub(1))
                    .map(|m| m.kind)
                    .collect();
                window.reverse();
                window.push(ctx.message.kind);
                (window == *list).then_some(TriggerHit {
                    confidence: SEQUENCE_TRIGGER_CONFIDENCE,
                })
            }
            Trigger::Custom(predicate) => {
                let matched = catch_unwind(AssertUnwindSafe(|| predicate(ctx))).unwrap_or_else(|_| {
                    tracing::warn!("custom trigger panicked; treating as no-match");
                    false
                });
                matched.then_some(TriggerHit {
                    confidence: CUSTOM_TRIGGER_CONFIDENCE,
                })
            }
        }
    }
}

fn message_tool_set(message: &Message) -> HashSet<String> {
    message.tool_names().into_iter().collect()
}

/// All-of-semantics validator: a pattern *validates* iff every
/// validator accepts. An empty validator list validates trivially.
#[derive(Clone)]
pub enum Validator {
    ContentRegex(Regex),
    ToolCount { min: Option<usize>, max: Option<usize> },
    MessageCount { min: Option<usize>, max: Option<usize> },
    Custom(CustomPredicate),
}

const CONTENT_VALIDATOR_CONFIDENCE: f64 = 0.8;
const TOOL_COUNT_VALIDATOR_CONFIDENCE: f64 = 0.75;
const MESSAGE_COUNT_VALIDATOR_CONFIDENCE: f64 = 0.7;
const CUSTOM_VALIDATOR_CONFIDENCE: f64 = 0.9;

impl Validator {
    fn evaluate(&self, ctx: &MatchContext<'_>) -> Option<f64> {
        match self {
            Validator::ContentRegex(re) => {
                re.is_match(ctx.content_text).then_some(CONTENT_VALIDATOR_CONFIDENCE)
            }
            Validator::ToolCount { min, max } => {
                let count = ctx.tools_used_so_far.len();
                in_range(count, *min, *max).then_some(TOOL_COUNT_VALIDATOR_CONFIDENCE)
            }
            Validator::MessageCount { min, max } => {
                let count = ctx.buffer.len() + 1;
                in_range(count, *min, *max).then_some(MESSAGE_COUNT_VALIDATOR_CONFIDENCE)
            }
            Validator::Custom(predicate) => {
                let matched = catch_unwind(AssertUnwindSafe(|| predicate(ctx))).unwrap_or_else(|_| {
                    tracing::warn!("custom validator panicked; treating as no-match");
                    false
                });
                matched.then_some(CUSTOM_VALIDATOR_CONFIDENCE)
            }
        }
    }
}

fn in_range(value: usize, min: Option<usize>, max: Option<usize>) -> bool {
    min.map(|m| value >= m).unwrap_or(true) && max.map(|m| value <= m).unwrap_or(true)
}

/// A declarative description of a step kind and how messages match it.
#[derive(Clone)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    /// The step type this pattern produces when it wins.
    pub step_type: StepType,
    pub triggers: Vec<Trigger>,
    pub validators: Vec<Validator>,
    pub priority: u8,
    pub confidence: f64,
}

/// The outcome of matching a [`Pattern`] against a [`MatchContext`].
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub step_type: StepType,
    pub priority: u8,
    pub match_confidence: f64,
}

impl Pattern {
    /// Validate construction-time invariants.
    pub fn validate(&self) -> Result<(), PatternError> {
        if self.triggers.is_empty() {
            return Err(PatternError::NoTriggers {
                pattern: self.id.clone(),
            });
        }
        if self.priority > 100 {
            return Err(PatternError::InvalidPriority {
                pattern: self.id.clone(),
                priority: self.priority,
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(PatternError::InvalidConfidence {
                pattern: self.id.clone(),
                confidence: self.confidence,
            });
        }
        Ok(())
    }

    /// Evaluate this pattern against a context: `match_confidence =
    /// min(0.7*trigger_confidence + 0.3*validator_confidence, 1.0) *
    /// pattern.confidence`, clamped again to `1.0`.
    pub fn evaluate(&self, ctx: &MatchContext<'_>) -> Option<PatternMatch> {
        let hits: Vec<f64> = self
            .triggers
            .iter()
            .filter_map(|t| t.evaluate(ctx).map(|h| h.confidence))
            .collect();
        if hits.is_empty() {
            return None;
        }
        let trigger_confidence = mean(&hits);

        let validator_confidences: Option<Vec<f64>> = if self.validators.is_empty() {
            Some(Vec::new())
        } else {
            self.validators
                .iter()
                .map(|v| v.evaluate(ctx))
                .collect::<Option<Vec<_>>>()
        };
        let Some(validator_confidences) = validator_confidences else {
            // Not all validators accepted: pattern does not validate.
            return None;
        };
        let validator_confidence = if validator_confidences.is_empty() {
            1.0
        } else {
            mean(&validator_confidences)
        };

        let combined = 0.7 * trigger_confidence + 0.3 * validator_confidence;
        let match_confidence = (combined * self.confidence).min(1.0);

        Some(PatternMatch {
            pattern_id: self.id.clone(),
            step_type: self.step_type,
            priority: self.priority,
            match_confidence,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pick the winning match among candidates that cleared
/// `confidence_threshold`: ties broken by priority desc, then confidence
/// desc.
pub fn select_winner(mut matches: Vec<PatternMatch>, confidence_threshold: f64) -> Option<PatternMatch> {
    matches.retain(|m| m.match_confidence >= confidence_threshold);
    matches.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.match_confidence.total_cmp(&a.match_confidence))
    });
    matches.into_iter().next()
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
