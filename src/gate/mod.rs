//! Reconstruction gate.
//!
//! Decides whether a candidate answer is grounded enough to be asserted as
//! belief or must be emitted as low-trust speech. Factual answers face the
//! strictest thresholds, conversational the loosest.

use crate::config::GateConfig;

/// Predicted kind of the candidate answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// States a fact about the user or the world.
    Factual,
    /// Explains or elaborates.
    Explanatory,
    /// Greeting, acknowledgement, small talk.
    Conversational,
}

impl AnswerKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Explanatory => "explanatory",
            Self::Conversational => "conversational",
        }
    }
}

/// Severity of open contradictions relative to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContradictionSeverity {
    /// No open contradictions.
    None,
    /// Open contradictions exist but none affect the queried slots.
    Note,
    /// An open contradiction affects a queried slot.
    Blocking,
}

/// Inputs to one gate evaluation.
#[derive(Debug, Clone)]
pub struct GateInput {
    /// Reasoner confidence that the answer addresses the intent.
    pub intent_align: f64,
    /// Similarity between the answer and the retrieved memories.
    pub memory_align: f64,
    /// Predicted answer kind.
    pub answer_kind: AnswerKind,
    /// Grounding score of the answer against retrieved memories.
    pub grounding_score: f64,
    /// Contradiction severity for the queried slots.
    pub severity: ContradictionSeverity,
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone)]
pub struct GateDecision {
    /// Whether the answer may be asserted as belief.
    pub passed: bool,
    /// Reason code (`pass`, `contradiction_blocking`, `grounding_fail`,
    /// `memory_fail`, `intent_fail`).
    pub reason: &'static str,
}

/// Reconstruction gate with configured thresholds.
#[derive(Debug, Clone)]
pub struct ReconstructionGate {
    config: GateConfig,
}

impl ReconstructionGate {
    /// Creates the gate from configuration.
    #[must_use]
    pub const fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Evaluates the gate policy in order: blocking contradiction,
    /// grounding, memory alignment, intent alignment.
    #[must_use]
    pub fn evaluate(&self, input: &GateInput) -> GateDecision {
        let decision = self.evaluate_inner(input);
        if !decision.passed {
            metrics::counter!("gate_failures_total", "reason" => decision.reason).increment(1);
            tracing::debug!(
                reason = decision.reason,
                grounding = input.grounding_score,
                memory = input.memory_align,
                intent = input.intent_align,
                "gate failed"
            );
        }
        decision
    }

    fn evaluate_inner(&self, input: &GateInput) -> GateDecision {
        if input.severity == ContradictionSeverity::Blocking {
            return GateDecision {
                passed: false,
                reason: "contradiction_blocking",
            };
        }
        let grounding_threshold = match input.answer_kind {
            AnswerKind::Factual => self.config.grounding_factual,
            AnswerKind::Explanatory => self.config.grounding_explanatory,
            AnswerKind::Conversational => self.config.grounding_conversational,
        };
        if input.grounding_score < grounding_threshold {
            return GateDecision {
                passed: false,
                reason: "grounding_fail",
            };
        }
        let memory_threshold = match input.answer_kind {
            AnswerKind::Factual => self.config.memory_factual,
            AnswerKind::Explanatory => self.config.memory_explanatory,
            AnswerKind::Conversational => self.config.memory_conversational,
        };
        if input.memory_align < memory_threshold {
            return GateDecision {
                passed: false,
                reason: "memory_fail",
            };
        }
        if input.intent_align < self.config.intent_threshold {
            return GateDecision {
                passed: false,
                reason: "intent_fail",
            };
        }
        GateDecision {
            passed: true,
            reason: "pass",
        }
    }

    /// Calibrates the raw reasoner confidence against the gate outcome.
    ///
    /// Hard failures (blocking contradiction, grounding) cap at the hard
    /// cap; soft failures (memory, intent) at the soft cap; passing answers
    /// are damped by 0.7 so raw reasoner optimism never reaches the caller
    /// unscaled.
    #[must_use]
    pub fn calibrate_confidence(&self, raw: f64, decision: &GateDecision) -> f64 {
        if decision.passed {
            return (raw * 0.7).clamp(0.0, 1.0);
        }
        match decision.reason {
            "contradiction_blocking" | "grounding_fail" => raw.min(self.config.hard_fail_cap),
            _ => raw.min(self.config.soft_fail_cap),
        }
    }
}
