//! Structured per-turn query result.

use super::MemorySource;
use serde::{Deserialize, Serialize};

/// What kind of response a turn produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Gate-passing answer stored as a durable SYSTEM belief.
    Belief,
    /// Low-trust answer stored as FALLBACK speech.
    Speech,
    /// Both sides of an unresolved hard conflict, plus a clarifying question.
    Uncertainty,
    /// Deterministic explanation (safe paths, inventories, status views).
    Explanation,
}

impl ResponseType {
    /// Returns the type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Belief => "belief",
            Self::Speech => "speech",
            Self::Uncertainty => "uncertainty",
            Self::Explanation => "explanation",
        }
    }
}

/// A retrieved memory as surfaced in a query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    /// Memory id.
    pub memory_id: String,
    /// Memory text.
    pub text: String,
    /// Provenance.
    pub source: MemorySource,
    /// Trust at retrieval time.
    pub trust: f64,
    /// Confidence at storage time.
    pub confidence: f64,
    /// Retrieval score.
    pub score: f64,
    /// True when the memory is referenced by at least one open
    /// contradiction entry.
    pub reintroduced_claim: bool,
}

/// The structured result of one orchestrated turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The answer text (caveats already attached where required).
    pub answer: String,
    /// Belief, speech, uncertainty, or explanation.
    pub response_type: ResponseType,
    /// Whether the reconstruction gate passed.
    pub gates_passed: bool,
    /// Reason code for the gate decision or degradation.
    pub gate_reason: String,
    /// Intent alignment in `[0, 1]`.
    pub intent_alignment: f64,
    /// Memory alignment in `[0, 1]`.
    pub memory_alignment: f64,
    /// Calibrated confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether this turn recorded a new contradiction.
    pub contradiction_detected: bool,
    /// Whether a contradiction was resolved (assertively or explicitly).
    pub contradiction_resolved: bool,
    /// Open ledger entries after the turn.
    pub unresolved_contradictions_total: usize,
    /// Open hard conflicts after the turn.
    pub unresolved_hard_conflicts: usize,
    /// Memories retrieved for this turn.
    pub retrieved_memories: Vec<RetrievedMemory>,
    /// Resolved FACT lines given to the reasoner.
    pub prompt_memories: Vec<String>,
    /// How many retrieved memories are under open contradictions.
    pub reintroduced_claims_count: usize,
    /// Session identifier.
    pub session_id: String,
}

impl QueryResult {
    /// A degraded speech result carrying a reason code.
    #[must_use]
    pub fn degraded(answer: impl Into<String>, gate_reason: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            response_type: ResponseType::Speech,
            gates_passed: false,
            gate_reason: gate_reason.into(),
            intent_alignment: 0.0,
            memory_alignment: 0.0,
            confidence: 0.3,
            contradiction_detected: false,
            contradiction_resolved: false,
            unresolved_contradictions_total: 0,
            unresolved_hard_conflicts: 0,
            retrieved_memories: Vec::new(),
            prompt_memories: Vec::new(),
            reintroduced_claims_count: 0,
            session_id: session_id.into(),
        }
    }
}
