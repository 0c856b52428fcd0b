//! Memory types and provenance enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance of a stored claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// Direct user utterance.
    User,
    /// Agent-generated belief that passed the reconstruction gate.
    System,
    /// Low-trust speech that did not pass the gate (kept for audit).
    Fallback,
    /// Merged belief produced by reflection.
    Reflection,
    /// Tool or research result with citations.
    External,
}

impl MemorySource {
    /// Returns the source as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Fallback => "fallback",
            Self::Reflection => "reflection",
            Self::External => "external",
        }
    }

    /// Parses a source from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Self::User),
            "system" => Some(Self::System),
            "fallback" => Some(Self::Fallback),
            "reflection" => Some(Self::Reflection),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a claim must be preserved verbatim or may be paraphrased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SseMode {
    /// Identity-critical: never paraphrased.
    Lossless,
    /// Paraphrasable context.
    #[default]
    Lossy,
}

impl SseMode {
    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lossless => "lossless",
            Self::Lossy => "lossy",
        }
    }

    /// Parses a mode from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lossless" => Some(Self::Lossless),
            "lossy" => Some(Self::Lossy),
            _ => None,
        }
    }
}

/// Temporal status of a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalStatus {
    /// Currently true.
    #[default]
    Active,
    /// Was true, no longer.
    Past,
    /// Expected to become true.
    Future,
    /// Conditional or speculative.
    Hypothetical,
}

impl TemporalStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Past => "past",
            Self::Future => "future",
            Self::Hypothetical => "hypothetical",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "past" => Some(Self::Past),
            "future" => Some(Self::Future),
            "hypothetical" => Some(Self::Hypothetical),
            _ => None,
        }
    }
}

/// A durable trust-weighted claim.
///
/// Once created, `text`, `vector`, `source`, and `timestamp` are immutable;
/// the store exposes no update path for them. Only `trust`, `deprecated`,
/// `tags`, and derived flags change over a memory's life. A deprecated
/// memory is retained and auditable; it is never deleted.
#[derive(Debug, Clone)]
pub struct MemoryItem {
    /// Opaque unique identifier (`mem_<uuid>`).
    pub memory_id: String,
    /// Dense embedding of `text` (unit-normalized, fixed dimension).
    pub vector: Vec<f32>,
    /// Verbatim claim text.
    pub text: String,
    /// Creation time, epoch seconds (monotonic per store).
    pub timestamp: f64,
    /// Per-claim assertion strength in `[0, 1]`.
    pub confidence: f64,
    /// Evolving trust in `[0, 1]`.
    pub trust: f64,
    /// Provenance.
    pub source: MemorySource,
    /// Verbatim-preservation mode.
    pub sse_mode: SseMode,
    /// Owning conversation thread, if any.
    pub thread_id: Option<String>,
    /// Free-form provenance map (`provenance.tool`, `provenance.citations`, ...).
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
    /// Soft-retirement flag; deprecated memories stay auditable.
    pub deprecated: bool,
    /// Why the memory was deprecated.
    pub deprecation_reason: Option<String>,
    /// Free-form tags (e.g. `resolved_both_valid`).
    pub tags: Vec<String>,
    /// Temporal status of the claim.
    pub temporal_status: TemporalStatus,
    /// Domains the claim belongs to (e.g. `programming`, `general`).
    pub domains: Vec<String>,
}

impl MemoryItem {
    /// Returns the domains, defaulting to `general` when untagged.
    #[must_use]
    pub fn domains_or_general(&self) -> Vec<String> {
        if self.domains.is_empty() {
            vec!["general".to_string()]
        } else {
            self.domains.clone()
        }
    }
}

/// Append-only record of a single trust delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustLogEntry {
    /// The memory whose trust changed.
    pub memory_id: String,
    /// Trust before the change.
    pub old_trust: f64,
    /// Trust after the change.
    pub new_trust: f64,
    /// Why the trust changed.
    pub reason: String,
    /// When the change happened, epoch seconds.
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trip() {
        for source in [
            MemorySource::User,
            MemorySource::System,
            MemorySource::Fallback,
            MemorySource::Reflection,
            MemorySource::External,
        ] {
            assert_eq!(MemorySource::parse(source.as_str()), Some(source));
        }
        assert_eq!(MemorySource::parse("bogus"), None);
    }

    #[test]
    fn test_temporal_status_round_trip() {
        for status in [
            TemporalStatus::Active,
            TemporalStatus::Past,
            TemporalStatus::Future,
            TemporalStatus::Hypothetical,
        ] {
            assert_eq!(TemporalStatus::parse(status.as_str()), Some(status));
        }
    }
}
