//! Extracted fact tuples.

use super::TemporalStatus;
use serde::{Deserialize, Serialize};

/// A fact extracted from utterance text.
///
/// Tier A facts carry a slot from the closed canonical set; Tier B open
/// tuples reuse the same shape with the attribute name as the slot.
/// Normalization is stable: "San Francisco", "SF", and "san francisco" all
/// normalize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// Canonical slot name (or open attribute name for Tier B).
    pub slot: String,
    /// Value exactly as written.
    pub raw_value: String,
    /// Stable normalized value used for comparisons.
    pub normalized: String,
    /// Temporal status inferred from the surrounding text.
    pub temporal_status: TemporalStatus,
    /// Domains inferred from the surrounding text.
    pub domains: Vec<String>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f64,
}

impl ExtractedFact {
    /// Creates a Tier A fact with active status and general domain.
    #[must_use]
    pub fn new(slot: impl Into<String>, raw: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            raw_value: raw.into(),
            normalized: normalized.into(),
            temporal_status: TemporalStatus::Active,
            domains: vec!["general".to_string()],
            confidence: 0.9,
        }
    }
}
