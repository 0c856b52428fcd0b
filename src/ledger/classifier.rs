//! Contradiction classification from fact topology.
//!
//! The classifier only labels claim pairs; it never resolves them.
//! REFINEMENT and TEMPORAL labels are recorded without reducing trust of
//! the older memory; CONFLICT and REVISION may.

use crate::crt;
use crate::facts;
use crate::models::ContradictionType;

/// Revision markers in the newer text.
const REVISION_KEYWORDS: &[&str] = &["actually", "correction", "i meant", "not ", "wrong", "mistake"];

/// Qualifiers suggesting the newer text narrows the older one.
const REFINEMENT_QUALIFIERS: &[&str] = &["specifically", "more precisely", "actually in", "in the"];

/// Temporal progression markers.
const TEMPORAL_MARKERS: &[&str] = &[
    "now",
    "currently",
    "recently",
    "just",
    "switched",
    "changed",
    "moved",
    "started",
    "used to",
    "no longer",
    "anymore",
    "these days",
    "at the moment",
    "as of",
    "since then",
    "after that",
    "promoted",
    "became",
    "upgraded",
];

/// Broader-to-specific location pairs treated as refinement, not conflict.
const LOCATION_HIERARCHY: &[(&str, &str)] = &[
    ("seattle metro", "bellevue"),
    ("seattle", "bellevue"),
    ("seattle area", "bellevue"),
    ("bay area", "san francisco"),
    ("bay area", "oakland"),
    ("bay area", "palo alto"),
    ("new york", "brooklyn"),
    ("new york", "manhattan"),
    ("los angeles", "santa monica"),
    // Generic metro -> any specific city is refinement.
    ("metro", ""),
];

/// Seniority ladders treated as temporal progression.
const SENIORITY_PAIRS: &[(&str, &str)] = &[
    ("senior", "principal"),
    ("junior", "senior"),
    ("mid", "senior"),
];

/// Classifies a claim pair as refinement, revision, temporal, or conflict.
///
/// Rules are applied in order; the first match wins:
/// 1. revision markers in the new text
/// 2. containment, location hierarchy, or refinement qualifiers
/// 3. temporal markers or seniority progression
/// 4. embedding similarity in `[0.7, 0.9)` suggests refinement
/// 5. conflict
#[must_use]
pub fn classify_contradiction(
    old_text: &str,
    new_text: &str,
    _drift_mean: f64,
    old_vector: Option<&[f32]>,
    new_vector: Option<&[f32]>,
) -> ContradictionType {
    let old_lower = old_text.to_lowercase();
    let new_lower = new_text.to_lowercase();

    if REVISION_KEYWORDS.iter().any(|kw| new_lower.contains(kw)) {
        return ContradictionType::Revision;
    }

    if old_text.contains(new_text) || new_text.contains(old_text) {
        return ContradictionType::Refinement;
    }

    let old_facts = facts::extract_fact_slots(old_text);
    let new_facts = facts::extract_fact_slots(new_text);
    if let (Some(old_loc), Some(new_loc)) = (old_facts.get("location"), new_facts.get("location")) {
        let old_value = old_loc.normalized.as_str();
        let new_value = new_loc.normalized.as_str();
        for (broad, specific) in LOCATION_HIERARCHY {
            if old_value.contains(broad) && new_value.contains(specific) {
                return ContradictionType::Refinement;
            }
        }
        if REFINEMENT_QUALIFIERS.iter().any(|q| new_lower.contains(q)) {
            return ContradictionType::Refinement;
        }
    }

    if TEMPORAL_MARKERS.iter().any(|m| new_lower.contains(m)) {
        return ContradictionType::Temporal;
    }
    if old_lower.contains("used to") {
        return ContradictionType::Temporal;
    }
    for (lower_rank, higher_rank) in SENIORITY_PAIRS {
        if old_lower.contains(lower_rank) && new_lower.contains(higher_rank) {
            return ContradictionType::Temporal;
        }
    }

    if let (Some(old_vec), Some(new_vec)) = (old_vector, new_vector) {
        let similarity = crt::similarity(old_vec, new_vec);
        if (0.7..0.9).contains(&similarity) {
            return ContradictionType::Refinement;
        }
    }

    ContradictionType::Conflict
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(
        "I work at Microsoft",
        "Actually, I work at Amazon, not Microsoft.",
        ContradictionType::Revision;
        "explicit correction"
    )]
    #[test_case(
        "I work at Microsoft",
        "I meant Google, sorry for the confusion",
        ContradictionType::Revision;
        "i meant marker"
    )]
    #[test_case(
        "I live in Seattle",
        "I live in Seattle near the water",
        ContradictionType::Refinement;
        "containment"
    )]
    #[test_case(
        "I live in Seattle.",
        "I live in the Seattle metro area, specifically in Bellevue.",
        ContradictionType::Refinement;
        "location hierarchy"
    )]
    #[test_case(
        "I am a senior engineer",
        "I was promoted to principal engineer",
        ContradictionType::Temporal;
        "seniority progression"
    )]
    #[test_case(
        "I work at Microsoft",
        "I work at Amazon these days",
        ContradictionType::Temporal;
        "temporal marker"
    )]
    #[test_case(
        "I work at Microsoft as an engineer.",
        "I work at Amazon as an engineer.",
        ContradictionType::Conflict;
        "mutually exclusive employers"
    )]
    fn test_classification(old: &str, new: &str, expected: ContradictionType) {
        assert_eq!(classify_contradiction(old, new, 0.4, None, None), expected);
    }

    #[test]
    fn test_revision_beats_temporal() {
        // "actually" and "now" both present: revision wins by rule order.
        let t = classify_contradiction(
            "I work at Microsoft",
            "Actually I work at Google now",
            0.4,
            None,
            None,
        );
        assert_eq!(t, ContradictionType::Revision);
    }

    #[test]
    fn test_similarity_band_refinement() {
        // Orthogonal-ish base vectors; construct a pair with similarity ~0.8.
        let old = vec![1.0f32, 0.0];
        let angle = 0.8f32.acos();
        let new = vec![angle.cos(), angle.sin()];
        let t = classify_contradiction("alpha beta", "gamma delta", 0.2, Some(&old), Some(&new));
        assert_eq!(t, ContradictionType::Refinement);
    }
}
