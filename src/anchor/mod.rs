//! Clarification prompt generation and answer parsing.
//!
//! The anchor preserves a contradiction's semantic context across the
//! retrieval, generation, and parsing steps, so a user's clarification
//! answer can be parsed back into a grounded resolution decision.

use crate::models::{
    ContradictionStatus, ContradictionType, ExpectedAnswerType, ResolutionDecision,
    ResolutionMethod, SemanticAnchor,
};

/// Truncation bound when quoting memory texts inside a prompt.
const QUOTE_LIMIT: usize = 100;

fn quoted(text: &str) -> &str {
    text.char_indices()
        .nth(QUOTE_LIMIT)
        .map_or(text, |(idx, _)| &text[..idx])
}

/// Generates a type-aware clarification question for an anchor.
///
/// The phrasing depends on the contradiction type: refinements ask whether
/// both are correct, revisions ask which one is, temporal asks whether the
/// situation changed, and conflicts state the mutual exclusion.
#[must_use]
pub fn generate_clarification_prompt(anchor: &SemanticAnchor) -> String {
    let slot_bound = anchor.slot_name.as_deref().zip(
        anchor
            .old_value
            .as_deref()
            .zip(anchor.new_value.as_deref()),
    );

    match anchor.contradiction_type {
        ContradictionType::Refinement => slot_bound.map_or_else(
            || {
                format!(
                    "You said '{}' before, and now '{}'. Is the newer statement more specific, or did something change?",
                    quoted(&anchor.old_text),
                    quoted(&anchor.new_text)
                )
            },
            |(slot, (old, new))| {
                format!(
                    "I have two values for {slot}: '{old}' and '{new}'. Did you mean to be more specific, or are both correct?"
                )
            },
        ),
        ContradictionType::Revision => slot_bound.map_or_else(
            || {
                format!(
                    "You said '{}' before, but now '{}'. Which one should I remember?",
                    quoted(&anchor.old_text),
                    quoted(&anchor.new_text)
                )
            },
            |(slot, (old, new))| {
                format!("You told me {slot} = '{old}', but now you said '{new}'. Which is correct?")
            },
        ),
        ContradictionType::Temporal => slot_bound.map_or_else(
            || {
                format!(
                    "Earlier you said '{}', now '{}'. Did this change over time, or are both true at different moments?",
                    quoted(&anchor.old_text),
                    quoted(&anchor.new_text)
                )
            },
            |(slot, (old, new))| {
                format!(
                    "I have {slot} = '{old}' from earlier, and now '{new}'. Did the situation change over time, or which is current?"
                )
            },
        ),
        ContradictionType::Conflict => slot_bound.map_or_else(
            || {
                format!(
                    "You said '{}' before, but now '{}'. These contradict - which should I trust?",
                    quoted(&anchor.old_text),
                    quoted(&anchor.new_text)
                )
            },
            |(slot, (old, new))| {
                format!(
                    "I have conflicting values for {slot}: '{old}' vs '{new}'. These can't both be true - which is correct?"
                )
            },
        ),
    }
}

/// Old-side reference phrases.
const OLD_PATTERNS: &[&str] = &[
    "the first",
    "the old",
    "the earlier",
    "before",
    "previously",
    "original",
    "initially",
];

/// New-side reference phrases.
const NEW_PATTERNS: &[&str] = &[
    "the new",
    "the second",
    "the later",
    "now",
    "current",
    "latest",
    "actually",
    "correction",
];

/// Both-true phrases.
const BOTH_PATTERNS: &[&str] = &[
    "both",
    "both true",
    "different times",
    "changed",
    "it changed",
    "changed over time",
    "evolved",
    "progressed",
];

/// Both-wrong phrases.
const NEITHER_PATTERNS: &[&str] = &[
    "neither",
    "wrong",
    "mistake",
    "incorrect",
    "both wrong",
    "not right",
];

/// Ordinal references to the first option.
const ORDINAL_FIRST: &[&str] = &["1)", "number 1", "first one", "option 1", "statement 1"];

/// Ordinal references to the second option.
const ORDINAL_SECOND: &[&str] = &["2)", "number 2", "second one", "option 2", "statement 2"];

/// Parses the user's clarification answer into a resolution decision.
///
/// Keyword families are checked in order (old-side, new-side, both-true,
/// both-wrong, ordinals); slot-based anchors additionally try to extract
/// the old or new value verbatim from the answer.
#[must_use]
pub fn parse_user_answer(anchor: &SemanticAnchor, answer_text: &str) -> ResolutionDecision {
    let answer_lower = answer_text.to_lowercase();
    let answer_lower = answer_lower.trim();

    let mut decision = ResolutionDecision {
        resolution_method: ResolutionMethod::UserClarified,
        chosen_memory_id: None,
        new_status: ContradictionStatus::Resolved,
        confidence: 0.5,
        parsed_value: None,
    };

    if OLD_PATTERNS.iter().any(|p| answer_lower.contains(p)) {
        decision.resolution_method = ResolutionMethod::UserChoseOld;
        decision.chosen_memory_id = Some(anchor.old_memory_id.clone());
        decision.confidence = 0.8;
    } else if NEW_PATTERNS.iter().any(|p| answer_lower.contains(p)) {
        decision.resolution_method = ResolutionMethod::UserChoseNew;
        decision.chosen_memory_id = Some(anchor.new_memory_id.clone());
        decision.confidence = 0.8;
    } else if BOTH_PATTERNS.iter().any(|p| answer_lower.contains(p)) {
        decision.resolution_method = ResolutionMethod::BothTrueTemporal;
        decision.confidence = 0.7;
    } else if NEITHER_PATTERNS.iter().any(|p| answer_lower.contains(p)) {
        decision.resolution_method = ResolutionMethod::BothWrong;
        decision.confidence = 0.6;
    } else if ORDINAL_FIRST.iter().any(|p| answer_lower.contains(p)) {
        decision.resolution_method = ResolutionMethod::UserChoseOld;
        decision.chosen_memory_id = Some(anchor.old_memory_id.clone());
        decision.confidence = 0.75;
    } else if ORDINAL_SECOND.iter().any(|p| answer_lower.contains(p)) {
        decision.resolution_method = ResolutionMethod::UserChoseNew;
        decision.chosen_memory_id = Some(anchor.new_memory_id.clone());
        decision.confidence = 0.75;
    }

    // Slot-bound anchors: extract the chosen value verbatim if present.
    if anchor.slot_name.is_some() && anchor.expected_answer_type == ExpectedAnswerType::ChooseOne {
        if let Some(old_value) = &anchor.old_value {
            if answer_lower.contains(&old_value.to_lowercase()) {
                decision.parsed_value = Some(old_value.clone());
                decision.confidence = decision.confidence.max(0.75);
                if decision.chosen_memory_id.is_none() {
                    decision.resolution_method = ResolutionMethod::UserChoseOld;
                    decision.chosen_memory_id = Some(anchor.old_memory_id.clone());
                }
            }
        }
        if decision.parsed_value.is_none() {
            if let Some(new_value) = &anchor.new_value {
                if answer_lower.contains(&new_value.to_lowercase()) {
                    decision.parsed_value = Some(new_value.clone());
                    decision.confidence = decision.confidence.max(0.75);
                    if decision.chosen_memory_id.is_none() {
                        decision.resolution_method = ResolutionMethod::UserChoseNew;
                        decision.chosen_memory_id = Some(anchor.new_memory_id.clone());
                    }
                }
            }
        }
    }

    decision
}

/// Validates that a resolution decision is grounded in its anchor.
///
/// `user_chose_old`/`user_chose_new` must reference the matching memory id;
/// a parsed value that is neither side is only allowed under
/// `user_clarified` or `both_wrong`; low-confidence parses are rejected.
#[must_use]
pub fn is_resolution_grounded(anchor: &SemanticAnchor, decision: &ResolutionDecision) -> bool {
    match decision.resolution_method {
        ResolutionMethod::UserChoseOld => {
            if decision.chosen_memory_id.as_deref() != Some(anchor.old_memory_id.as_str()) {
                return false;
            }
        },
        ResolutionMethod::UserChoseNew => {
            if decision.chosen_memory_id.as_deref() != Some(anchor.new_memory_id.as_str()) {
                return false;
            }
        },
        _ => {},
    }

    if anchor.slot_name.is_some() {
        if let Some(parsed) = &decision.parsed_value {
            let is_known = anchor.old_value.as_deref() == Some(parsed.as_str())
                || anchor.new_value.as_deref() == Some(parsed.as_str());
            if !is_known
                && !matches!(
                    decision.resolution_method,
                    ResolutionMethod::UserClarified | ResolutionMethod::BothWrong
                )
            {
                return false;
            }
        }
    }

    decision.confidence >= 0.3
}
