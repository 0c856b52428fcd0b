//! Semantic anchor: binds a clarification prompt to its contradiction.
//!
//! When the engine asks the user to resolve a contradiction, the anchor
//! carries forward the conflict type, the exact memories involved, the
//! semantic slot if applicable, and the kind of answer expected, so the
//! user's reply can be parsed back into a grounded resolution decision.

use super::{ContradictionType, ResolutionMethod};
use serde::{Deserialize, Serialize};

/// What kind of answer a clarification prompt expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedAnswerType {
    /// Mutually exclusive; the user picks one side.
    #[default]
    ChooseOne,
    /// Progression over time; the user orders the claims.
    TemporalOrder,
    /// Both may be valid at different specificity.
    BothTrue,
    /// The user is correcting a mistake.
    Correction,
}

impl ExpectedAnswerType {
    /// Determines the expected answer kind from a contradiction type.
    #[must_use]
    pub const fn for_contradiction(contradiction_type: ContradictionType) -> Self {
        match contradiction_type {
            ContradictionType::Refinement => Self::BothTrue,
            ContradictionType::Temporal => Self::TemporalOrder,
            ContradictionType::Revision | ContradictionType::Conflict => Self::ChooseOne,
        }
    }
}

/// Binds a follow-up clarification to its originating contradiction context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticAnchor {
    /// Ledger entry id.
    pub contradiction_id: String,
    /// Turn on which the contradiction was detected.
    pub turn_number: u64,
    /// Classification of the conflict.
    pub contradiction_type: ContradictionType,
    /// Older memory id.
    pub old_memory_id: String,
    /// Newer memory id.
    pub new_memory_id: String,
    /// Older memory text.
    pub old_text: String,
    /// Newer memory text.
    pub new_text: String,
    /// Slot name, for slot-based contradictions.
    pub slot_name: Option<String>,
    /// Older slot value.
    pub old_value: Option<String>,
    /// Newer slot value.
    pub new_value: Option<String>,
    /// Embedding difference (new minus old); not serialized, only its
    /// magnitude survives `to_json`.
    #[serde(skip)]
    pub drift_vector: Option<Vec<f32>>,
    /// The generated clarification question.
    pub clarification_prompt: String,
    /// What kind of answer we expect.
    pub expected_answer_type: ExpectedAnswerType,
    /// The user's answer, once given.
    pub user_answer: Option<String>,
    /// Resolution method parsed from the answer.
    pub resolution_method: Option<ResolutionMethod>,
    /// Turn on which the contradiction was resolved.
    pub resolved_at: Option<u64>,
}

impl SemanticAnchor {
    /// Serializes the anchor for ledger metadata, replacing the drift
    /// vector with its magnitude.
    #[must_use]
    pub fn to_metadata(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let (Some(obj), Some(drift)) = (value.as_object_mut(), &self.drift_vector) {
            let magnitude = drift.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
            if let Some(number) = serde_json::Number::from_f64(magnitude) {
                obj.insert("drift_magnitude".to_string(), serde_json::Value::Number(number));
            }
        }
        value
    }
}

/// A parsed resolution decision from a clarification answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionDecision {
    /// How the contradiction should be resolved.
    pub resolution_method: ResolutionMethod,
    /// Which memory wins, if applicable.
    pub chosen_memory_id: Option<String>,
    /// Status the ledger entry should take.
    pub new_status: super::ContradictionStatus,
    /// Confidence in the parse.
    pub confidence: f64,
    /// Canonical value extracted from the answer, if slot-based.
    pub parsed_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_answer_type_mapping() {
        assert_eq!(
            ExpectedAnswerType::for_contradiction(ContradictionType::Refinement),
            ExpectedAnswerType::BothTrue
        );
        assert_eq!(
            ExpectedAnswerType::for_contradiction(ContradictionType::Temporal),
            ExpectedAnswerType::TemporalOrder
        );
        assert_eq!(
            ExpectedAnswerType::for_contradiction(ContradictionType::Conflict),
            ExpectedAnswerType::ChooseOne
        );
        assert_eq!(
            ExpectedAnswerType::for_contradiction(ContradictionType::Revision),
            ExpectedAnswerType::ChooseOne
        );
    }

    #[test]
    fn test_to_metadata_replaces_drift_vector() {
        let anchor = SemanticAnchor {
            contradiction_id: "contra_1".to_string(),
            turn_number: 3,
            contradiction_type: ContradictionType::Conflict,
            old_memory_id: "mem_a".to_string(),
            new_memory_id: "mem_b".to_string(),
            old_text: "I work at Microsoft".to_string(),
            new_text: "I work at Amazon".to_string(),
            slot_name: Some("employer".to_string()),
            old_value: Some("Microsoft".to_string()),
            new_value: Some("Amazon".to_string()),
            drift_vector: Some(vec![3.0, 4.0]),
            clarification_prompt: String::new(),
            expected_answer_type: ExpectedAnswerType::ChooseOne,
            user_answer: None,
            resolution_method: None,
            resolved_at: None,
        };
        let meta = anchor.to_metadata();
        assert!((meta["drift_magnitude"].as_f64().unwrap() - 5.0).abs() < 1e-9);
        assert!(meta.get("drift_vector").is_none());
    }
}
