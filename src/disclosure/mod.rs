//! Disclosure policy: when a detected tension is surfaced to the user.
//!
//! Maps a validity probability to ACCEPT / CLARIFY / REJECT through
//! calibrated zones, with a per-session budget so the agent does not nag.
//! High-stakes slots bypass the budget and never take ACCEPT without an
//! explicit confirmation path.

use crate::config::DisclosureConfig;
use std::sync::Mutex;

/// The action the policy recommends for a new claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosureAction {
    /// Accept the new claim as a normal update.
    Accept,
    /// Ask the user which value is correct.
    Clarify,
    /// Reject the new claim pending clarification.
    Reject,
}

impl DisclosureAction {
    /// Returns the action as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Clarify => "clarify",
            Self::Reject => "reject",
        }
    }
}

/// Calibration zone a validity probability landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosureZone {
    /// At or above the high threshold.
    Green,
    /// Between the thresholds.
    Yellow,
    /// Below the low threshold.
    Red,
}

impl DisclosureZone {
    /// Returns the zone as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// The policy's decision for one claim pair.
#[derive(Debug, Clone)]
pub struct DisclosureDecision {
    /// Recommended action.
    pub action: DisclosureAction,
    /// Zone the probability landed in.
    pub zone: DisclosureZone,
    /// Question to ask the user, when clarifying.
    pub clarification_prompt: Option<String>,
}

/// Slot families that always require disclosure and never silently accept.
const HIGH_STAKES_SLOTS: &[&str] = &[
    // Medical
    "medical_diagnosis",
    "medication",
    "allergy",
    "blood_type",
    "medical_condition",
    // Financial
    "account_balance",
    "account_number",
    "credit_score",
    "salary",
    "income",
    // Legal
    "legal_status",
    "citizenship",
    "visa_status",
    // Safety
    "emergency_contact",
    "address",
    "phone_number",
    // Credentials
    "password",
    "ssn",
];

/// True when a slot belongs to a high-stakes family.
#[must_use]
pub fn is_high_stakes(slot: &str) -> bool {
    HIGH_STAKES_SLOTS.contains(&slot)
}

/// Per-session disclosure policy.
pub struct DisclosurePolicy {
    config: DisclosureConfig,
    clarifications_used: Mutex<u32>,
}

impl DisclosurePolicy {
    /// Creates the policy from disclosure configuration.
    #[must_use]
    pub const fn new(config: DisclosureConfig) -> Self {
        Self {
            config,
            clarifications_used: Mutex::new(0),
        }
    }

    /// Resets the session clarification budget.
    pub fn reset_session(&self) {
        if let Ok(mut used) = self.clarifications_used.lock() {
            *used = 0;
        }
    }

    /// Decides how to handle a new claim given its validity probability.
    ///
    /// Zones: `p < low` red/REJECT, `p >= high` green/ACCEPT, yellow
    /// CLARIFY in between. The session budget only limits CLARIFY for
    /// ordinary slots: once exhausted, a yellow-zone claim is accepted and
    /// the tension settles through the lifecycle instead. High-stakes slots
    /// ignore the budget and downgrade green to CLARIFY so a silent accept
    /// can never rewrite them.
    #[must_use]
    pub fn decide(
        &self,
        p_valid: f64,
        slot: &str,
        old_value: &str,
        new_value: &str,
    ) -> DisclosureDecision {
        let zone = if p_valid < self.config.low_threshold {
            DisclosureZone::Red
        } else if p_valid >= self.config.high_threshold {
            DisclosureZone::Green
        } else {
            DisclosureZone::Yellow
        };

        let high_stakes = is_high_stakes(slot);
        let prompt = || {
            Some(format!(
                "I have '{old_value}' and '{new_value}' for {slot}. Which is correct?"
            ))
        };

        let action = match zone {
            DisclosureZone::Red => DisclosureAction::Reject,
            DisclosureZone::Green => {
                if high_stakes {
                    DisclosureAction::Clarify
                } else {
                    DisclosureAction::Accept
                }
            },
            DisclosureZone::Yellow => {
                if high_stakes || self.consume_budget() {
                    DisclosureAction::Clarify
                } else {
                    DisclosureAction::Accept
                }
            },
        };

        let decision = DisclosureDecision {
            action,
            zone,
            clarification_prompt: (action == DisclosureAction::Clarify).then(prompt).flatten(),
        };
        tracing::debug!(
            slot,
            p_valid,
            action = decision.action.as_str(),
            zone = decision.zone.as_str(),
            "disclosure decision"
        );
        decision
    }

    /// Takes one clarification from the budget; false when exhausted.
    fn consume_budget(&self) -> bool {
        let Ok(mut used) = self.clarifications_used.lock() else {
            return false;
        };
        if *used >= self.config.max_clarifications_per_session {
            return false;
        }
        *used += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DisclosurePolicy {
        DisclosurePolicy::new(DisclosureConfig::default())
    }

    #[test]
    fn test_zone_boundaries() {
        let p = policy();
        assert_eq!(p.decide(0.1, "employer", "a", "b").action, DisclosureAction::Reject);
        assert_eq!(p.decide(0.32, "employer", "a", "b").zone, DisclosureZone::Red);
        assert_eq!(p.decide(0.33, "employer", "a", "b").zone, DisclosureZone::Yellow);
        assert_eq!(p.decide(0.5, "employer", "a", "b").action, DisclosureAction::Clarify);
        assert_eq!(p.decide(0.67, "employer", "a", "b").action, DisclosureAction::Accept);
        assert_eq!(p.decide(0.9, "employer", "a", "b").zone, DisclosureZone::Green);
    }

    #[test]
    fn test_clarify_carries_prompt() {
        let p = policy();
        let decision = p.decide(0.5, "employer", "Microsoft", "Amazon");
        let prompt = decision.clarification_prompt.unwrap();
        assert!(prompt.contains("Microsoft") && prompt.contains("Amazon"));
    }

    #[test]
    fn test_budget_exhaustion_downgrades_to_accept() {
        let p = policy();
        for _ in 0..3 {
            assert_eq!(p.decide(0.5, "employer", "a", "b").action, DisclosureAction::Clarify);
        }
        // Budget spent: yellow now settles silently.
        assert_eq!(p.decide(0.5, "employer", "a", "b").action, DisclosureAction::Accept);

        p.reset_session();
        assert_eq!(p.decide(0.5, "employer", "a", "b").action, DisclosureAction::Clarify);
    }

    #[test]
    fn test_high_stakes_bypasses_budget_and_accept() {
        let p = policy();
        for _ in 0..10 {
            assert_eq!(
                p.decide(0.5, "medication", "a", "b").action,
                DisclosureAction::Clarify,
                "high-stakes clarifications ignore the budget"
            );
        }
        // Even green zone never silently accepts a high-stakes rewrite.
        assert_eq!(p.decide(0.95, "allergy", "a", "b").action, DisclosureAction::Clarify);
        assert_eq!(p.decide(0.1, "allergy", "a", "b").action, DisclosureAction::Reject);
    }
}
