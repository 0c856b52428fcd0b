//! Natural-language resolution intent detection.
//!
//! A closed library of patterns detecting that the user is trying to
//! resolve a recorded tension ("Google is correct, I switched jobs",
//! "ignore the red one", "stick with the original"). The orchestrator uses
//! a match as permission to scan open contradictions and apply the side the
//! user named.

// The pattern table is static; compilation failures are caught by tests.
#![allow(clippy::unwrap_used)]

use once_cell::sync::Lazy;
use regex::Regex;

/// The resolution pattern library, compiled once.
static RESOLUTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Explicit correctness statements
        r"\b(is|was)\s+(correct|right|accurate)\b",
        // Revision markers
        r"\bactually\b",
        r"\bi\s+meant\b",
        // Job/employer changes
        r"\bswitched\s+(jobs|to|companies)\b",
        r"\bchanged\s+to\b",
        r"\bchanged\s+(jobs|companies)\b",
        r"\bmoved\s+to\b",
        r"\bnow\s+(work|working|at)\b",
        // Correctness confirmations
        r"\bcorrect\s+(one|version|answer|status|value|info|information|statement)\b",
        r"\b(that|this)(?:\s*'s|\s+is)\s+(correct|right|accurate)\b",
        // Ignore/discard
        r"\bignore\s+(the|that)\b",
        // "no wait, X was right"
        r"\b(no|wait)\b.*\b(was|is)\s+(right|correct)\b",
        // Keep old value
        r"\bkeep\s+(the\s+)?(old|previous|original|first)\b",
        r"\bstick\s+with\s+(the\s+)?(old|previous|original|first)\b",
        r"\bstick\s+with\s+([A-Za-z0-9\s]+)",
        // Preference
        r"\bgo\s+with\s+([A-Za-z0-9\s]+)",
        r"\bprefer\s+([A-Za-z0-9\s]+)",
        r"\buse\s+([A-Za-z0-9\s]+)\s+instead\b",
        // Update/override
        r"\breplace\s+(with|it\s+with)\s+([A-Za-z0-9\s]+)",
        r"\boverride\s+(with|to)\s+([A-Za-z0-9\s]+)",
        r"\bupdate\s+(to|it\s+to)\s+([A-Za-z0-9\s]+)",
        // Choice
        r"\bchoose\s+([A-Za-z0-9\s]+)",
        r"\bselect\s+([A-Za-z0-9\s]+)",
        r"\bpick\s+([A-Za-z0-9\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});

/// True when the text contains any resolution intent pattern.
#[must_use]
pub fn has_resolution_intent(text: &str) -> bool {
    RESOLUTION_PATTERNS.iter().any(|p| p.is_match(text))
}

/// A single pattern match with its span.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// The pattern source that matched.
    pub pattern: String,
    /// The matched fragment.
    pub matched: String,
    /// Byte offset of the match start.
    pub start: usize,
    /// Byte offset of the match end.
    pub end: usize,
}

/// All matched resolution patterns with their spans (for tracing).
#[must_use]
pub fn get_matched_patterns(text: &str) -> Vec<PatternMatch> {
    RESOLUTION_PATTERNS
        .iter()
        .filter_map(|p| {
            p.find(text).map(|m| PatternMatch {
                pattern: p.as_str().to_string(),
                matched: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Google is correct, I switched jobs")]
    #[test_case("Actually, it's Google now")]
    #[test_case("I meant Google, not Microsoft")]
    #[test_case("That's the correct status now")]
    #[test_case("Blue was right, ignore the red")]
    #[test_case("keep the old one")]
    #[test_case("stick with Microsoft")]
    #[test_case("go with Amazon")]
    #[test_case("use Google instead")]
    #[test_case("update it to Amazon")]
    #[test_case("pick the second")]
    #[test_case("no wait, Microsoft was right")]
    fn test_resolution_intent_detected(text: &str) {
        assert!(has_resolution_intent(text), "expected intent in: {text}");
    }

    #[test_case("Where do I work?")]
    #[test_case("I work at Microsoft as a senior developer.")]
    #[test_case("My name is Sarah.")]
    #[test_case("What's the weather like?")]
    fn test_no_resolution_intent(text: &str) {
        assert!(!has_resolution_intent(text), "unexpected intent in: {text}");
    }

    #[test]
    fn test_matched_patterns_have_spans() {
        let matches = get_matched_patterns("Google is correct, I switched jobs");
        assert!(!matches.is_empty());
        let first = &matches[0];
        assert!(first.end > first.start);
        assert!(!first.matched.is_empty());
    }
}
