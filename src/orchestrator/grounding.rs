//! Grounding score, answer-kind prediction, caveats, and sanitization.

// Word-overlap ratios lose precision only beyond 2^52 words.
#![allow(clippy::cast_precision_loss)]

use crate::facts;
use crate::gate::AnswerKind;
use crate::models::MemoryItem;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

/// Maps structured answer labels to canonical slots ("masters school: MIT").
static ANSWER_LINE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(?m)^\s*([A-Za-z_ ][A-Za-z_ ]{0,40})\s*:\s*(.+?)\s*$").unwrap();
    re
});

fn slot_for_label(label: &str) -> Option<&'static str> {
    match label.trim().to_lowercase().replace('_', " ").as_str() {
        "name" => Some("name"),
        "employer" | "work" | "company" => Some("employer"),
        "job" | "title" => Some("title"),
        "location" | "city" => Some("location"),
        "first language" => Some("first_language"),
        "masters school" | "master's school" => Some("masters_school"),
        "undergrad school" | "undergraduate school" => Some("undergrad_school"),
        "programming years" | "years programming" => Some("programming_years"),
        "remote preference" => Some("remote_preference"),
        "favorite color" => Some("favorite_color"),
        _ => None,
    }
}

/// Computes the grounding score of an answer against retrieved memories.
///
/// Exact or near-exact matches of short answers score 1.0; structured
/// `slot: value` answers matching the retrieved slot values score 1.0;
/// otherwise a word-overlap measure with quote and content-word bonuses,
/// biased for short answers.
#[must_use]
pub fn grounding_score(answer: &str, retrieved: &[(MemoryItem, f64)]) -> f64 {
    if answer.is_empty() || retrieved.is_empty() {
        return 0.0;
    }
    let answer_lower = answer.to_lowercase();
    let answer_lower = answer_lower.trim();

    // Structured slot answers: all lines matching retrieved slot values is
    // full grounding, regardless of brevity.
    let structured: Vec<(&'static str, String)> = ANSWER_LINE
        .captures_iter(answer)
        .filter_map(|caps| {
            let slot = slot_for_label(caps.get(1)?.as_str())?;
            let value = caps.get(2)?.as_str().trim().to_string();
            (!value.is_empty()).then_some((slot, value))
        })
        .collect();
    if !structured.is_empty() {
        let mut retrieved_norms: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for (memory, _) in retrieved.iter().take(5) {
            for (slot, fact) in facts::extract_fact_slots(&memory.text) {
                retrieved_norms.entry(slot).or_default().insert(fact.normalized);
            }
        }
        let matches = structured
            .iter()
            .filter(|(slot, value)| {
                let want = facts::normalize_value(slot, value);
                retrieved_norms.get(*slot).is_some_and(|have| have.contains(&want))
            })
            .count();
        if matches == structured.len() {
            return 1.0;
        }
    }

    // Exact or contained short answers.
    for (memory, _) in retrieved.iter().take(3) {
        let memory_lower = memory.text.to_lowercase();
        let memory_lower = memory_lower.trim();
        if answer_lower == memory_lower {
            return 1.0;
        }
        if answer_lower.len() > 2 && memory_lower.contains(answer_lower) {
            return 1.0;
        }
    }

    let memory_text: String = retrieved
        .iter()
        .take(3)
        .map(|(m, _)| m.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let memory_words: HashSet<&str> = memory_text.split_whitespace().collect();
    let answer_words: HashSet<&str> = answer_lower.split_whitespace().collect();
    if answer_words.is_empty() {
        return 0.0;
    }

    // Short answers: all words present is near-perfect grounding.
    if answer.len() < 30 {
        if memory_text.contains(answer_lower) {
            return 1.0;
        }
        if answer_words.iter().all(|w| memory_words.contains(w)) {
            return 0.95;
        }
    }

    // Long answers containing most of a memory's content words are grounded.
    for (memory, _) in retrieved.iter().take(3) {
        let content_words: HashSet<String> = memory
            .text
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(ToString::to_string)
            .collect();
        if !content_words.is_empty() {
            let present = content_words
                .iter()
                .filter(|w| answer_words.contains(w.as_str()))
                .count();
            if present as f64 / content_words.len() as f64 >= 0.6 {
                return 0.85;
            }
        }
    }

    let overlap = answer_words.iter().filter(|w| memory_words.contains(*w)).count();
    let overlap_ratio = overlap as f64 / answer_words.len() as f64;
    let quote_bonus = if answer.contains('"') || answer.contains('\'') { 0.15 } else { 0.0 };

    let score = if overlap_ratio >= 0.4 {
        (overlap_ratio + 0.2).min(1.0)
    } else {
        overlap_ratio + quote_bonus
    };
    score.clamp(0.0, 1.0)
}

const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "good morning", "good evening", "you're welcome",
];

/// Predicts the answer kind for gate threshold selection.
///
/// Question-word openers read as explanatory, greetings and
/// acknowledgements as conversational, everything else as factual.
#[must_use]
pub fn predict_answer_kind(query: &str, answer: &str) -> AnswerKind {
    let answer_lower = answer.trim().to_lowercase();
    if GREETING_WORDS.iter().any(|g| answer_lower.starts_with(g)) {
        return AnswerKind::Conversational;
    }
    let query_lower = query.trim().to_lowercase();
    if query_lower.starts_with("why") || query_lower.starts_with("how ") || query_lower.starts_with("explain") {
        return AnswerKind::Explanatory;
    }
    AnswerKind::Factual
}

/// The caveat-language regex family.
///
/// An answer matching any of these already acknowledges that the stated
/// fact has a competing version.
static CAVEAT_PATTERNS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(
        r"(?i)\b(most recent|latest|conflicting|though|however|according to)\b|\b(updat(e|ed|ing)|correct(ed|ing|ion)?|clarif(y|ied|ying))\b|\b(earlier|previously|before|prior|former)\b|\b(mentioned|noted|stated|said|established)\b|\b(chang(e|ed|ing)|revis(e|ed|ing)|adjust(ed|ing)?|modif(y|ied|ying))\b|\b(actually|instead|rather|in fact)\b|\(changed from|\(most recent|\(updated|\bno longer\b|\bas of\b|\b(versus|vs|compared to)\b",
    )
    .unwrap();
    re
});

/// True when the answer already contains caveat language.
#[must_use]
pub fn answer_has_caveat(answer: &str) -> bool {
    !answer.is_empty() && CAVEAT_PATTERNS.is_match(answer)
}

/// Builds the mandatory caveat for an answer that reintroduces contested
/// claims.
///
/// Questions get the simple temporal caveat; assertions name what changed
/// when the values are known.
#[must_use]
pub fn build_mandatory_caveat(
    is_question: bool,
    reintroduced_count: usize,
    old_value: Option<&str>,
    new_value: Option<&str>,
) -> String {
    if is_question {
        return "(most recent update)".to_string();
    }
    if let (Some(old), Some(new)) = (old_value, new_value) {
        let truncate = |v: &str| -> String {
            if v.chars().count() > 30 {
                let cut: String = v.chars().take(30).collect();
                format!("{cut}...")
            } else {
                v.to_string()
            }
        };
        return format!("(changed from {} to {})", truncate(old), truncate(new));
    }
    if reintroduced_count == 1 {
        "(note: conflicting information exists)".to_string()
    } else {
        format!("(note: {reintroduced_count} conflicting claims exist)")
    }
}

static MEMORY_DENIAL: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(?i)\b(i (do not|don't) (have|remember) any (memories|information)|i have no (memories|information|record))\b").unwrap();
    re
});

static MEMORY_CLAIM: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(?i)(^|\.\s+)\s*i remember\b[^.!?]*[.!?]?").unwrap();
    re
});

/// Sanitizes a candidate answer against the resolved FACT context.
///
/// Strips "I remember ..." claims whose content is not supported by any
/// FACT line, and never lets the answer deny memory when memories exist.
#[must_use]
pub fn sanitize_answer(answer: &str, fact_lines: &[String], has_memories: bool) -> String {
    let mut result = answer.to_string();

    if has_memories && MEMORY_DENIAL.is_match(&result) {
        result = "Here is what I have stored so far.".to_string();
        return result;
    }

    let fact_text = fact_lines.join(" ").to_lowercase();
    let mut sanitized = String::with_capacity(result.len());
    let mut last_end = 0;
    for claim in MEMORY_CLAIM.find_iter(&result) {
        let fragment = claim.as_str().to_lowercase();
        let supported = fragment
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .any(|w| fact_text.contains(w));
        sanitized.push_str(&result[last_end..claim.start()]);
        if supported {
            sanitized.push_str(claim.as_str());
        }
        last_end = claim.end();
    }
    sanitized.push_str(&result[last_end..]);
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        result
    } else {
        trimmed.to_string()
    }
}
