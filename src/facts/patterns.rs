//! Compiled Tier A slot patterns.
//!
//! Each slot has an ordered pattern list; the first match wins. Patterns
//! anchor on first-person phrasing so quoted or hypothetical third-party
//! facts do not land in the profile.

// The pattern table is static; compilation failures are caught by tests.
#![allow(clippy::unwrap_used)]

use once_cell::sync::Lazy;
use regex::Regex;

/// Word-number alternation reused by the numeric patterns.
const NUM: &str = r"\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty";

/// A compiled slot pattern with its extraction confidence.
pub(crate) struct SlotPattern {
    /// Canonical slot name.
    pub slot: &'static str,
    /// Pattern with exactly one capture group for the value.
    pub regex: Regex,
    /// Extraction confidence.
    pub confidence: f64,
}

fn pattern(slot: &'static str, re: &str, confidence: f64) -> SlotPattern {
    SlotPattern {
        slot,
        regex: Regex::new(re).unwrap(),
        confidence,
    }
}

/// Capitalized value sequence ("Nick Block", "New York City").
const CAP: &str = r"[A-Z][A-Za-z'’\-]*(?:\s+[A-Z][A-Za-z'’\-]*){0,3}";
/// Capitalized organization sequence, digits allowed ("Area 120").
const ORG: &str = r"[A-Z][\w&.'’\-]*(?:\s+[A-Z0-9][\w&.'’\-]*){0,3}";

/// The Tier A pattern table, in priority order per slot.
pub(crate) static SLOT_PATTERNS: Lazy<Vec<SlotPattern>> = Lazy::new(|| {
    vec![
        // --- name ---
        pattern("name", &format!(r"(?i:\bmy name is|\bmy name['’]s)\s+({CAP})"), 0.95),
        pattern("name", &format!(r"(?i:\bcall me)\s+({CAP})"), 0.9),
        pattern("name", &format!(r"\bI['’]?m\s+({CAP})"), 0.8),
        pattern("name", &format!(r"\bI am\s+({CAP})"), 0.8),
        // --- employer ---
        pattern(
            "employer",
            &format!(r"(?:\bI (?:used to |now |currently )?work(?:ed)? (?:at|for))\s+({ORG})"),
            0.95,
        ),
        pattern(
            "employer",
            &format!(r"(?:\bI(?:['’]m| am) (?:now )?(?:employed|working) (?:at|by|for))\s+({ORG})"),
            0.9,
        ),
        pattern("employer", &format!(r"(?:\bI (?:joined|switched to))\s+({ORG})"), 0.85),
        // --- location ---
        pattern("location", &format!(r"(?i:\bspecifically in)\s+({CAP})"), 0.95),
        pattern(
            "location",
            &format!(
                r"(?:\bI (?:used to |now |currently )?(?:live|reside) in(?: the)?)\s+({CAP}(?:\s+metro)?(?:\s+area)?)"
            ),
            0.95,
        ),
        pattern(
            "location",
            &format!(r"(?:\bI(?:['’]m| am) (?:based|located) in)\s+({CAP})"),
            0.9,
        ),
        pattern("location", &format!(r"(?:\bI(?:['’]m| am) from)\s+({CAP})"), 0.8),
        pattern("location", &format!(r"(?:\bI moved to)\s+({CAP})"), 0.85),
        // --- title ---
        pattern(
            "title",
            r"(?i:\bpromoted to(?: an?)?)\s+([A-Za-z][A-Za-z \-]{2,40}?)(?:\s+(?:at|for|in)\b|[.,!?]|$)",
            0.9,
        ),
        pattern(
            "title",
            r"(?i:\bmy (?:job )?title is)\s+([A-Za-z][A-Za-z \-]{2,40}?)(?:[.,!?]|$)",
            0.95,
        ),
        pattern(
            "title",
            r"(?i:\bas an?)\s+([A-Za-z][A-Za-z \-]{2,40}?)(?:\s+(?:at|for|in)\b|[.,!?]|$)",
            0.85,
        ),
        pattern(
            "title",
            r"(?i:\bI(?:['’]m| am) an?)\s+([A-Za-z \-]{0,24}?(?:developer|engineer|manager|designer|scientist|analyst|architect|consultant|director|writer|teacher))\b",
            0.8,
        ),
        // --- favorite_color ---
        pattern(
            "favorite_color",
            r"(?i:\bmy favou?rite colou?r is)\s+([A-Za-z]+)",
            0.95,
        ),
        // --- programming_years ---
        pattern(
            "programming_years",
            &format!(r"(?i:\bI(?:['’]ve| have)? been (?:programming|coding) for)\s+({NUM})(?i:\s+years)"),
            0.95,
        ),
        pattern(
            "programming_years",
            &format!(r"(?i:\b(?:programming|coding) for)\s+({NUM})(?i:\s+years)"),
            0.9,
        ),
        pattern(
            "programming_years",
            &format!(r"({NUM})(?i:\s+years of (?:programming|coding))"),
            0.9,
        ),
        // --- first_language ---
        pattern(
            "first_language",
            r"(?i:\bmy first (?:programming )?language was)\s+([A-Za-z+#]+)",
            0.95,
        ),
        pattern(
            "first_language",
            r"(?i:\bI started (?:programming |coding )?(?:with|in))\s+([A-Za-z+#]+)",
            0.85,
        ),
        // --- schools ---
        pattern(
            "masters_school",
            &format!(r"(?i:\bmaster['’]?s(?: degree)?(?: was)? (?:at|from))\s+({ORG})"),
            0.95,
        ),
        pattern(
            "undergrad_school",
            &format!(r"(?i:\b(?:undergrad(?:uate)?|bachelor['’]?s)(?: degree)?(?: was)? (?:at|from))\s+({ORG})"),
            0.95,
        ),
        // --- remote_preference ---
        pattern(
            "remote_preference",
            r"(?i:\bI (?:prefer|like) (?:to work |working )?)(remote(?:ly)?|in the office|in office|from home)\b",
            0.9,
        ),
        // --- graduation_year ---
        pattern(
            "graduation_year",
            r"(?i:\bI graduated in)\s+((?:19|20)\d{2})\b",
            0.95,
        ),
        // --- age ---
        pattern("age", r"(?i:\bI(?:['’]m| am))\s+(\d{1,3})(?i:\s+years old)\b", 0.95),
        // --- team_size ---
        pattern(
            "team_size",
            &format!(r"(?i:\bI manage (?:a team of\s+)?)({NUM})(?i:\s+(?:engineers|developers|people))"),
            0.9,
        ),
        // --- languages_spoken ---
        pattern(
            "languages_spoken",
            &format!(r"(?i:\bI speak)\s+({NUM})(?i:\s+languages)"),
            0.9,
        ),
        // --- siblings ---
        pattern(
            "siblings",
            &format!(r"(?i:\bI have)\s+({NUM})(?i:\s+(?:siblings|brothers|sisters))"),
            0.9,
        ),
        // --- project_name ---
        pattern(
            "project_name",
            &format!(r"(?i:\b(?:my|the) project(?: is)? called)\s+({CAP})"),
            0.9,
        ),
    ]
});

/// Structured `slot = value` / `slot: value` assignment lines.
///
/// Matches clarification answers like "Employer = Amazon" and resolved
/// `FACT: name = Sarah` context lines.
pub(crate) static ASSIGNMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^\s*(?:FACT:\s*)?(name|employer|location|title|favorite[ _]color|first[ _]language|masters[ _]school|undergrad[ _]school|programming[ _]years|remote[ _]preference|graduation[ _]year|age|team[ _]size|languages[ _]spoken|siblings|project[ _]name)\s*[=:]\s*(.+?)\s*$",
    )
    .unwrap()
});

/// Tier B open `(attribute, value)` tuples: "my X is Y".
pub(crate) static OPEN_TUPLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:\bmy\s+)([a-z][a-z _]{2,30}?)(?:\s+is\s+)([A-Za-z0-9][\w .'’\-]{0,40}?)(?:[.,!?;]|$)")
        .unwrap()
});
