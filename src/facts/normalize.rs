//! Stable value normalization and semantic equivalence tables.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Slots whose values normalize to digit strings.
pub(crate) const NUMERIC_SLOTS: &[&str] = &[
    "programming_years",
    "graduation_year",
    "age",
    "team_size",
    "languages_spoken",
    "siblings",
];

static WORD_NUMBERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("one", "1"),
        ("two", "2"),
        ("three", "3"),
        ("four", "4"),
        ("five", "5"),
        ("six", "6"),
        ("seven", "7"),
        ("eight", "8"),
        ("nine", "9"),
        ("ten", "10"),
        ("eleven", "11"),
        ("twelve", "12"),
        ("thirteen", "13"),
        ("fourteen", "14"),
        ("fifteen", "15"),
        ("sixteen", "16"),
        ("seventeen", "17"),
        ("eighteen", "18"),
        ("nineteen", "19"),
        ("twenty", "20"),
    ])
});

/// Location abbreviations folded into their canonical city name.
static LOCATION_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("sf", "san francisco"),
        ("nyc", "new york"),
        ("la", "los angeles"),
        ("philly", "philadelphia"),
        ("vegas", "las vegas"),
    ])
});

/// Employer abbreviations folded into their canonical name.
static EMPLOYER_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("msft", "microsoft"),
        ("amzn", "amazon"),
        ("goog", "google"),
        ("fb", "meta"),
        ("facebook", "meta"),
    ])
});

/// Normalizes a raw slot value into its stable comparison form.
///
/// Lowercases, collapses whitespace, strips trailing punctuation, folds
/// known abbreviations ("SF" and "San Francisco" normalize identically),
/// and converts word numbers for numeric slots.
#[must_use]
pub fn normalize_value(slot: &str, raw: &str) -> String {
    let mut value = raw
        .trim()
        .trim_end_matches(['.', ',', '!', '?', ';', ':'])
        .to_lowercase();
    value = value.split_whitespace().collect::<Vec<_>>().join(" ");

    if NUMERIC_SLOTS.contains(&slot) {
        if let Some(digits) = WORD_NUMBERS.get(value.as_str()) {
            return (*digits).to_string();
        }
        return value;
    }

    match slot {
        "location" => LOCATION_ALIASES
            .get(value.as_str())
            .map_or(value, |canonical| (*canonical).to_string()),
        "employer" => EMPLOYER_ALIASES
            .get(value.as_str())
            .map_or(value, |canonical| (*canonical).to_string()),
        "remote_preference" => {
            if value.contains("office") {
                "office".to_string()
            } else if value.contains("remote") {
                "remote".to_string()
            } else {
                value
            }
        },
        _ => value,
    }
}

/// True when two raw values are the same fact after normalization.
///
/// This is the paraphrase gate's value-level check: equal normalized forms
/// are never a contradiction.
#[must_use]
pub fn values_equivalent(slot: &str, a: &str, b: &str) -> bool {
    let norm_a = normalize_value(slot, a);
    let norm_b = normalize_value(slot, b);
    if norm_a == norm_b {
        return true;
    }
    // First-token match covers "Sarah" vs "Sarah Chen" style name pairs.
    if slot == "name" {
        let first_a = norm_a.split_whitespace().next().unwrap_or_default();
        let first_b = norm_b.split_whitespace().next().unwrap_or_default();
        return !first_a.is_empty() && first_a == first_b;
    }
    false
}

/// Keyword-based domain detection.
///
/// Returns the domains a text touches; `general` when nothing matches.
#[must_use]
pub fn detect_domains(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut domains = Vec::new();
    const PROGRAMMING: &[&str] = &[
        "programming",
        "software",
        "developer",
        "engineer",
        "coding",
        " code",
        "rust",
        "python",
        "javascript",
    ];
    const PRINT_SHOP: &[&str] = &["print shop", "printing", "print press", "typograph"];
    if PROGRAMMING.iter().any(|kw| lower.contains(kw)) {
        domains.push("programming".to_string());
    }
    if PRINT_SHOP.iter().any(|kw| lower.contains(kw)) {
        domains.push("print_shop".to_string());
    }
    if domains.is_empty() {
        domains.push("general".to_string());
    }
    domains
}
