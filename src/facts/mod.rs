//! Two-tier fact-slot extraction.
//!
//! Tier A extracts a closed set of hard slots (name, employer, location,
//! title, ...) with anchored patterns. Tier B, when enabled, produces open
//! `(attribute, value)` tuples for flexible facts. Extraction is pure and
//! idempotent; results are cached LRU by exact text.

mod normalize;
mod patterns;

pub use normalize::{detect_domains, normalize_value, values_equivalent};

use crate::config::FactConfig;
use crate::models::{ExtractedFact, TemporalStatus};
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// The closed Tier A slot set.
pub const HARD_SLOTS: &[&str] = &[
    "name",
    "employer",
    "location",
    "title",
    "favorite_color",
    "first_language",
    "masters_school",
    "undergrad_school",
    "programming_years",
    "remote_preference",
    "graduation_year",
    "age",
    "team_size",
    "languages_spoken",
    "siblings",
    "project_name",
];

static PAST_MARKERS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(?i)\b(used to|no longer|previously|formerly|in the past|back then)\b").unwrap();
    re
});

static FUTURE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(?i)\b(will|planning to|going to|about to|next (year|month|week))\b").unwrap();
    re
});

static HYPOTHETICAL_MARKERS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(?i)\b(if i|i would|i might|hypothetically|suppose)\b").unwrap();
    re
});

/// Infers the temporal status of facts stated in a text.
#[must_use]
pub fn infer_temporal_status(text: &str) -> TemporalStatus {
    if PAST_MARKERS.is_match(text) {
        TemporalStatus::Past
    } else if FUTURE_MARKERS.is_match(text) {
        TemporalStatus::Future
    } else if HYPOTHETICAL_MARKERS.is_match(text) {
        TemporalStatus::Hypothetical
    } else {
        TemporalStatus::Active
    }
}

fn canonical_slot(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// Extracts Tier A fact slots from a text (uncached, pure).
///
/// For each slot, the first matching pattern wins. Structured
/// `slot = value` assignment lines override pattern matches: a
/// clarification answer like "Employer = Amazon" is authoritative.
#[must_use]
pub fn extract_fact_slots(text: &str) -> BTreeMap<String, ExtractedFact> {
    let mut facts: BTreeMap<String, ExtractedFact> = BTreeMap::new();
    if text.trim().is_empty() {
        return facts;
    }

    let temporal = infer_temporal_status(text);
    let domains = detect_domains(text);

    for pat in patterns::SLOT_PATTERNS.iter() {
        if facts.contains_key(pat.slot) {
            continue;
        }
        if let Some(caps) = pat.regex.captures(text) {
            if let Some(value) = caps.get(1) {
                let raw = value.as_str().trim();
                if raw.is_empty() {
                    continue;
                }
                facts.insert(
                    pat.slot.to_string(),
                    ExtractedFact {
                        slot: pat.slot.to_string(),
                        raw_value: raw.to_string(),
                        normalized: normalize_value(pat.slot, raw),
                        temporal_status: temporal,
                        domains: domains.clone(),
                        confidence: pat.confidence,
                    },
                );
            }
        }
    }

    for caps in patterns::ASSIGNMENT_PATTERN.captures_iter(text) {
        let (Some(label), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let slot = canonical_slot(label.as_str());
        let raw = value.as_str().trim();
        if raw.is_empty() {
            continue;
        }
        facts.insert(
            slot.clone(),
            ExtractedFact {
                slot: slot.clone(),
                raw_value: raw.to_string(),
                normalized: normalize_value(&slot, raw),
                temporal_status: temporal,
                domains: domains.clone(),
                confidence: 0.97,
            },
        );
    }

    facts
}

/// Extracts Tier B open `(attribute, value)` tuples.
///
/// Attributes that collide with a Tier A slot are skipped; those belong to
/// the hard extraction.
#[must_use]
pub fn extract_open_tuples(text: &str) -> Vec<ExtractedFact> {
    let temporal = infer_temporal_status(text);
    let domains = detect_domains(text);
    let mut tuples = Vec::new();
    for caps in patterns::OPEN_TUPLE_PATTERN.captures_iter(text) {
        let (Some(attr), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let slot = canonical_slot(attr.as_str());
        if HARD_SLOTS.contains(&slot.as_str()) || slot.starts_with("name_") {
            continue;
        }
        let raw = value.as_str().trim();
        if raw.is_empty() {
            continue;
        }
        tuples.push(ExtractedFact {
            slot: slot.clone(),
            raw_value: raw.to_string(),
            normalized: normalize_value(&slot, raw),
            temporal_status: temporal,
            domains: domains.clone(),
            confidence: 0.6,
        });
    }
    tuples
}

/// Extracts Tier A slots plus Tier B open tuples (uncached, pure).
///
/// Tier A wins on slot-name collisions. This is the extraction used for
/// ledger slot tracking and anchor derivation, so open-tuple claims
/// participate in contradiction bookkeeping the same way hard slots do.
#[must_use]
pub fn extract_all_facts(text: &str) -> BTreeMap<String, ExtractedFact> {
    let mut facts = extract_fact_slots(text);
    for tuple in extract_open_tuples(text) {
        facts.entry(tuple.slot.clone()).or_insert(tuple);
    }
    facts
}

/// Caching fact extractor.
///
/// The cache is process-local and never shared across conversation threads'
/// processes; invalidation is by eviction only, which is sound because
/// extraction is a pure function of the text.
pub struct FactExtractor {
    cache: Mutex<LruCache<String, BTreeMap<String, ExtractedFact>>>,
    max_cacheable_len: usize,
    open_tuples_enabled: bool,
}

impl FactExtractor {
    /// Creates an extractor from fact configuration.
    #[must_use]
    pub fn new(config: &FactConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            max_cacheable_len: config.max_cacheable_len,
            open_tuples_enabled: config.open_tuples_enabled,
        }
    }

    /// Extracts Tier A slots, serving repeated texts from the LRU cache.
    #[must_use]
    pub fn extract(&self, text: &str) -> BTreeMap<String, ExtractedFact> {
        if text.len() > self.max_cacheable_len {
            return extract_fact_slots(text);
        }
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(text) {
                metrics::counter!("fact_cache_hits_total").increment(1);
                return cached.clone();
            }
        }
        let facts = extract_fact_slots(text);
        if let Ok(mut cache) = self.cache.lock() {
            metrics::counter!("fact_cache_misses_total").increment(1);
            cache.put(text.to_string(), facts.clone());
        }
        facts
    }

    /// Extracts Tier A slots plus Tier B open tuples when enabled.
    #[must_use]
    pub fn extract_all(&self, text: &str) -> BTreeMap<String, ExtractedFact> {
        let mut facts = self.extract(text);
        if self.open_tuples_enabled {
            for tuple in extract_open_tuples(text) {
                facts.entry(tuple.slot.clone()).or_insert(tuple);
            }
        }
        facts
    }
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new(&FactConfig::default())
    }
}
