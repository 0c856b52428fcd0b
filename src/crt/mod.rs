//! CRT math: similarity, drift, recency, trust-weighted retrieval scoring,
//! volatility, and the contradiction pre-checks.
//!
//! Retrieval score: `R = s * rho * (alpha * trust + (1 - alpha) * confidence)`
//! where `s` is cosine similarity, `rho` the recency weight, and `alpha` the
//! configured trust weight. This is fundamentally different from pure
//! similarity ranking: a well-matched but distrusted claim loses to a
//! slightly worse-matched claim the user has confirmed.

// Precision loss in f32 -> f64 score math is acceptable for ranking.
#![allow(clippy::cast_precision_loss)]

use crate::config::TrustConfig;
use crate::facts;
use crate::models::{MemorySource, TemporalStatus};

/// Cosine similarity of two embedding vectors.
///
/// Vectors are expected unit-normalized by the embedder; a defensive norm
/// division keeps the result in `[-1, 1]` for non-normalized inputs.
/// Mismatched or empty vectors score 0.
#[must_use]
pub fn similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Meaning drift between two embeddings: `1 - similarity`.
#[must_use]
pub fn drift_meaning(a: &[f32], b: &[f32]) -> f64 {
    1.0 - similarity(a, b)
}

/// CRT scoring and contradiction pre-checks, parameterized by trust config.
#[derive(Debug, Clone)]
pub struct CrtMath {
    config: TrustConfig,
}

impl CrtMath {
    /// Creates the math helper from trust configuration.
    #[must_use]
    pub const fn new(config: TrustConfig) -> Self {
        Self { config }
    }

    /// The trust configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Cosine similarity (see the free function of the same name).
    #[must_use]
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f64 {
        similarity(a, b)
    }

    /// Meaning drift: `1 - similarity`.
    #[must_use]
    pub fn drift_meaning(&self, a: &[f32], b: &[f32]) -> f64 {
        drift_meaning(a, b)
    }

    /// Monotonic recency decay with the configured half-life.
    ///
    /// A memory written `half_life` seconds ago weighs 0.5; the result is
    /// clamped to `[0, 1]` (future timestamps weigh 1.0).
    #[must_use]
    pub fn recency_weight(&self, timestamp: f64, now: f64) -> f64 {
        let age = now - timestamp;
        if age <= 0.0 {
            return 1.0;
        }
        let half_life = self.config.recency_half_life_secs.max(1.0);
        0.5f64.powf(age / half_life).clamp(0.0, 1.0)
    }

    /// Trust-weighted retrieval score.
    #[must_use]
    pub fn retrieval_score(&self, s: f64, rho: f64, trust: f64, confidence: f64) -> f64 {
        let alpha = self.config.alpha;
        s * rho * (alpha * trust + (1.0 - alpha) * confidence)
    }

    /// Volatility of a belief divergence in `[0, 1]`.
    ///
    /// Weighted blend of drift and misalignment, bumped for recorded
    /// contradictions and fallback provenance.
    #[must_use]
    pub fn compute_volatility(
        &self,
        drift: f64,
        memory_alignment: f64,
        is_contradiction: bool,
        is_fallback: bool,
    ) -> f64 {
        let mut volatility = 0.6 * drift + 0.4 * (1.0 - memory_alignment);
        if is_contradiction {
            volatility += 0.15;
        }
        if is_fallback {
            volatility += 0.1;
        }
        volatility.clamp(0.0, 1.0)
    }

    /// True when volatility warrants queueing a reflection.
    #[must_use]
    pub fn should_reflect(&self, volatility: f64, threshold: f64) -> bool {
        volatility >= threshold
    }

    /// Pre-check: is a claim pair a real contradiction?
    ///
    /// Returns `(false, "paraphrase")` when the normalized slot values are
    /// equal or semantically equivalent, and `(false, "low_drift")` when the
    /// embeddings barely moved. Anything else is a candidate for the
    /// classifier.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn detect_contradiction(
        &self,
        drift: f64,
        _confidence_new: f64,
        _confidence_prior: f64,
        _source: MemorySource,
        text_new: &str,
        text_prior: &str,
        slot: Option<&str>,
        value_new: Option<&str>,
        value_prior: Option<&str>,
    ) -> (bool, &'static str) {
        if let (Some(slot), Some(new), Some(prior)) = (slot, value_new, value_prior) {
            if facts::values_equivalent(slot, new, prior) {
                return (false, "paraphrase");
            }
        }
        let new_trim = text_new.trim().to_lowercase();
        let prior_trim = text_prior.trim().to_lowercase();
        if new_trim == prior_trim {
            return (false, "paraphrase");
        }
        if drift < self.config.drift_floor {
            return (false, "low_drift");
        }
        (true, "drift")
    }

    /// Context-aware contradiction check.
    ///
    /// Disjoint temporal statuses ("I work at X" vs "I used to work at Y")
    /// or disjoint non-general domains (print shop vs programming) mean the
    /// claims can coexist.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn is_true_contradiction_contextual(
        &self,
        _slot: &str,
        value_new: &str,
        value_prior: &str,
        temporal_new: TemporalStatus,
        temporal_prior: TemporalStatus,
        domains_new: &[String],
        domains_prior: &[String],
        _drift: f64,
    ) -> (bool, &'static str) {
        if value_new.trim().to_lowercase() == value_prior.trim().to_lowercase() {
            return (false, "same_value");
        }
        if temporal_new != temporal_prior
            && (temporal_new == TemporalStatus::Past || temporal_prior == TemporalStatus::Past)
        {
            return (false, "temporal_disjoint");
        }
        // `general` is a wildcard: only two specifically-tagged claims can
        // be domain-disjoint (print shop vs programming).
        let new_set: Vec<&str> = domains_new.iter().map(String::as_str).collect();
        let prior_set: Vec<&str> = domains_prior.iter().map(String::as_str).collect();
        let specific = |set: &[&str]| !set.is_empty() && !set.contains(&"general");
        if specific(&new_set) && specific(&prior_set) {
            let overlap = new_set.iter().any(|d| prior_set.contains(d));
            if !overlap {
                return (false, "domain_disjoint");
            }
        }
        (true, "contextual_conflict")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math() -> CrtMath {
        CrtMath::new(TrustConfig::default())
    }

    #[test]
    fn test_similarity_identical_vectors() {
        let v = vec![0.6, 0.8];
        assert!((similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(similarity(&a, &b).abs() < 1e-9);
        assert!((drift_meaning(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_mismatched_lengths() {
        assert!((similarity(&[1.0], &[1.0, 0.0])).abs() < f64::EPSILON);
        assert!((similarity(&[], &[])).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recency_weight_half_life() {
        let m = math();
        let half_life = TrustConfig::default().recency_half_life_secs;
        let now = 1_000_000_000.0;
        assert!((m.recency_weight(now, now) - 1.0).abs() < 1e-9);
        assert!((m.recency_weight(now - half_life, now) - 0.5).abs() < 1e-9);
        // Future timestamps never exceed 1.0.
        assert!((m.recency_weight(now + 100.0, now) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_retrieval_score_weights_trust() {
        let m = math();
        let trusted = m.retrieval_score(0.9, 1.0, 1.0, 0.5);
        let distrusted = m.retrieval_score(0.9, 1.0, 0.1, 0.5);
        assert!(trusted > distrusted);
    }

    #[test]
    fn test_volatility_bounds() {
        let m = math();
        assert!(m.compute_volatility(1.0, 0.0, true, true) <= 1.0);
        assert!(m.compute_volatility(0.0, 1.0, false, false).abs() < 1e-9);
        assert!(m.should_reflect(0.6, 0.5));
        assert!(!m.should_reflect(0.4, 0.5));
    }

    #[test]
    fn test_detect_contradiction_paraphrase_gate() {
        let m = math();
        let (real, reason) = m.detect_contradiction(
            0.3,
            0.95,
            0.95,
            MemorySource::User,
            "I live in SF",
            "I live in San Francisco",
            Some("location"),
            Some("sf"),
            Some("san francisco"),
        );
        assert!(!real);
        assert_eq!(reason, "paraphrase");
    }

    #[test]
    fn test_detect_contradiction_low_drift() {
        let m = math();
        let (real, reason) = m.detect_contradiction(
            0.01,
            0.95,
            0.95,
            MemorySource::User,
            "I work at Microsoft",
            "I am employed at Microsoft Corp",
            None,
            None,
            None,
        );
        assert!(!real);
        assert_eq!(reason, "low_drift");
    }

    #[test]
    fn test_detect_contradiction_real() {
        let m = math();
        let (real, reason) = m.detect_contradiction(
            0.4,
            0.95,
            0.95,
            MemorySource::User,
            "I work at Amazon",
            "I work at Microsoft",
            Some("employer"),
            Some("amazon"),
            Some("microsoft"),
        );
        assert!(real);
        assert_eq!(reason, "drift");
    }

    #[test]
    fn test_contextual_check_temporal_disjoint() {
        let m = math();
        let (real, reason) = m.is_true_contradiction_contextual(
            "employer",
            "amazon",
            "microsoft",
            TemporalStatus::Active,
            TemporalStatus::Past,
            &["general".to_string()],
            &["general".to_string()],
            0.4,
        );
        assert!(!real);
        assert_eq!(reason, "temporal_disjoint");
    }

    #[test]
    fn test_contextual_check_domain_disjoint() {
        let m = math();
        let (real, reason) = m.is_true_contradiction_contextual(
            "title",
            "manager",
            "developer",
            TemporalStatus::Active,
            TemporalStatus::Active,
            &["print_shop".to_string()],
            &["programming".to_string()],
            0.4,
        );
        assert!(!real);
        assert_eq!(reason, "domain_disjoint");
    }

    #[test]
    fn test_contextual_check_true_conflict() {
        let m = math();
        let (real, _) = m.is_true_contradiction_contextual(
            "employer",
            "amazon",
            "microsoft",
            TemporalStatus::Active,
            TemporalStatus::Active,
            &["general".to_string()],
            &["general".to_string()],
            0.4,
        );
        assert!(real);
    }
}
