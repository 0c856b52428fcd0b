//! Configuration management.
//!
//! All knobs are plain struct fields with safe defaults; nothing is read
//! from hidden globals. The only environment variable recognized is
//! `CRT_LEARNED_MODEL_PATH` (optional suggestion model file for the external
//! training loop).

use std::path::PathBuf;

/// Main configuration for the memory engine.
#[derive(Debug, Clone)]
pub struct CrtConfig {
    /// Directory holding the per-thread store files.
    pub data_dir: PathBuf,
    /// Embedding vector dimension (fixed-width blobs in storage).
    pub embedding_dim: usize,
    /// Trust and retrieval-scoring parameters.
    pub trust: TrustConfig,
    /// Reconstruction gate thresholds.
    pub gate: GateConfig,
    /// Disclosure policy thresholds and budget.
    pub disclosure: DisclosureConfig,
    /// Contradiction lifecycle windows.
    pub lifecycle: LifecycleConfig,
    /// Fact extraction settings.
    pub facts: FactConfig,
    /// Retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Reasoner call budget in milliseconds.
    pub reasoner_timeout_ms: u64,
    /// Volatility above which a contradiction is queued for reflection.
    pub reflect_threshold: f64,
    /// Optional path to a learned suggestion model (`CRT_LEARNED_MODEL_PATH`).
    ///
    /// The model itself is external; when set but unusable the orchestrator
    /// degrades with `suggestions_unavailable`.
    pub learned_model_path: Option<PathBuf>,
}

impl Default for CrtConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./crtmem_data"),
            embedding_dim: 256,
            trust: TrustConfig::default(),
            gate: GateConfig::default(),
            disclosure: DisclosureConfig::default(),
            lifecycle: LifecycleConfig::default(),
            facts: FactConfig::default(),
            retrieval: RetrievalConfig::default(),
            reasoner_timeout_ms: 5_000,
            reflect_threshold: 0.5,
            learned_model_path: std::env::var("CRT_LEARNED_MODEL_PATH")
                .ok()
                .map(PathBuf::from),
        }
    }
}

/// Trust evolution and retrieval-scoring parameters.
///
/// The retrieval weight is `alpha * trust + (1 - alpha) * confidence`;
/// trust evolves with a saturating step so it stays in `[0, 1]` without
/// clamping artifacts.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Weight of trust vs confidence in the retrieval score.
    pub alpha: f64,
    /// Saturating increase rate on gate-passing alignment.
    pub rate_up: f64,
    /// Saturating decrease rate on hard contradiction.
    pub rate_down: f64,
    /// Recency half-life in seconds (default 30 days).
    pub recency_half_life_secs: f64,
    /// Drift below which a pair is never a contradiction.
    pub drift_floor: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            rate_up: 0.05,
            rate_down: 0.15,
            recency_half_life_secs: 30.0 * 86_400.0,
            drift_floor: 0.05,
        }
    }
}

/// Reconstruction gate thresholds.
///
/// Factual responses face the strictest grounding requirement,
/// conversational the loosest.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Grounding threshold for factual responses.
    pub grounding_factual: f64,
    /// Grounding threshold for explanatory responses.
    pub grounding_explanatory: f64,
    /// Grounding threshold for conversational responses.
    pub grounding_conversational: f64,
    /// Memory alignment threshold for factual responses.
    pub memory_factual: f64,
    /// Memory alignment threshold for explanatory responses.
    pub memory_explanatory: f64,
    /// Memory alignment threshold for conversational responses.
    pub memory_conversational: f64,
    /// Intent alignment threshold (all response types).
    pub intent_threshold: f64,
    /// Confidence cap applied on hard gate failures.
    pub hard_fail_cap: f64,
    /// Confidence cap applied on soft gate failures.
    pub soft_fail_cap: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            grounding_factual: 0.6,
            grounding_explanatory: 0.45,
            grounding_conversational: 0.25,
            memory_factual: 0.4,
            memory_explanatory: 0.3,
            memory_conversational: 0.15,
            intent_threshold: 0.3,
            hard_fail_cap: 0.49,
            soft_fail_cap: 0.69,
        }
    }
}

/// Disclosure policy calibration.
#[derive(Debug, Clone)]
pub struct DisclosureConfig {
    /// Below this validity probability the new claim is rejected (red zone).
    pub low_threshold: f64,
    /// At or above this probability the new claim is accepted (green zone).
    pub high_threshold: f64,
    /// Maximum CLARIFY actions per session before the budget is exhausted.
    pub max_clarifications_per_session: u32,
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.33,
            high_threshold: 0.67,
            max_clarifications_per_session: 3,
        }
    }
}

/// Contradiction lifecycle windows and confirmation thresholds.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Freshness window in seconds (default 7 days).
    pub freshness_window_secs: f64,
    /// Days after which a settled contradiction is archived.
    pub archive_days: f64,
    /// Confirmations needed for ACTIVE to SETTLING.
    pub settling_confirmations: u32,
    /// Confirmations needed for SETTLING to SETTLED.
    pub settled_confirmations: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 7.0 * 86_400.0,
            archive_days: 30.0,
            settling_confirmations: 2,
            settled_confirmations: 5,
        }
    }
}

/// Fact extraction settings.
#[derive(Debug, Clone)]
pub struct FactConfig {
    /// LRU cache capacity for extraction results.
    pub cache_capacity: usize,
    /// Texts longer than this are extracted but never cached.
    pub max_cacheable_len: usize,
    /// Whether the open `(attribute, value)` tier is enabled.
    pub open_tuples_enabled: bool,
}

impl Default for FactConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1_000,
            max_cacheable_len: 10_000,
            open_tuples_enabled: true,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Default number of memories returned per query.
    pub default_k: usize,
    /// Broader k used for synthesis queries.
    pub synthesis_k: usize,
    /// Minimum trust for retrieval candidates.
    pub min_trust: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            synthesis_k: 12,
            min_trust: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = CrtConfig::default();
        assert!(config.trust.alpha > 0.0 && config.trust.alpha < 1.0);
        assert!(config.disclosure.low_threshold < config.disclosure.high_threshold);
        assert!(config.gate.grounding_factual > config.gate.grounding_conversational);
        assert!(config.lifecycle.settling_confirmations < config.lifecycle.settled_confirmations);
        assert_eq!(config.embedding_dim, 256);
    }
}
