//! # Crtmem
//!
//! A coherence-preserving personal memory engine for conversational agents.
//!
//! Crtmem accepts a stream of user utterances and agent responses, maintains
//! a durable store of trust-weighted claims about the user, detects when new
//! claims conflict with older ones, and gates responses so the agent cannot
//! assert facts that its own record contradicts.
//!
//! ## Subsystems
//!
//! - Trust-weighted memory store (per-thread, SQLite-backed)
//! - Append-only contradiction ledger with lifecycle states
//! - Reconstruction gate (belief vs low-trust speech)
//! - Deterministic query orchestrator with mandatory caveat enforcement
//!
//! ## Example
//!
//! ```rust,ignore
//! use crtmem::{CrtEngine, CrtConfig};
//!
//! let engine = CrtEngine::new(CrtConfig::default())?;
//! let result = engine.query("I work at Microsoft as a senior developer.", "default")?;
//! assert!(result.gates_passed);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod anchor;
pub mod config;
pub mod crt;
pub mod disclosure;
pub mod embedding;
mod engine;
pub mod facts;
pub mod gate;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod profile;
pub mod reasoner;
pub mod resolution;
pub mod store;

// Re-exports for convenience
pub use config::CrtConfig;
pub use embedding::Embedder;
pub use engine::{CrtEngine, CrtStatus};
pub use ledger::ContradictionLedger;
pub use models::{
    ContradictionEntry, ContradictionStatus, ContradictionType, EvidencePacket, ExtractedFact,
    LifecycleState, MemoryItem, MemorySource, QueryResult, ResponseType, SemanticAnchor, SseMode,
    TemporalStatus,
};
pub use reasoner::Reasoner;
pub use store::MemoryStore;

/// Error type for crtmem operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Validation` | Empty text, out-of-range confidence, malformed input |
/// | `Storage` | Durable `SQLite` writes fail; callers may retry |
/// | `NotFound` | Memory or ledger id does not exist |
/// | `AlreadyResolved` | Resolving a ledger entry that is already closed |
/// | `DanglingReference` | Resolution or record references a missing memory id |
/// | `Embedding` | Encoder failed; caller should retry or degrade |
/// | `ReasonerTimeout` | Reasoner exceeded its budget; the turn degrades to speech |
/// | `Reasoner` | Reasoner returned malformed output; same degradation |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed input was provided.
    ///
    /// Raised when:
    /// - Query or memory text is empty
    /// - A confidence or trust value is outside `[0, 1]`
    /// - A status or method string is not in its closed set
    #[error("validation failed: {0}")]
    Validation(String),

    /// A durable write or read failed.
    ///
    /// Raised when:
    /// - `SQLite` operations on the memory or ledger store fail
    /// - The backing file cannot be opened or initialized
    ///
    /// The operation is aborted; the caller may retry.
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A memory or ledger id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A ledger entry was already resolved.
    #[error("already resolved: {0}")]
    AlreadyResolved(String),

    /// A resolution or record references a memory that does not exist.
    #[error("dangling reference: {0}")]
    DanglingReference(String),

    /// Embedding generation failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The reasoner did not return within its budget.
    ///
    /// The orchestrator degrades to the FALLBACK speech path for the turn.
    #[error("reasoner timed out after {budget_ms}ms")]
    ReasonerTimeout {
        /// The configured budget in milliseconds.
        budget_ms: u64,
    },

    /// The reasoner returned malformed output.
    #[error("reasoner failed: {0}")]
    Reasoner(String),
}

/// Result type alias for crtmem operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds (sub-second precision).
///
/// Memory and ledger timestamps are epoch seconds as `f64`; per-store
/// monotonicity is enforced by the stores themselves, not here. Falls back
/// to 0.0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("empty text".to_string());
        assert_eq!(err.to_string(), "validation failed: empty text");

        let err = Error::Storage {
            operation: "record_contradiction".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "storage operation 'record_contradiction' failed: disk full"
        );

        let err = Error::ReasonerTimeout { budget_ms: 5000 };
        assert_eq!(err.to_string(), "reasoner timed out after 5000ms");
    }

    #[test]
    fn test_current_timestamp_is_positive() {
        assert!(current_timestamp() > 0.0);
    }
}
