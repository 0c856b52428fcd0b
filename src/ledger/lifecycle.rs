//! Contradiction lifecycle state machine.
//!
//! Flow: ACTIVE -> SETTLING -> SETTLED -> ARCHIVED, driven by user
//! confirmations and age. Transitions are monotonic; ARCHIVED is terminal.

use crate::config::LifecycleConfig;
use crate::models::{LifecycleInfo, LifecycleState};

/// Evaluates lifecycle transitions for ledger entries.
#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    config: LifecycleConfig,
}

impl LifecycleEngine {
    /// Creates the engine from lifecycle configuration.
    #[must_use]
    pub const fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    /// Computes the state an entry should be in at `now`.
    ///
    /// - ACTIVE -> SETTLING on enough confirmations or past the freshness
    ///   window
    /// - SETTLING -> SETTLED on more confirmations or past twice the window
    /// - SETTLED -> ARCHIVED past the archive age
    ///
    /// Returns the unchanged state when no transition applies. A single
    /// call advances at most one step; the per-turn sweep reaches steady
    /// state over successive turns.
    #[must_use]
    pub fn next_state(&self, info: &LifecycleInfo, now: f64) -> LifecycleState {
        let age = now - info.detected_at;
        match info.state {
            LifecycleState::Active => {
                if info.confirmation_count >= self.config.settling_confirmations
                    || age > self.config.freshness_window_secs
                {
                    LifecycleState::Settling
                } else {
                    LifecycleState::Active
                }
            },
            LifecycleState::Settling => {
                if info.confirmation_count >= self.config.settled_confirmations
                    || age > self.config.freshness_window_secs * 2.0
                {
                    LifecycleState::Settled
                } else {
                    LifecycleState::Settling
                }
            },
            LifecycleState::Settled => {
                if age > self.config.archive_days * 86_400.0 {
                    LifecycleState::Archived
                } else {
                    LifecycleState::Settled
                }
            },
            LifecycleState::Archived => LifecycleState::Archived,
        }
    }
}
