//! Reasoner abstraction.
//!
//! The engine never generates natural language itself; it calls out to a
//! pluggable [`Reasoner`]. The deterministic [`StubReasoner`] answers from
//! the resolved FACT context and is used in tests and offline runs.

mod stub;

pub use stub::StubReasoner;

use crate::{Error, Result};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

/// A retrieved document handed to the reasoner.
#[derive(Debug, Clone)]
pub struct RetrievedDoc {
    /// Document text.
    pub text: String,
    /// Trust of the backing memory.
    pub trust: f64,
    /// Confidence of the backing memory.
    pub confidence: f64,
    /// Provenance label.
    pub source: String,
    /// Backing memory id, when the doc is a real memory.
    pub memory_id: Option<String>,
}

/// Context assembled by the orchestrator for one reasoner call.
#[derive(Debug, Clone, Default)]
pub struct ReasonerContext {
    /// Retrieved documents, best first.
    pub retrieved_docs: Vec<RetrievedDoc>,
    /// Open contradiction summaries relevant to the query.
    pub contradictions: Vec<String>,
    /// Resolved `FACT: slot = value` lines plus raw continuity lines.
    pub memory_context: Vec<String>,
}

/// One reasoner response.
#[derive(Debug, Clone)]
pub struct ReasonerOutput {
    /// The candidate answer.
    pub answer: String,
    /// Optional reasoning trace.
    pub thinking: Option<String>,
    /// Mode the reasoner ran in.
    pub mode: String,
    /// Raw self-reported confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Trait for generative reasoners.
///
/// Pure from the engine's perspective: same query + context, same answer.
pub trait Reasoner: Send + Sync {
    /// The reasoner name.
    fn name(&self) -> &'static str;

    /// Produces a candidate answer for a query given memory context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reasoner`] on malformed output or internal failure.
    fn reason(&self, query: &str, context: &ReasonerContext, mode: &str) -> Result<ReasonerOutput>;
}

/// Runs a reasoner call with a wall-clock budget.
///
/// The call runs on a background thread; on timeout the result is
/// discarded and the thread completes naturally (threads cannot be
/// killed), while the caller degrades to the fallback speech path.
///
/// # Errors
///
/// Returns [`Error::ReasonerTimeout`] past the budget and propagates
/// [`Error::Reasoner`] failures from the call itself.
pub fn reason_with_timeout(
    reasoner: Arc<dyn Reasoner>,
    query: &str,
    context: &ReasonerContext,
    mode: &str,
    budget_ms: u64,
) -> Result<ReasonerOutput> {
    let (tx, rx) = mpsc::channel();
    let query = query.to_string();
    let context = context.clone();
    let mode = mode.to_string();

    std::thread::spawn(move || {
        let result = reasoner.reason(&query, &context, &mode);
        // Receiver may be gone after a timeout; that is expected.
        let _ = tx.send(result);
    });

    match rx.recv_timeout(Duration::from_millis(budget_ms)) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            metrics::counter!("reasoner_timeouts_total").increment(1);
            tracing::warn!(budget_ms, "reasoner timed out, degrading to speech");
            Err(Error::ReasonerTimeout { budget_ms })
        },
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(Error::Reasoner("reasoner thread terminated abnormally".to_string()))
        },
    }
}
