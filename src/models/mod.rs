//! Data models for crtmem.
//!
//! This module contains all the core data structures used throughout the
//! engine: durable memories, ledger entries, anchors, evidence packets, and
//! the structured per-turn result.

mod anchor;
mod contradiction;
mod evidence;
mod fact;
mod memory;
mod result;

pub use anchor::{ExpectedAnswerType, ResolutionDecision, SemanticAnchor};
pub use contradiction::{
    ContradictionEntry, ContradictionStatus, ContradictionType, ContradictionView, LifecycleInfo,
    LifecycleState, ReflectionItem, ReflectionPriority, ResolutionMethod, WorklogEntry,
};
pub use evidence::{Citation, EvidencePacket};
pub use fact::ExtractedFact;
pub use memory::{MemoryItem, MemorySource, SseMode, TemporalStatus, TrustLogEntry};
pub use result::{QueryResult, ResponseType, RetrievedMemory};
