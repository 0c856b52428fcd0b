//! Contradiction ledger entry types and closed enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolution status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContradictionStatus {
    /// Unresolved tension.
    #[default]
    Open,
    /// Reflection in progress.
    Reflecting,
    /// Closed via an explicit resolution.
    Resolved,
    /// Both sides kept as valid perspectives.
    Accepted,
}

impl ContradictionStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Reflecting => "reflecting",
            Self::Resolved => "resolved",
            Self::Accepted => "accepted",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "reflecting" => Some(Self::Reflecting),
            "resolved" => Some(Self::Resolved),
            "accepted" => Some(Self::Accepted),
            _ => None,
        }
    }

    /// True if the entry is closed (no further resolution allowed).
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Resolved | Self::Accepted)
    }
}

impl fmt::Display for ContradictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a claim pair based on fact topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContradictionType {
    /// New information is more specific (Seattle to Bellevue).
    Refinement,
    /// Explicit correction ("actually", "I meant", "not X").
    Revision,
    /// Time-based progression (Senior to Principal).
    Temporal,
    /// Mutually exclusive facts (Microsoft vs Amazon).
    #[default]
    Conflict,
}

impl ContradictionType {
    /// Returns the type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Refinement => "refinement",
            Self::Revision => "revision",
            Self::Temporal => "temporal",
            Self::Conflict => "conflict",
        }
    }

    /// Parses a type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "refinement" => Some(Self::Refinement),
            "revision" => Some(Self::Revision),
            "temporal" => Some(Self::Temporal),
            "conflict" => Some(Self::Conflict),
            _ => None,
        }
    }

    /// True if this type may reduce trust of the older memory.
    ///
    /// Refinements and temporal progressions are recorded but never punish
    /// the older claim.
    #[must_use]
    pub const fn may_reduce_trust(&self) -> bool {
        matches!(self, Self::Conflict | Self::Revision)
    }
}

impl fmt::Display for ContradictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a contradiction.
///
/// Flow: ACTIVE -> SETTLING -> SETTLED -> ARCHIVED. Transitions are
/// monotonic; ARCHIVED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Just detected; disclosure is required.
    #[default]
    Active,
    /// Evidence accumulating; the user has seen it.
    Settling,
    /// Resolved implicitly through repeated use.
    Settled,
    /// Historical; no longer disclosed.
    Archived,
}

impl LifecycleState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Settling => "settling",
            Self::Settled => "settled",
            Self::Archived => "archived",
        }
    }

    /// Parses a state from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "settling" => Some(Self::Settling),
            "settled" => Some(Self::Settled),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Ordering rank used to enforce monotonic transitions.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Settling => 1,
            Self::Settled => 2,
            Self::Archived => 3,
        }
    }
}

/// Legal resolution methods for a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Reflected and merged into a new belief.
    ReflectionMerge,
    /// Both sides kept as valid perspectives.
    AcceptBoth,
    /// Old memory deprecated, new preferred.
    DeprecateOld,
    /// New memory deprecated, old preferred.
    DeprecateNew,
    /// User answered a clarification prompt.
    UserClarified,
    /// Resolved from a natural-language resolution statement.
    NlResolution,
    /// User explicitly chose the older claim.
    UserChoseOld,
    /// User explicitly chose the newer claim.
    UserChoseNew,
    /// Both true at different times.
    BothTrueTemporal,
    /// Neither side was correct.
    BothWrong,
}

impl ResolutionMethod {
    /// Returns the method as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReflectionMerge => "reflection_merge",
            Self::AcceptBoth => "accept_both",
            Self::DeprecateOld => "deprecate_old",
            Self::DeprecateNew => "deprecate_new",
            Self::UserClarified => "user_clarified",
            Self::NlResolution => "nl_resolution",
            Self::UserChoseOld => "user_chose_old",
            Self::UserChoseNew => "user_chose_new",
            Self::BothTrueTemporal => "both_true_temporal",
            Self::BothWrong => "both_wrong",
        }
    }

    /// Parses a method from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reflection_merge" => Some(Self::ReflectionMerge),
            "accept_both" => Some(Self::AcceptBoth),
            "deprecate_old" => Some(Self::DeprecateOld),
            "deprecate_new" => Some(Self::DeprecateNew),
            "user_clarified" => Some(Self::UserClarified),
            "nl_resolution" => Some(Self::NlResolution),
            "user_chose_old" => Some(Self::UserChoseOld),
            "user_chose_new" => Some(Self::UserChoseNew),
            "both_true_temporal" => Some(Self::BothTrueTemporal),
            "both_wrong" => Some(Self::BothWrong),
            _ => None,
        }
    }

    /// True if the method closes the entry without referencing a winner.
    #[must_use]
    pub const fn is_winnerless(&self) -> bool {
        matches!(self, Self::AcceptBoth | Self::BothWrong | Self::BothTrueTemporal)
    }
}

/// A contradiction ledger entry.
///
/// Entries are append-only: after creation only `status`, the
/// `resolution_*` fields, the lifecycle counters, and `metadata` change.
/// `old`/`new` reflect discovery order, not truth.
#[derive(Debug, Clone)]
pub struct ContradictionEntry {
    /// Opaque unique identifier (`contra_<uuid>`).
    pub ledger_id: String,
    /// Detection time, epoch seconds.
    pub timestamp: f64,
    /// Earlier-discovered memory id.
    pub old_memory_id: String,
    /// Later-discovered memory id.
    pub new_memory_id: String,
    /// Meaning drift: `1 - cosine(old, new)`.
    pub drift_mean: f64,
    /// Optional reasoning drift.
    pub drift_reason: Option<f64>,
    /// Confidence delta (old minus new).
    pub confidence_delta: f64,
    /// Resolution status.
    pub status: ContradictionStatus,
    /// Classification.
    pub contradiction_type: ContradictionType,
    /// Comma-joined slot names the tension affects (e.g. `employer,location`).
    pub affects_slots: Option<String>,
    /// Query that surfaced the tension, if any.
    pub query: Option<String>,
    /// Natural-language summary.
    pub summary: Option<String>,
    /// When the entry was resolved, epoch seconds.
    pub resolution_timestamp: Option<f64>,
    /// How the entry was resolved.
    pub resolution_method: Option<ResolutionMethod>,
    /// Memory referenced by the resolution (winner or merge result).
    pub merged_memory_id: Option<String>,
    /// Free-form metadata (suggested policy, clarification prompt, anchor).
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ContradictionEntry {
    /// Returns the affected slots as a set-like vector.
    #[must_use]
    pub fn affected_slot_list(&self) -> Vec<String> {
        self.affects_slots
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if the entry affects any of the given slots.
    #[must_use]
    pub fn affects_any(&self, slots: &[String]) -> bool {
        let affected = self.affected_slot_list();
        affected.iter().any(|s| slots.contains(s))
    }
}

/// Lifecycle tracking row for a ledger entry.
#[derive(Debug, Clone)]
pub struct LifecycleInfo {
    /// The ledger entry this row tracks.
    pub ledger_id: String,
    /// Current lifecycle state.
    pub state: LifecycleState,
    /// When the contradiction was detected, epoch seconds.
    pub detected_at: f64,
    /// When the entry settled, if it has.
    pub settled_at: Option<f64>,
    /// When the entry was archived, if it has been.
    pub archived_at: Option<f64>,
    /// How many times the user re-asserted the new-side fact.
    pub confirmation_count: u32,
    /// How many times the tension was disclosed.
    pub disclosure_count: u32,
    /// Last time the tension was mentioned either way.
    pub last_mentioned: f64,
}

/// Priority bucket for queued reflections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionPriority {
    /// Volatility at or above 0.7.
    High,
    /// Volatility in `[0.4, 0.7)`.
    Medium,
    /// Everything else.
    Low,
}

impl ReflectionPriority {
    /// Buckets a volatility value.
    #[must_use]
    pub fn from_volatility(volatility: f64) -> Self {
        if volatility >= 0.7 {
            Self::High
        } else if volatility >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Returns the priority as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parses a priority from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Ordering rank (high first).
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

/// A queued reflection item.
#[derive(Debug, Clone)]
pub struct ReflectionItem {
    /// Queue row id.
    pub queue_id: i64,
    /// When the reflection was queued, epoch seconds.
    pub timestamp: f64,
    /// The ledger entry to reflect on.
    pub ledger_id: String,
    /// Volatility that triggered the queueing.
    pub volatility: f64,
    /// Priority bucket.
    pub priority: ReflectionPriority,
    /// Optional JSON context captured at queue time.
    pub context: Option<serde_json::Value>,
    /// Whether the reflection has been processed.
    pub processed: bool,
}

/// Per-ledger-id clarification worklog counters.
#[derive(Debug, Clone, Default)]
pub struct WorklogEntry {
    /// When the user was first asked about this tension.
    pub first_asked_at: Option<f64>,
    /// When the user was most recently asked.
    pub last_asked_at: Option<f64>,
    /// How many times the user has been asked.
    pub ask_count: u32,
    /// The most recent user answer, if any.
    pub last_user_answer: Option<String>,
    /// When the most recent answer arrived.
    pub last_user_answer_at: Option<f64>,
}

/// Flattened contradiction view exposed to outer layers (UIs, dashboards).
///
/// Internal ids stay opaque; the alias fields mirror the wire format the
/// outer layers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionView {
    /// Ledger id.
    pub ledger_id: String,
    /// Alias of `ledger_id`.
    pub contradiction_id: String,
    /// Detection time, epoch seconds.
    pub timestamp: f64,
    /// Alias of `timestamp`.
    pub detected_at: f64,
    /// Resolution status.
    pub status: String,
    /// Classification.
    pub contradiction_type: String,
    /// Meaning drift.
    pub drift_mean: f64,
    /// Confidence delta.
    pub confidence_delta: f64,
    /// Natural-language summary.
    pub summary: Option<String>,
    /// Originating query.
    pub query: Option<String>,
    /// Older memory id.
    pub old_memory_id: String,
    /// Newer memory id.
    pub new_memory_id: String,
    /// Primary affected slot, if any.
    pub slot: Option<String>,
    /// Older slot value, if known.
    pub old_value: Option<String>,
    /// Newer slot value, if known.
    pub new_value: Option<String>,
    /// Trust of the older memory at view time.
    pub old_trust: Option<f64>,
    /// Trust of the newer memory at view time.
    pub new_trust: Option<f64>,
    /// Suggested policy from the disclosure decision, if recorded.
    pub policy: Option<String>,
}
