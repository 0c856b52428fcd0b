//! Engine surface: per-thread composition of store, ledger, and
//! orchestrator.
//!
//! One logical conversation (thread id) maps to one memory store and one
//! ledger, each backed by its own durable file; turns within a thread are
//! serialized, threads run independently.

use crate::config::CrtConfig;
use crate::embedding::{Embedder, HashEmbedder};
use crate::facts::FactExtractor;
use crate::ledger::{ContradictionLedger, ContradictionStats};
use crate::models::{
    ContradictionEntry, ContradictionStatus, ContradictionView, EvidencePacket, MemoryItem,
    MemorySource, QueryResult, ReflectionItem, ResolutionDecision, ResolutionMethod, TrustLogEntry,
};
use crate::orchestrator::Orchestrator;
use crate::profile::GlobalUserProfile;
use crate::reasoner::{Reasoner, StubReasoner};
use crate::store::{MemoryStore, RetrievalRequest};
use crate::{Error, Result, facts};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Aggregate engine status for one thread.
#[derive(Debug, Clone)]
pub struct CrtStatus {
    /// Total memories stored (including deprecated).
    pub total_memories: u64,
    /// Deprecated memories.
    pub deprecated_memories: u64,
    /// Gate-passing belief turns.
    pub belief_count: u64,
    /// Gate-failing speech turns.
    pub speech_count: u64,
    /// Belief-to-speech ratio (beliefs when no speech yet).
    pub belief_speech_ratio: f64,
    /// Open ledger entries.
    pub open_contradictions: usize,
    /// Open hard conflicts.
    pub hard_conflicts: usize,
    /// Unprocessed reflection queue items.
    pub reflection_queue_size: usize,
}

struct ThreadState {
    store: Arc<MemoryStore>,
    ledger: Arc<ContradictionLedger>,
    orchestrator: Orchestrator,
    turn_lock: Mutex<()>,
}

/// The coherence-preserving memory engine.
///
/// Owns the per-process singletons (fact-extraction cache, global user
/// profile) and a registry of per-thread states; everything else is passed
/// by reference into the orchestrators.
pub struct CrtEngine {
    config: CrtConfig,
    embedder: Arc<dyn Embedder>,
    reasoner: Arc<dyn Reasoner>,
    extractor: Arc<FactExtractor>,
    profile: Arc<GlobalUserProfile>,
    threads: Mutex<HashMap<String, Arc<ThreadState>>>,
}

impl CrtEngine {
    /// Creates an engine with the built-in hash embedder and stub reasoner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the data directory or profile snapshot
    /// cannot be prepared.
    pub fn new(config: CrtConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> =
            Arc::new(HashEmbedder::with_dimensions(config.embedding_dim));
        Self::with_components(config, embedder, Arc::new(StubReasoner::new()))
    }

    /// Creates an engine with explicit embedder and reasoner
    /// implementations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the data directory or profile snapshot
    /// cannot be prepared.
    pub fn with_components(
        config: CrtConfig,
        embedder: Arc<dyn Embedder>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| Error::Storage {
            operation: "create_data_dir".to_string(),
            cause: e.to_string(),
        })?;
        let profile = Arc::new(GlobalUserProfile::load(config.data_dir.join("profile.json"))?);
        let extractor = Arc::new(FactExtractor::new(&config.facts));
        Ok(Self {
            config,
            embedder,
            reasoner,
            extractor,
            profile,
            threads: Mutex::new(HashMap::new()),
        })
    }

    fn sanitize_thread_id(thread_id: &str) -> String {
        let cleaned: String = thread_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if cleaned.is_empty() { "default".to_string() } else { cleaned }
    }

    fn thread(&self, thread_id: &str) -> Result<Arc<ThreadState>> {
        let key = Self::sanitize_thread_id(thread_id);
        let mut threads = self.threads.lock().map_err(|_| Error::Storage {
            operation: "thread_registry".to_string(),
            cause: "registry lock poisoned".to_string(),
        })?;
        if let Some(state) = threads.get(&key) {
            return Ok(Arc::clone(state));
        }

        let store = Arc::new(MemoryStore::new(
            self.config.data_dir.join(format!("{key}_memory.db")),
            Arc::clone(&self.embedder),
            self.config.trust.clone(),
        )?);
        let ledger = Arc::new(ContradictionLedger::new(
            self.config.data_dir.join(format!("{key}_ledger.db")),
            self.config.lifecycle.clone(),
        )?);
        let orchestrator = Orchestrator::new(
            self.config.clone(),
            Arc::clone(&self.extractor),
            Arc::clone(&self.profile),
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&self.embedder),
            Arc::clone(&self.reasoner),
            key.clone(),
        );
        let state = Arc::new(ThreadState {
            store,
            ledger,
            orchestrator,
            turn_lock: Mutex::new(()),
        });
        threads.insert(key, Arc::clone(&state));
        Ok(state)
    }

    /// Runs the full per-turn pipeline for one user input on a thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty input and [`Error::Storage`]
    /// when durable writes fail; reasoner failures degrade inside the turn.
    pub fn query(&self, user_query: &str, thread_id: &str) -> Result<QueryResult> {
        self.query_with_options(user_query, thread_id, false, None)
    }

    /// [`query`](Self::query) with the importance flag and reasoner mode.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn query_with_options(
        &self,
        user_query: &str,
        thread_id: &str,
        user_marked_important: bool,
        mode: Option<&str>,
    ) -> Result<QueryResult> {
        let state = self.thread(thread_id)?;
        // One orchestrator call at a time per thread.
        let _turn = state.turn_lock.lock().map_err(|_| Error::Storage {
            operation: "turn_lock".to_string(),
            cause: "turn lock poisoned".to_string(),
        })?;
        state.orchestrator.query(user_query, user_marked_important, mode)
    }

    /// Trust-weighted retrieval without running a turn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn retrieve(
        &self,
        thread_id: &str,
        query: &str,
        k: usize,
        min_trust: f64,
        include_system: bool,
        include_fallback: bool,
    ) -> Result<Vec<(MemoryItem, f64)>> {
        let state = self.thread(thread_id)?;
        let mut allowed_sources = vec![MemorySource::User, MemorySource::External];
        if include_system {
            allowed_sources.push(MemorySource::System);
        }
        if include_fallback {
            allowed_sources.push(MemorySource::Fallback);
        }
        state.store.retrieve_memories(&RetrievalRequest {
            query: query.to_string(),
            k,
            min_trust,
            allowed_sources,
            ..Default::default()
        })
    }

    /// Loads a memory by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_memory_by_id(&self, thread_id: &str, memory_id: &str) -> Result<Option<MemoryItem>> {
        self.thread(thread_id)?.store.get_memory_by_id(memory_id)
    }

    /// Trust history for a memory, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_trust_history(&self, thread_id: &str, memory_id: &str) -> Result<Vec<TrustLogEntry>> {
        self.thread(thread_id)?.store.get_trust_history(memory_id)
    }

    /// Open ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_open_contradictions(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<ContradictionEntry>> {
        self.thread(thread_id)?.ledger.get_open_contradictions(limit)
    }

    /// Resolved ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_resolved_contradictions(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<ContradictionEntry>> {
        self.thread(thread_id)?.ledger.get_resolved_contradictions(limit)
    }

    /// Flattened contradiction views for outer layers (UIs, dashboards).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_contradiction_views(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<ContradictionView>> {
        let state = self.thread(thread_id)?;
        let entries = state.ledger.get_open_contradictions(limit)?;
        entries.iter().map(|entry| Self::build_view(&state, entry)).collect()
    }

    fn build_view(state: &ThreadState, entry: &ContradictionEntry) -> Result<ContradictionView> {
        let slot = entry.affected_slot_list().first().cloned();
        let old_mem = state.store.get_memory_by_id(&entry.old_memory_id)?;
        let new_mem = state.store.get_memory_by_id(&entry.new_memory_id)?;
        let value_of = |memory: &Option<MemoryItem>| {
            slot.as_deref().and_then(|s| {
                memory
                    .as_ref()
                    .and_then(|m| facts::extract_all_facts(&m.text).remove(s))
                    .map(|f| f.raw_value)
            })
        };
        Ok(ContradictionView {
            ledger_id: entry.ledger_id.clone(),
            contradiction_id: entry.ledger_id.clone(),
            timestamp: entry.timestamp,
            detected_at: entry.timestamp,
            status: entry.status.as_str().to_string(),
            contradiction_type: entry.contradiction_type.as_str().to_string(),
            drift_mean: entry.drift_mean,
            confidence_delta: entry.confidence_delta,
            summary: entry.summary.clone(),
            query: entry.query.clone(),
            old_memory_id: entry.old_memory_id.clone(),
            new_memory_id: entry.new_memory_id.clone(),
            slot: slot.clone(),
            old_value: value_of(&old_mem),
            new_value: value_of(&new_mem),
            old_trust: old_mem.map(|m| m.trust),
            new_trust: new_mem.map(|m| m.trust),
            policy: entry
                .metadata
                .as_ref()
                .and_then(|m| m.get("suggested_policy"))
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
        })
    }

    /// True when the memory is referenced by any open ledger entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn has_open_contradiction(&self, thread_id: &str, memory_id: &str) -> Result<bool> {
        self.thread(thread_id)?.ledger.has_open_contradiction(memory_id)
    }

    /// Resolves a ledger entry with validation of the resolution grounding.
    ///
    /// `user_chose_old` / `user_chose_new` must reference the matching
    /// memory id; a merged memory must exist unless the method is
    /// winnerless (`accept_both`, `both_wrong`, `both_true_temporal`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for unknown methods or mismatched ids,
    /// [`Error::DanglingReference`] when the referenced memory is missing,
    /// [`Error::NotFound`] / [`Error::AlreadyResolved`] from the ledger.
    pub fn resolve_contradiction(
        &self,
        thread_id: &str,
        ledger_id: &str,
        method: &str,
        merged_memory_id: Option<&str>,
        new_status: Option<&str>,
    ) -> Result<ContradictionEntry> {
        let state = self.thread(thread_id)?;
        let method = ResolutionMethod::parse(method)
            .ok_or_else(|| Error::Validation(format!("unknown resolution method '{method}'")))?;
        let status = match new_status {
            None => ContradictionStatus::Resolved,
            Some(s) => ContradictionStatus::parse(s)
                .ok_or_else(|| Error::Validation(format!("unknown status '{s}'")))?,
        };

        let entry = state
            .ledger
            .get_contradiction(ledger_id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {ledger_id}")))?;

        if let Some(merged) = merged_memory_id {
            if !method.is_winnerless() && state.store.get_memory_by_id(merged)?.is_none() {
                return Err(Error::DanglingReference(format!("memory {merged}")));
            }
        }
        match method {
            ResolutionMethod::UserChoseOld => {
                if merged_memory_id != Some(entry.old_memory_id.as_str()) {
                    return Err(Error::Validation(
                        "user_chose_old must reference the old memory id".to_string(),
                    ));
                }
            },
            ResolutionMethod::UserChoseNew => {
                if merged_memory_id != Some(entry.new_memory_id.as_str()) {
                    return Err(Error::Validation(
                        "user_chose_new must reference the new memory id".to_string(),
                    ));
                }
            },
            ResolutionMethod::ReflectionMerge => {
                if merged_memory_id.is_none() {
                    return Err(Error::Validation(
                        "reflection_merge requires a merged memory id".to_string(),
                    ));
                }
            },
            _ => {},
        }

        let resolved =
            state.ledger.resolve_contradiction(ledger_id, method, merged_memory_id, status)?;

        // Side effects: the losing side of an explicit choice is retired.
        let deprecate = |id: &str| {
            if let Err(e) = state
                .store
                .deprecate_memory(id, &format!("resolution {} of {ledger_id}", method.as_str()))
            {
                tracing::warn!(error = %e, "failed to deprecate resolved memory");
            }
        };
        match method {
            ResolutionMethod::UserChoseOld | ResolutionMethod::DeprecateNew => {
                deprecate(&entry.new_memory_id);
            },
            ResolutionMethod::UserChoseNew | ResolutionMethod::DeprecateOld => {
                deprecate(&entry.old_memory_id);
            },
            ResolutionMethod::BothWrong => {
                deprecate(&entry.old_memory_id);
                deprecate(&entry.new_memory_id);
            },
            _ => {},
        }
        Ok(resolved)
    }

    /// Records that the user was asked about an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn mark_contradiction_asked(&self, thread_id: &str, ledger_id: &str) -> Result<()> {
        self.thread(thread_id)?.ledger.mark_contradiction_asked(ledger_id)
    }

    /// Records the user's clarification answer and applies it when the
    /// parsed resolution is grounded.
    ///
    /// The answer is parsed against the entry's semantic anchor; decisions
    /// that fail grounding are recorded in the worklog but change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown ledger id and
    /// [`Error::Storage`] on write failure.
    pub fn record_contradiction_user_answer(
        &self,
        thread_id: &str,
        ledger_id: &str,
        answer: &str,
    ) -> Result<ResolutionDecision> {
        let state = self.thread(thread_id)?;
        let entry = state
            .ledger
            .get_contradiction(ledger_id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {ledger_id}")))?;
        state.ledger.record_contradiction_user_answer(ledger_id, answer)?;

        let old_text = state
            .store
            .get_memory_by_id(&entry.old_memory_id)?
            .map(|m| m.text)
            .unwrap_or_default();
        let new_text = state
            .store
            .get_memory_by_id(&entry.new_memory_id)?
            .map(|m| m.text)
            .unwrap_or_default();
        let anchor = state.ledger.create_semantic_anchor(
            &entry, &old_text, &new_text, 0, None, None, None,
        );
        let decision = crate::anchor::parse_user_answer(&anchor, answer);

        if !crate::anchor::is_resolution_grounded(&anchor, &decision) {
            tracing::debug!(ledger_id, "answer parse not grounded; worklog only");
            return Ok(decision);
        }
        if entry.status.is_closed() {
            return Ok(decision);
        }

        match decision.resolution_method {
            ResolutionMethod::UserChoseOld => {
                self.resolve_contradiction(
                    thread_id,
                    ledger_id,
                    "user_chose_old",
                    Some(&entry.old_memory_id),
                    None,
                )?;
            },
            ResolutionMethod::UserChoseNew => {
                self.resolve_contradiction(
                    thread_id,
                    ledger_id,
                    "user_chose_new",
                    Some(&entry.new_memory_id),
                    None,
                )?;
            },
            ResolutionMethod::BothTrueTemporal => {
                self.resolve_contradiction(thread_id, ledger_id, "both_true_temporal", None, None)?;
            },
            ResolutionMethod::BothWrong => {
                self.resolve_contradiction(thread_id, ledger_id, "both_wrong", None, None)?;
            },
            _ => {},
        }
        Ok(decision)
    }

    /// Stores a quarantined EXTERNAL memory from a research evidence
    /// packet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn store_research_result(
        &self,
        thread_id: &str,
        query: &str,
        packet: &EvidencePacket,
    ) -> Result<MemoryItem> {
        self.thread(thread_id)?.store.store_research_result(query, packet)
    }

    /// Promotes a research memory to belief-grade trust with explicit user
    /// confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without confirmation and
    /// [`Error::NotFound`] for an unknown id.
    pub fn promote_to_belief(
        &self,
        thread_id: &str,
        memory_id: &str,
        user_confirmed: bool,
    ) -> Result<MemoryItem> {
        self.thread(thread_id)?.store.promote_to_belief(memory_id, user_confirmed)
    }

    /// Pending reflections, highest priority first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_reflection_queue(&self, thread_id: &str) -> Result<Vec<ReflectionItem>> {
        self.thread(thread_id)?.ledger.get_reflection_queue(None)
    }

    /// Contradiction statistics over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_contradiction_stats(&self, thread_id: &str, days: u32) -> Result<ContradictionStats> {
        self.thread(thread_id)?.ledger.get_contradiction_stats(days)
    }

    /// Manually triggers the lifecycle sweeper for a thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read or write failure.
    pub fn process_lifecycle_sweep(
        &self,
        thread_id: &str,
    ) -> Result<std::collections::BTreeMap<String, u32>> {
        self.thread(thread_id)?.ledger.process_lifecycle_transitions()
    }

    /// Aggregate status for a thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_crt_status(&self, thread_id: &str) -> Result<CrtStatus> {
        let state = self.thread(thread_id)?;
        let (total, deprecated) = state.store.memory_counts()?;
        let (beliefs, speech) = state.store.belief_speech_counts()?;
        let open = state.ledger.get_open_contradictions(200)?;
        let hard = open
            .iter()
            .filter(|e| e.contradiction_type == crate::models::ContradictionType::Conflict)
            .count();
        let reflection_queue_size = state.ledger.get_reflection_queue(None)?.len();
        #[allow(clippy::cast_precision_loss)]
        let belief_speech_ratio = if speech == 0 {
            beliefs as f64
        } else {
            beliefs as f64 / speech as f64
        };
        Ok(CrtStatus {
            total_memories: total,
            deprecated_memories: deprecated,
            belief_count: beliefs,
            speech_count: speech,
            belief_speech_ratio,
            open_contradictions: open.len(),
            hard_conflicts: hard,
            reflection_queue_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (CrtEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = CrtConfig {
            data_dir: dir.path().to_path_buf(),
            learned_model_path: None,
            ..CrtConfig::default()
        };
        (CrtEngine::new(config).unwrap(), dir)
    }

    #[test]
    fn test_threads_are_isolated() {
        let (engine, _dir) = engine();
        engine.query("I work at Microsoft as an engineer.", "alpha").unwrap();
        let alpha = engine.retrieve("alpha", "where do I work", 5, 0.0, false, false).unwrap();
        let beta = engine.retrieve("beta", "where do I work", 5, 0.0, false, false).unwrap();
        assert_eq!(alpha.len(), 1);
        assert!(beta.is_empty());
    }

    #[test]
    fn test_status_reflects_activity() {
        let (engine, _dir) = engine();
        engine.query("My name is Sarah.", "default").unwrap();
        engine.query("What's my name?", "default").unwrap();
        let status = engine.get_crt_status("default").unwrap();
        assert!(status.total_memories >= 1);
        assert!(status.belief_count >= 1);
        assert_eq!(status.open_contradictions, 0);
    }

    #[test]
    fn test_resolve_contradiction_validations() {
        let (engine, _dir) = engine();
        engine.query("I work at Microsoft as an engineer.", "default").unwrap();
        engine.query("I work at Amazon as an engineer.", "default").unwrap();
        let open = engine.get_open_contradictions("default", 10).unwrap();
        assert_eq!(open.len(), 1);
        let entry = &open[0];

        // Unknown method.
        let err = engine
            .resolve_contradiction("default", &entry.ledger_id, "coin_flip", None, None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // user_chose_new must reference the new memory.
        let err = engine
            .resolve_contradiction(
                "default",
                &entry.ledger_id,
                "user_chose_new",
                Some(&entry.old_memory_id),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Dangling merged memory id.
        let err = engine
            .resolve_contradiction(
                "default",
                &entry.ledger_id,
                "reflection_merge",
                Some("mem_missing"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));

        // A proper resolution deprecates the losing side.
        engine
            .resolve_contradiction(
                "default",
                &entry.ledger_id,
                "user_chose_new",
                Some(&entry.new_memory_id),
                None,
            )
            .unwrap();
        let old = engine.get_memory_by_id("default", &entry.old_memory_id).unwrap().unwrap();
        assert!(old.deprecated);
        assert!(engine.get_open_contradictions("default", 10).unwrap().is_empty());
        assert_eq!(engine.get_resolved_contradictions("default", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_user_answer_resolves_when_grounded() {
        let (engine, _dir) = engine();
        engine.query("I work at Microsoft as an engineer.", "default").unwrap();
        engine.query("I work at Amazon as an engineer.", "default").unwrap();
        let open = engine.get_open_contradictions("default", 10).unwrap();
        let entry = &open[0];

        engine.mark_contradiction_asked("default", &entry.ledger_id).unwrap();
        let decision = engine
            .record_contradiction_user_answer("default", &entry.ledger_id, "Amazon is correct")
            .unwrap();
        assert_eq!(decision.resolution_method, ResolutionMethod::UserChoseNew);
        assert!(engine.get_open_contradictions("default", 10).unwrap().is_empty());
        let result = engine.query("Where do I work?", "default").unwrap();
        assert!(result.answer.contains("Amazon"));
    }

    #[test]
    fn test_contradiction_view_shape() {
        let (engine, _dir) = engine();
        engine.query("I work at Microsoft as an engineer.", "default").unwrap();
        engine.query("I work at Amazon as an engineer.", "default").unwrap();
        let views = engine.get_contradiction_views("default", 10).unwrap();
        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.ledger_id, view.contradiction_id);
        assert_eq!(view.slot.as_deref(), Some("employer"));
        assert_eq!(view.old_value.as_deref(), Some("Microsoft"));
        assert_eq!(view.new_value.as_deref(), Some("Amazon"));
        assert!(view.old_trust.is_some() && view.new_trust.is_some());
    }

    #[test]
    fn test_research_lifecycle() {
        let (engine, _dir) = engine();
        let packet = EvidencePacket::create("rust cadence", "Rust releases every six weeks.", vec![]);
        let memory = engine.store_research_result("default", "rust cadence", &packet).unwrap();
        assert!((memory.trust - 0.4).abs() < 1e-9);
        let promoted = engine.promote_to_belief("default", &memory.memory_id, true).unwrap();
        assert!((promoted.trust - 0.8).abs() < 1e-9);
    }
}
