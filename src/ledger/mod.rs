//! Append-only contradiction ledger.
//!
//! No silent overwrites: when beliefs diverge the ledger records the
//! tension and preserves both memories. Entries are never deleted; only
//! status, resolution fields, lifecycle counters, and metadata change.
//!
//! Backed by its own `SQLite` file with five tables: `contradictions`,
//! `reflection_queue`, `contradiction_worklog`, `conflict_resolutions`,
//! and `contradiction_lifecycle`.

mod classifier;
mod lifecycle;

pub use classifier::classify_contradiction;
pub use lifecycle::LifecycleEngine;

use crate::anchor::generate_clarification_prompt;
use crate::config::LifecycleConfig;
use crate::models::{
    ContradictionEntry, ContradictionStatus, ContradictionType, ExpectedAnswerType, LifecycleInfo,
    LifecycleState, ReflectionItem, ReflectionPriority, ResolutionMethod, SemanticAnchor,
    WorklogEntry,
};
use crate::store::{acquire_lock, configure_connection, storage_error};
use crate::{Error, Result, current_timestamp, facts};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

/// Parameters for recording a contradiction.
#[derive(Debug, Clone, Default)]
pub struct RecordContradictionRequest {
    /// Earlier-discovered memory id.
    pub old_memory_id: String,
    /// Later-discovered memory id.
    pub new_memory_id: String,
    /// Meaning drift between the claims.
    pub drift_mean: f64,
    /// Confidence delta (old minus new).
    pub confidence_delta: f64,
    /// Query that surfaced the tension.
    pub query: Option<String>,
    /// Summary override; generated when absent.
    pub summary: Option<String>,
    /// Optional reasoning drift.
    pub drift_reason: Option<f64>,
    /// Older claim text (enables classification and slot tracking).
    pub old_text: Option<String>,
    /// Newer claim text.
    pub new_text: Option<String>,
    /// Older claim embedding.
    pub old_vector: Option<Vec<f32>>,
    /// Newer claim embedding.
    pub new_vector: Option<Vec<f32>>,
    /// Classification override; auto-classified when absent.
    pub contradiction_type: Option<ContradictionType>,
    /// Suggested handling policy from the disclosure decision.
    pub suggested_policy: Option<String>,
}

/// Contradiction statistics over a window.
#[derive(Debug, Clone)]
pub struct ContradictionStats {
    /// Entries recorded in the window.
    pub total: u64,
    /// Currently open entries in the window.
    pub open: u64,
    /// Resolved entries in the window.
    pub resolved: u64,
    /// Accepted (both-kept) entries in the window.
    pub accepted: u64,
    /// Mean drift over the window.
    pub average_drift: f64,
    /// Unprocessed reflection queue items.
    pub pending_reflections: u64,
    /// Window size in days.
    pub days: u32,
}

/// Append-only contradiction ledger.
pub struct ContradictionLedger {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    lifecycle: LifecycleEngine,
}

impl ContradictionLedger {
    /// Opens (or creates) a ledger at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the database cannot be opened or
    /// initialized.
    pub fn new(db_path: impl Into<PathBuf>, config: LifecycleConfig) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| storage_error("open_ledger", &e))?;
        let ledger = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            lifecycle: LifecycleEngine::new(config),
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    /// Creates an in-memory ledger (tests and ephemeral threads).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the database cannot be initialized.
    pub fn in_memory(config: LifecycleConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| storage_error("open_ledger", &e))?;
        let ledger = Self {
            conn: Mutex::new(conn),
            db_path: None,
            lifecycle: LifecycleEngine::new(config),
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS contradictions (
                ledger_id TEXT PRIMARY KEY,
                timestamp REAL NOT NULL,
                old_memory_id TEXT NOT NULL,
                new_memory_id TEXT NOT NULL,
                drift_mean REAL NOT NULL,
                drift_reason REAL,
                confidence_delta REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'open',
                contradiction_type TEXT NOT NULL DEFAULT 'conflict',
                affects_slots TEXT,
                query TEXT,
                summary TEXT,
                resolution_timestamp REAL,
                resolution_method TEXT,
                merged_memory_id TEXT,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_contradictions_status ON contradictions(status);
            CREATE INDEX IF NOT EXISTS idx_contradictions_memories
                ON contradictions(old_memory_id, new_memory_id);
            CREATE TABLE IF NOT EXISTS reflection_queue (
                queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp REAL NOT NULL,
                ledger_id TEXT NOT NULL,
                volatility REAL NOT NULL,
                priority TEXT NOT NULL,
                context_json TEXT,
                processed INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS contradiction_worklog (
                ledger_id TEXT PRIMARY KEY,
                first_asked_at REAL,
                last_asked_at REAL,
                ask_count INTEGER NOT NULL DEFAULT 0,
                last_user_answer TEXT,
                last_user_answer_at REAL
            );
            CREATE TABLE IF NOT EXISTS conflict_resolutions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ledger_id TEXT NOT NULL,
                method TEXT NOT NULL,
                merged_memory_id TEXT,
                timestamp REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS contradiction_lifecycle (
                ledger_id TEXT PRIMARY KEY,
                state TEXT NOT NULL DEFAULT 'active',
                detected_at REAL NOT NULL,
                settled_at REAL,
                archived_at REAL,
                confirmation_count INTEGER NOT NULL DEFAULT 0,
                disclosure_count INTEGER NOT NULL DEFAULT 0,
                last_mentioned REAL NOT NULL
            );",
        )
        .map_err(|e| storage_error("initialize_ledger", &e))
    }

    /// Records a contradiction event with classification and slot tracking.
    ///
    /// Never deletes or replaces; both memories stay untouched. The
    /// lifecycle row starts ACTIVE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn record_contradiction(
        &self,
        request: RecordContradictionRequest,
    ) -> Result<ContradictionEntry> {
        let contradiction_type = request.contradiction_type.unwrap_or_else(|| {
            match (&request.old_text, &request.new_text) {
                (Some(old), Some(new)) => classify_contradiction(
                    old,
                    new,
                    request.drift_mean,
                    request.old_vector.as_deref(),
                    request.new_vector.as_deref(),
                ),
                _ => ContradictionType::Conflict,
            }
        });

        let affects_slots = match (&request.old_text, &request.new_text) {
            (Some(old), Some(new)) => {
                let old_facts = facts::extract_all_facts(old);
                let new_facts = facts::extract_all_facts(new);
                let shared: Vec<String> = old_facts
                    .keys()
                    .filter(|slot| new_facts.contains_key(*slot))
                    .cloned()
                    .collect();
                if shared.is_empty() { None } else { Some(shared.join(",")) }
            },
            _ => None,
        };

        let timestamp = current_timestamp();
        let summary = request.summary.clone().unwrap_or_else(|| {
            generate_summary(request.drift_mean, request.confidence_delta, contradiction_type)
        });
        let metadata = request.suggested_policy.as_ref().map(|policy| {
            let mut map = serde_json::Map::new();
            map.insert("suggested_policy".to_string(), serde_json::Value::from(policy.clone()));
            map
        });

        let entry = ContradictionEntry {
            ledger_id: format!("contra_{}", Uuid::new_v4().simple()),
            timestamp,
            old_memory_id: request.old_memory_id,
            new_memory_id: request.new_memory_id,
            drift_mean: request.drift_mean,
            drift_reason: request.drift_reason,
            confidence_delta: request.confidence_delta,
            status: ContradictionStatus::Open,
            contradiction_type,
            affects_slots,
            query: request.query,
            summary: Some(summary),
            resolution_timestamp: None,
            resolution_method: None,
            merged_memory_id: None,
            metadata,
        };

        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO contradictions
             (ledger_id, timestamp, old_memory_id, new_memory_id, drift_mean, drift_reason,
              confidence_delta, status, contradiction_type, affects_slots, query, summary, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                entry.ledger_id,
                entry.timestamp,
                entry.old_memory_id,
                entry.new_memory_id,
                entry.drift_mean,
                entry.drift_reason,
                entry.confidence_delta,
                entry.status.as_str(),
                entry.contradiction_type.as_str(),
                entry.affects_slots,
                entry.query,
                entry.summary,
                entry
                    .metadata
                    .as_ref()
                    .map(|m| serde_json::Value::Object(m.clone()).to_string()),
            ],
        )
        .map_err(|e| storage_error("record_contradiction", &e))?;
        conn.execute(
            "INSERT INTO contradiction_lifecycle (ledger_id, state, detected_at, last_mentioned)
             VALUES (?1, 'active', ?2, ?2)",
            params![entry.ledger_id, entry.timestamp],
        )
        .map_err(|e| storage_error("record_contradiction", &e))?;
        drop(conn);

        tracing::info!(
            ledger_id = %entry.ledger_id,
            contradiction_type = %entry.contradiction_type,
            affects_slots = entry.affects_slots.as_deref().unwrap_or(""),
            "recorded contradiction"
        );
        metrics::counter!(
            "contradictions_recorded_total",
            "type" => entry.contradiction_type.as_str()
        )
        .increment(1);
        Ok(entry)
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContradictionEntry> {
        let status_str: String = row.get("status")?;
        let type_str: String = row.get("contradiction_type")?;
        let method_str: Option<String> = row.get("resolution_method")?;
        let metadata_str: Option<String> = row.get("metadata")?;
        Ok(ContradictionEntry {
            ledger_id: row.get("ledger_id")?,
            timestamp: row.get("timestamp")?,
            old_memory_id: row.get("old_memory_id")?,
            new_memory_id: row.get("new_memory_id")?,
            drift_mean: row.get("drift_mean")?,
            drift_reason: row.get("drift_reason")?,
            confidence_delta: row.get("confidence_delta")?,
            status: ContradictionStatus::parse(&status_str).unwrap_or_default(),
            contradiction_type: ContradictionType::parse(&type_str).unwrap_or_default(),
            affects_slots: row.get("affects_slots")?,
            query: row.get("query")?,
            summary: row.get("summary")?,
            resolution_timestamp: row.get("resolution_timestamp")?,
            resolution_method: method_str.as_deref().and_then(ResolutionMethod::parse),
            merged_memory_id: row.get("merged_memory_id")?,
            metadata: metadata_str
                .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
                .and_then(|v| v.as_object().cloned()),
        })
    }

    /// Unresolved entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_open_contradictions(&self, limit: usize) -> Result<Vec<ContradictionEntry>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT * FROM contradictions WHERE status IN ('open', 'reflecting')
                 ORDER BY timestamp DESC LIMIT ?1",
            )
            .map_err(|e| storage_error("get_open_contradictions", &e))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], Self::row_to_entry)
            .map_err(|e| storage_error("get_open_contradictions", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| storage_error("get_open_contradictions", &e))
    }

    /// Closed entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_resolved_contradictions(&self, limit: usize) -> Result<Vec<ContradictionEntry>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT * FROM contradictions WHERE status IN ('resolved', 'accepted')
                 ORDER BY resolution_timestamp DESC LIMIT ?1",
            )
            .map_err(|e| storage_error("get_resolved_contradictions", &e))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], Self::row_to_entry)
            .map_err(|e| storage_error("get_resolved_contradictions", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| storage_error("get_resolved_contradictions", &e))
    }

    /// Loads a single entry by ledger id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_contradiction(&self, ledger_id: &str) -> Result<Option<ContradictionEntry>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT * FROM contradictions WHERE ledger_id = ?1",
            params![ledger_id],
            Self::row_to_entry,
        )
        .optional()
        .map_err(|e| storage_error("get_contradiction", &e))
    }

    /// All entries involving a memory, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_contradiction_by_memory(&self, memory_id: &str) -> Result<Vec<ContradictionEntry>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT * FROM contradictions
                 WHERE old_memory_id = ?1 OR new_memory_id = ?1
                 ORDER BY timestamp DESC",
            )
            .map_err(|e| storage_error("get_contradiction_by_memory", &e))?;
        let rows = stmt
            .query_map(params![memory_id], Self::row_to_entry)
            .map_err(|e| storage_error("get_contradiction_by_memory", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| storage_error("get_contradiction_by_memory", &e))
    }

    /// True when the memory is referenced by any open entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn has_open_contradiction(&self, memory_id: &str) -> Result<bool> {
        Ok(self
            .get_contradiction_by_memory(memory_id)?
            .iter()
            .any(|entry| !entry.status.is_closed()))
    }

    /// Marks an entry resolved with the given method.
    ///
    /// The resolution is also appended to the `conflict_resolutions` audit
    /// table; the entry itself is never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and
    /// [`Error::AlreadyResolved`] for a closed entry.
    pub fn resolve_contradiction(
        &self,
        ledger_id: &str,
        method: ResolutionMethod,
        merged_memory_id: Option<&str>,
        new_status: ContradictionStatus,
    ) -> Result<ContradictionEntry> {
        let entry = self
            .get_contradiction(ledger_id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {ledger_id}")))?;
        if entry.status.is_closed() {
            return Err(Error::AlreadyResolved(ledger_id.to_string()));
        }

        let now = current_timestamp();
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "UPDATE contradictions
             SET status = ?1, resolution_timestamp = ?2, resolution_method = ?3, merged_memory_id = ?4
             WHERE ledger_id = ?5",
            params![new_status.as_str(), now, method.as_str(), merged_memory_id, ledger_id],
        )
        .map_err(|e| storage_error("resolve_contradiction", &e))?;
        conn.execute(
            "INSERT INTO conflict_resolutions (ledger_id, method, merged_memory_id, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![ledger_id, method.as_str(), merged_memory_id, now],
        )
        .map_err(|e| storage_error("resolve_contradiction", &e))?;
        drop(conn);

        tracing::info!(ledger_id, method = method.as_str(), "resolved contradiction");
        metrics::counter!("contradictions_resolved_total", "method" => method.as_str()).increment(1);
        self.get_contradiction(ledger_id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {ledger_id}")))
    }

    // ------------------------------------------------------------------
    // Reflection queue
    // ------------------------------------------------------------------

    /// Queues an entry for reflection, bucketed by volatility.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn queue_reflection(
        &self,
        ledger_id: &str,
        volatility: f64,
        context: Option<&serde_json::Value>,
    ) -> Result<()> {
        let priority = ReflectionPriority::from_volatility(volatility);
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO reflection_queue (timestamp, ledger_id, volatility, priority, context_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                current_timestamp(),
                ledger_id,
                volatility,
                priority.as_str(),
                context.map(ToString::to_string)
            ],
        )
        .map_err(|e| storage_error("queue_reflection", &e))?;
        Ok(())
    }

    /// Pending reflections ordered by priority, volatility, then age.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_reflection_queue(
        &self,
        priority: Option<ReflectionPriority>,
    ) -> Result<Vec<ReflectionItem>> {
        let conn = acquire_lock(&self.conn);
        let sql = if priority.is_some() {
            "SELECT queue_id, timestamp, ledger_id, volatility, priority, context_json, processed
             FROM reflection_queue WHERE processed = 0 AND priority = ?1
             ORDER BY volatility DESC, timestamp ASC"
        } else {
            "SELECT queue_id, timestamp, ledger_id, volatility, priority, context_json, processed
             FROM reflection_queue WHERE processed = 0
             ORDER BY CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END,
                      volatility DESC, timestamp ASC"
        };
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<ReflectionItem> {
            let priority_str: String = row.get(4)?;
            let context_str: Option<String> = row.get(5)?;
            Ok(ReflectionItem {
                queue_id: row.get(0)?,
                timestamp: row.get(1)?,
                ledger_id: row.get(2)?,
                volatility: row.get(3)?,
                priority: ReflectionPriority::parse(&priority_str)
                    .unwrap_or(ReflectionPriority::Low),
                context: context_str.and_then(|s| serde_json::from_str(&s).ok()),
                processed: row.get::<_, i64>(6)? != 0,
            })
        };
        let mut stmt = conn.prepare(sql).map_err(|e| storage_error("get_reflection_queue", &e))?;
        let rows = if let Some(priority) = priority {
            stmt.query_map(params![priority.as_str()], map_row)
        } else {
            stmt.query_map([], map_row)
        }
        .map_err(|e| storage_error("get_reflection_queue", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| storage_error("get_reflection_queue", &e))
    }

    /// Marks a reflection item processed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn mark_reflection_processed(&self, queue_id: i64) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "UPDATE reflection_queue SET processed = 1 WHERE queue_id = ?1",
            params![queue_id],
        )
        .map_err(|e| storage_error("mark_reflection_processed", &e))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Worklog
    // ------------------------------------------------------------------

    /// Records that the user was asked about an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn mark_contradiction_asked(&self, ledger_id: &str) -> Result<()> {
        let now = current_timestamp();
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO contradiction_worklog (ledger_id, first_asked_at, last_asked_at, ask_count)
             VALUES (?1, ?2, ?2, 1)
             ON CONFLICT(ledger_id) DO UPDATE SET
                 last_asked_at = ?2,
                 ask_count = ask_count + 1",
            params![ledger_id, now],
        )
        .map_err(|e| storage_error("mark_contradiction_asked", &e))?;
        Ok(())
    }

    /// Records the user's answer to a clarification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn record_contradiction_user_answer(&self, ledger_id: &str, answer: &str) -> Result<()> {
        let now = current_timestamp();
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO contradiction_worklog
                 (ledger_id, ask_count, last_user_answer, last_user_answer_at)
             VALUES (?1, 0, ?2, ?3)
             ON CONFLICT(ledger_id) DO UPDATE SET
                 last_user_answer = ?2,
                 last_user_answer_at = ?3",
            params![ledger_id, answer, now],
        )
        .map_err(|e| storage_error("record_contradiction_user_answer", &e))?;
        Ok(())
    }

    /// The clarification worklog for an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_contradiction_worklog(&self, ledger_id: &str) -> Result<WorklogEntry> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT first_asked_at, last_asked_at, ask_count, last_user_answer, last_user_answer_at
             FROM contradiction_worklog WHERE ledger_id = ?1",
            params![ledger_id],
            |row| {
                Ok(WorklogEntry {
                    first_asked_at: row.get(0)?,
                    last_asked_at: row.get(1)?,
                    ask_count: u32::try_from(row.get::<_, i64>(2)?.max(0)).unwrap_or(u32::MAX),
                    last_user_answer: row.get(3)?,
                    last_user_answer_at: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(|e| storage_error("get_contradiction_worklog", &e))
        .map(Option::unwrap_or_default)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Merges updates into an entry's metadata map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn update_contradiction_metadata(
        &self,
        ledger_id: &str,
        updates: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let entry = self
            .get_contradiction(ledger_id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {ledger_id}")))?;
        let mut metadata = entry.metadata.unwrap_or_default();
        for (key, value) in updates {
            metadata.insert(key.clone(), value.clone());
        }
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "UPDATE contradictions SET metadata = ?1 WHERE ledger_id = ?2",
            params![serde_json::Value::Object(metadata).to_string(), ledger_id],
        )
        .map_err(|e| storage_error("update_contradiction_metadata", &e))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Semantic anchors
    // ------------------------------------------------------------------

    /// Builds the semantic anchor for an entry.
    ///
    /// When slot information is not supplied it is derived from the shared
    /// fact slots of the two texts (first shared slot in sorted order).
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn create_semantic_anchor(
        &self,
        entry: &ContradictionEntry,
        old_text: &str,
        new_text: &str,
        turn_number: u64,
        slot_name: Option<String>,
        old_vector: Option<&[f32]>,
        new_vector: Option<&[f32]>,
    ) -> SemanticAnchor {
        let (slot_name, old_value, new_value) = slot_name.map_or_else(
            || {
                let old_facts = facts::extract_all_facts(old_text);
                let new_facts = facts::extract_all_facts(new_text);
                old_facts
                    .iter()
                    .find(|(slot, _)| new_facts.contains_key(*slot))
                    .map_or((None, None, None), |(slot, old_fact)| {
                        let new_fact = &new_facts[slot];
                        (
                            Some(slot.clone()),
                            Some(old_fact.raw_value.clone()),
                            Some(new_fact.raw_value.clone()),
                        )
                    })
            },
            |slot| {
                let old_facts = facts::extract_all_facts(old_text);
                let new_facts = facts::extract_all_facts(new_text);
                let old_value = old_facts.get(&slot).map(|f| f.raw_value.clone());
                let new_value = new_facts.get(&slot).map(|f| f.raw_value.clone());
                (Some(slot), old_value, new_value)
            },
        );

        let drift_vector = match (old_vector, new_vector) {
            (Some(old), Some(new)) if old.len() == new.len() => {
                Some(new.iter().zip(old.iter()).map(|(n, o)| n - o).collect())
            },
            _ => None,
        };

        let mut anchor = SemanticAnchor {
            contradiction_id: entry.ledger_id.clone(),
            turn_number,
            contradiction_type: entry.contradiction_type,
            old_memory_id: entry.old_memory_id.clone(),
            new_memory_id: entry.new_memory_id.clone(),
            old_text: old_text.to_string(),
            new_text: new_text.to_string(),
            slot_name,
            old_value,
            new_value,
            drift_vector,
            clarification_prompt: String::new(),
            expected_answer_type: ExpectedAnswerType::for_contradiction(entry.contradiction_type),
            user_answer: None,
            resolution_method: None,
            resolved_at: None,
        };
        anchor.clarification_prompt = generate_clarification_prompt(&anchor);
        anchor
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn row_to_lifecycle(row: &rusqlite::Row<'_>) -> rusqlite::Result<LifecycleInfo> {
        let state_str: String = row.get("state")?;
        Ok(LifecycleInfo {
            ledger_id: row.get("ledger_id")?,
            state: LifecycleState::parse(&state_str).unwrap_or_default(),
            detected_at: row.get("detected_at")?,
            settled_at: row.get("settled_at")?,
            archived_at: row.get("archived_at")?,
            confirmation_count: u32::try_from(row.get::<_, i64>("confirmation_count")?.max(0))
                .unwrap_or(u32::MAX),
            disclosure_count: u32::try_from(row.get::<_, i64>("disclosure_count")?.max(0))
                .unwrap_or(u32::MAX),
            last_mentioned: row.get("last_mentioned")?,
        })
    }

    /// The lifecycle row for an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_lifecycle_info(&self, ledger_id: &str) -> Result<Option<LifecycleInfo>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT * FROM contradiction_lifecycle WHERE ledger_id = ?1",
            params![ledger_id],
            Self::row_to_lifecycle,
        )
        .optional()
        .map_err(|e| storage_error("get_lifecycle_info", &e))
    }

    /// Moves an entry to a new lifecycle state.
    ///
    /// Transitions are monotonic; a backwards move is rejected as
    /// validation failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and
    /// [`Error::Validation`] for a backwards transition.
    pub fn update_lifecycle_state(&self, ledger_id: &str, new_state: LifecycleState) -> Result<()> {
        let info = self
            .get_lifecycle_info(ledger_id)?
            .ok_or_else(|| Error::NotFound(format!("lifecycle row {ledger_id}")))?;
        if new_state.rank() < info.state.rank() {
            return Err(Error::Validation(format!(
                "lifecycle cannot move backwards: {} -> {}",
                info.state.as_str(),
                new_state.as_str()
            )));
        }
        if new_state == info.state {
            return Ok(());
        }
        let now = current_timestamp();
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "UPDATE contradiction_lifecycle
             SET state = ?1,
                 settled_at = CASE WHEN ?1 = 'settled' THEN ?2 ELSE settled_at END,
                 archived_at = CASE WHEN ?1 = 'archived' THEN ?2 ELSE archived_at END
             WHERE ledger_id = ?3",
            params![new_state.as_str(), now, ledger_id],
        )
        .map_err(|e| storage_error("update_lifecycle_state", &e))?;
        drop(conn);
        tracing::debug!(ledger_id, state = new_state.as_str(), "lifecycle transition");
        Ok(())
    }

    /// Records a user confirmation of the new-side fact and advances the
    /// lifecycle if warranted. Returns the new confirmation count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn increment_confirmation(&self, ledger_id: &str) -> Result<u32> {
        let now = current_timestamp();
        {
            let conn = acquire_lock(&self.conn);
            let updated = conn
                .execute(
                    "UPDATE contradiction_lifecycle
                     SET confirmation_count = confirmation_count + 1, last_mentioned = ?1
                     WHERE ledger_id = ?2",
                    params![now, ledger_id],
                )
                .map_err(|e| storage_error("increment_confirmation", &e))?;
            if updated == 0 {
                return Err(Error::NotFound(format!("lifecycle row {ledger_id}")));
            }
        }
        let info = self
            .get_lifecycle_info(ledger_id)?
            .ok_or_else(|| Error::NotFound(format!("lifecycle row {ledger_id}")))?;
        let next = self.lifecycle.next_state(&info, now);
        if next != info.state {
            self.update_lifecycle_state(ledger_id, next)?;
        }
        Ok(info.confirmation_count)
    }

    /// Records that an entry was disclosed to the user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn record_disclosure(&self, ledger_id: &str) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "UPDATE contradiction_lifecycle
             SET disclosure_count = disclosure_count + 1, last_mentioned = ?1
             WHERE ledger_id = ?2",
            params![current_timestamp(), ledger_id],
        )
        .map_err(|e| storage_error("record_disclosure", &e))?;
        Ok(())
    }

    /// Sweeps all non-archived lifecycle rows and applies due transitions.
    ///
    /// Returns per-transition counts keyed `old->new`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read or write failure.
    pub fn process_lifecycle_transitions(&self) -> Result<BTreeMap<String, u32>> {
        let now = current_timestamp();
        let rows = {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare("SELECT * FROM contradiction_lifecycle WHERE state != 'archived'")
                .map_err(|e| storage_error("process_lifecycle_transitions", &e))?;
            let rows = stmt
                .query_map([], Self::row_to_lifecycle)
                .map_err(|e| storage_error("process_lifecycle_transitions", &e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| storage_error("process_lifecycle_transitions", &e))?
        };

        let mut transitions: BTreeMap<String, u32> = BTreeMap::new();
        for info in rows {
            let next = self.lifecycle.next_state(&info, now);
            if next != info.state {
                self.update_lifecycle_state(&info.ledger_id, next)?;
                let key = format!("{}->{}", info.state.as_str(), next.as_str());
                *transitions.entry(key).or_insert(0) += 1;
            }
        }
        Ok(transitions)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Contradiction statistics over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_contradiction_stats(&self, days: u32) -> Result<ContradictionStats> {
        let since = current_timestamp() - f64::from(days) * 86_400.0;
        let conn = acquire_lock(&self.conn);
        let count_status = |status: &str| -> Result<u64> {
            conn.query_row(
                "SELECT COUNT(*) FROM contradictions WHERE timestamp > ?1 AND status = ?2",
                params![since, status],
                |row| row.get::<_, i64>(0),
            )
            .map(i64::unsigned_abs)
            .map_err(|e| storage_error("get_contradiction_stats", &e))
        };
        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM contradictions WHERE timestamp > ?1",
                params![since],
                |row| row.get(0),
            )
            .map_err(|e| storage_error("get_contradiction_stats", &e))?;
        let average_drift: f64 = conn
            .query_row(
                "SELECT COALESCE(AVG(drift_mean), 0.0) FROM contradictions WHERE timestamp > ?1",
                params![since],
                |row| row.get(0),
            )
            .map_err(|e| storage_error("get_contradiction_stats", &e))?;
        let pending: i64 = conn
            .query_row("SELECT COUNT(*) FROM reflection_queue WHERE processed = 0", [], |row| {
                row.get(0)
            })
            .map_err(|e| storage_error("get_contradiction_stats", &e))?;
        Ok(ContradictionStats {
            total: total.unsigned_abs(),
            open: count_status("open")?,
            resolved: count_status("resolved")?,
            accepted: count_status("accepted")?,
            average_drift,
            pending_reflections: pending.unsigned_abs(),
            days,
        })
    }
}

/// Natural-language summary of a contradiction event.
fn generate_summary(drift: f64, conf_delta: f64, contradiction_type: ContradictionType) -> String {
    let intensity = if drift > 0.5 {
        "Strong"
    } else if drift > 0.3 {
        "Moderate"
    } else {
        "Mild"
    };
    let conf_desc = if conf_delta > 0.3 {
        " with significant confidence shift"
    } else if conf_delta > 0.1 {
        " with moderate confidence shift"
    } else {
        ""
    };
    let type_desc = match contradiction_type {
        ContradictionType::Refinement => "Refinement",
        ContradictionType::Revision => "Revision",
        ContradictionType::Temporal => "Temporal progression",
        ContradictionType::Conflict => "Conflict",
    };
    format!("{type_desc}: {intensity} belief divergence (drift={drift:.2}){conf_desc}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ContradictionLedger {
        ContradictionLedger::in_memory(LifecycleConfig::default()).unwrap()
    }

    fn conflict_request() -> RecordContradictionRequest {
        RecordContradictionRequest {
            old_memory_id: "mem_old".to_string(),
            new_memory_id: "mem_new".to_string(),
            drift_mean: 0.45,
            confidence_delta: 0.0,
            old_text: Some("I work at Microsoft as an engineer.".to_string()),
            new_text: Some("I work at Amazon as an engineer.".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_record_classifies_and_tracks_slots() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        assert_eq!(entry.contradiction_type, ContradictionType::Conflict);
        assert_eq!(entry.status, ContradictionStatus::Open);
        let slots = entry.affected_slot_list();
        assert!(slots.contains(&"employer".to_string()), "slots: {slots:?}");
        assert!(entry.summary.as_deref().unwrap_or("").contains("Conflict"));
    }

    #[test]
    fn test_open_and_lookup() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        let open = ledger.get_open_contradictions(10).unwrap();
        assert_eq!(open.len(), 1);
        assert!(ledger.has_open_contradiction("mem_old").unwrap());
        assert!(ledger.has_open_contradiction("mem_new").unwrap());
        assert!(!ledger.has_open_contradiction("mem_other").unwrap());
        assert!(ledger.get_contradiction(&entry.ledger_id).unwrap().is_some());
    }

    #[test]
    fn test_resolve_lifecycle_of_entry() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        let resolved = ledger
            .resolve_contradiction(
                &entry.ledger_id,
                ResolutionMethod::UserChoseNew,
                Some("mem_new"),
                ContradictionStatus::Resolved,
            )
            .unwrap();
        assert_eq!(resolved.status, ContradictionStatus::Resolved);
        assert_eq!(resolved.resolution_method, Some(ResolutionMethod::UserChoseNew));
        assert_eq!(resolved.merged_memory_id.as_deref(), Some("mem_new"));
        assert!(ledger.get_open_contradictions(10).unwrap().is_empty());
        assert_eq!(ledger.get_resolved_contradictions(10).unwrap().len(), 1);

        // Re-resolving a closed entry is an error.
        let err = ledger
            .resolve_contradiction(
                &entry.ledger_id,
                ResolutionMethod::UserChoseOld,
                Some("mem_old"),
                ContradictionStatus::Resolved,
            )
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyResolved(_)));
    }

    #[test]
    fn test_resolve_unknown_is_not_found() {
        let ledger = ledger();
        let err = ledger
            .resolve_contradiction(
                "contra_missing",
                ResolutionMethod::AcceptBoth,
                None,
                ContradictionStatus::Accepted,
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_reflection_queue_ordering() {
        let ledger = ledger();
        let a = ledger.record_contradiction(conflict_request()).unwrap();
        let b = ledger.record_contradiction(conflict_request()).unwrap();
        let c = ledger.record_contradiction(conflict_request()).unwrap();
        ledger.queue_reflection(&a.ledger_id, 0.2, None).unwrap();
        ledger.queue_reflection(&b.ledger_id, 0.9, None).unwrap();
        ledger.queue_reflection(&c.ledger_id, 0.5, None).unwrap();

        let queue = ledger.get_reflection_queue(None).unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue[0].ledger_id, b.ledger_id);
        assert_eq!(queue[0].priority, ReflectionPriority::High);
        assert_eq!(queue[1].ledger_id, c.ledger_id);
        assert_eq!(queue[2].ledger_id, a.ledger_id);

        ledger.mark_reflection_processed(queue[0].queue_id).unwrap();
        assert_eq!(ledger.get_reflection_queue(None).unwrap().len(), 2);
    }

    #[test]
    fn test_worklog_counters() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        ledger.mark_contradiction_asked(&entry.ledger_id).unwrap();
        ledger.mark_contradiction_asked(&entry.ledger_id).unwrap();
        ledger
            .record_contradiction_user_answer(&entry.ledger_id, "Amazon is correct")
            .unwrap();

        let worklog = ledger.get_contradiction_worklog(&entry.ledger_id).unwrap();
        assert_eq!(worklog.ask_count, 2);
        assert!(worklog.first_asked_at.is_some());
        assert!(worklog.last_asked_at >= worklog.first_asked_at);
        assert_eq!(worklog.last_user_answer.as_deref(), Some("Amazon is correct"));
    }

    #[test]
    fn test_metadata_merge() {
        let ledger = ledger();
        let entry = ledger
            .record_contradiction(RecordContradictionRequest {
                suggested_policy: Some("clarify".to_string()),
                ..conflict_request()
            })
            .unwrap();
        let mut updates = serde_json::Map::new();
        updates.insert("clarification_prompt".to_string(), serde_json::Value::from("Which is correct?"));
        ledger.update_contradiction_metadata(&entry.ledger_id, &updates).unwrap();

        let loaded = ledger.get_contradiction(&entry.ledger_id).unwrap().unwrap();
        let metadata = loaded.metadata.unwrap();
        assert_eq!(metadata["suggested_policy"], "clarify");
        assert_eq!(metadata["clarification_prompt"], "Which is correct?");
    }

    #[test]
    fn test_lifecycle_row_and_confirmations() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        let info = ledger.get_lifecycle_info(&entry.ledger_id).unwrap().unwrap();
        assert_eq!(info.state, LifecycleState::Active);
        assert_eq!(info.confirmation_count, 0);

        ledger.increment_confirmation(&entry.ledger_id).unwrap();
        ledger.increment_confirmation(&entry.ledger_id).unwrap();
        let info = ledger.get_lifecycle_info(&entry.ledger_id).unwrap().unwrap();
        assert_eq!(info.confirmation_count, 2);
        assert_eq!(info.state, LifecycleState::Settling);
    }

    #[test]
    fn test_lifecycle_monotonicity() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        ledger
            .update_lifecycle_state(&entry.ledger_id, LifecycleState::Settling)
            .unwrap();
        let err = ledger
            .update_lifecycle_state(&entry.ledger_id, LifecycleState::Active)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_process_lifecycle_transitions() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        ledger.increment_confirmation(&entry.ledger_id).unwrap();
        // One confirmation: no transition due.
        let transitions = ledger.process_lifecycle_transitions().unwrap();
        assert!(transitions.is_empty());

        ledger.increment_confirmation(&entry.ledger_id).unwrap();
        // increment_confirmation already advanced to settling; the sweep is
        // idempotent on steady state.
        let transitions = ledger.process_lifecycle_transitions().unwrap();
        assert!(transitions.is_empty());
        let info = ledger.get_lifecycle_info(&entry.ledger_id).unwrap().unwrap();
        assert_eq!(info.state, LifecycleState::Settling);
    }

    #[test]
    fn test_anchor_from_entry() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        let anchor = ledger.create_semantic_anchor(
            &entry,
            "I work at Microsoft as an engineer.",
            "I work at Amazon as an engineer.",
            4,
            None,
            None,
            None,
        );
        assert_eq!(anchor.contradiction_id, entry.ledger_id);
        assert_eq!(anchor.slot_name.as_deref(), Some("employer"));
        assert_eq!(anchor.old_value.as_deref(), Some("Microsoft"));
        assert_eq!(anchor.new_value.as_deref(), Some("Amazon"));
        assert!(anchor.clarification_prompt.contains("Microsoft"));
        assert!(anchor.clarification_prompt.contains("Amazon"));
    }

    #[test]
    fn test_stats() {
        let ledger = ledger();
        let entry = ledger.record_contradiction(conflict_request()).unwrap();
        ledger.record_contradiction(conflict_request()).unwrap();
        ledger
            .resolve_contradiction(
                &entry.ledger_id,
                ResolutionMethod::NlResolution,
                None,
                ContradictionStatus::Resolved,
            )
            .unwrap();
        let stats = ledger.get_contradiction_stats(7).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.open, 1);
        assert_eq!(stats.resolved, 1);
        assert!(stats.average_drift > 0.0);
    }

    #[test]
    fn test_summary_wording() {
        let summary = generate_summary(0.6, 0.4, ContradictionType::Conflict);
        assert!(summary.contains("Strong"));
        assert!(summary.contains("significant confidence shift"));
        let summary = generate_summary(0.2, 0.0, ContradictionType::Refinement);
        assert!(summary.starts_with("Refinement: Mild"));
        assert!(!summary.contains("confidence shift"));
    }
}
