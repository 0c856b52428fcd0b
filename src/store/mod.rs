//! Durable trust-weighted memory store.
//!
//! One store per conversation thread, backed by its own `SQLite` file with
//! three tables: `memories`, `trust_log`, and `belief_speech`. Nothing is
//! ever deleted: contradictions create ledger entries, resolutions
//! deprecate, and every trust delta is logged.

// Citation-count averaging loses precision only beyond 2^52 citations.
#![allow(clippy::cast_precision_loss)]

mod connection;

pub(crate) use connection::{acquire_lock, blob_to_vector, configure_connection, storage_error, vector_to_blob};

use crate::config::TrustConfig;
use crate::crt::CrtMath;
use crate::embedding::Embedder;
use crate::models::{
    EvidencePacket, MemoryItem, MemorySource, SseMode, TemporalStatus, TrustLogEntry,
};
use crate::{Error, Result, current_timestamp, facts};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Initial trust by provenance.
///
/// User claims start trusted; agent beliefs earn trust through alignment;
/// fallback speech and quarantined research start low.
const fn initial_trust(source: MemorySource) -> f64 {
    match source {
        MemorySource::User => 0.8,
        MemorySource::Reflection => 0.7,
        MemorySource::System => 0.6,
        MemorySource::External => 0.4,
        MemorySource::Fallback => 0.3,
    }
}

/// Trust a promoted research memory reaches with explicit confirmation.
const PROMOTED_TRUST: f64 = 0.8;

/// Parameters for storing a new memory.
#[derive(Debug, Clone)]
pub struct StoreMemoryRequest {
    /// Verbatim claim text.
    pub text: String,
    /// Assertion strength in `[0, 1]`.
    pub confidence: f64,
    /// Provenance.
    pub source: MemorySource,
    /// Free-form provenance map.
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
    /// Owning conversation thread.
    pub thread_id: Option<String>,
    /// Verbatim-preservation mode.
    pub sse_mode: SseMode,
    /// User flagged this as important; nudges initial trust up.
    pub user_marked_important: bool,
}

impl Default for StoreMemoryRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            confidence: 0.95,
            source: MemorySource::User,
            context: None,
            thread_id: None,
            sse_mode: SseMode::Lossy,
            user_marked_important: false,
        }
    }
}

/// Parameters for trust-weighted retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    /// The query text to embed and match.
    pub query: String,
    /// Maximum results.
    pub k: usize,
    /// Minimum trust for candidates.
    pub min_trust: f64,
    /// Skip deprecated memories.
    pub exclude_deprecated: bool,
    /// Sources allowed in the result (default: USER and EXTERNAL).
    pub allowed_sources: Vec<MemorySource>,
    /// Memory ids excluded before scoring.
    pub excluded_ids: HashSet<String>,
}

impl Default for RetrievalRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            k: 5,
            min_trust: 0.0,
            exclude_deprecated: true,
            allowed_sources: vec![MemorySource::User, MemorySource::External],
            excluded_ids: HashSet::new(),
        }
    }
}

/// Durable per-thread memory store.
///
/// # Concurrency Model
///
/// A `Mutex<Connection>` serializes access; WAL mode and the 30 s busy
/// timeout let readers proceed against the single writer.
pub struct MemoryStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    embedder: Arc<dyn Embedder>,
    math: CrtMath,
    last_timestamp: Mutex<f64>,
}

impl MemoryStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the database cannot be opened or
    /// initialized.
    pub fn new(
        db_path: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        trust: TrustConfig,
    ) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| storage_error("open_memory_store", &e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            embedder,
            math: CrtMath::new(trust),
            last_timestamp: Mutex::new(0.0),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (tests and ephemeral threads).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the database cannot be initialized.
    pub fn in_memory(embedder: Arc<dyn Embedder>, trust: TrustConfig) -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| storage_error("open_memory_store", &e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
            embedder,
            math: CrtMath::new(trust),
            last_timestamp: Mutex::new(0.0),
        };
        store.initialize()?;
        Ok(store)
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
            "CREATE TABLE IF NOT EXISTS memories (
                memory_id TEXT PRIMARY KEY,
                vector BLOB NOT NULL,
                text TEXT NOT NULL,
                timestamp REAL NOT NULL,
                confidence REAL NOT NULL,
                trust REAL NOT NULL,
                source TEXT NOT NULL,
                sse_mode TEXT NOT NULL,
                thread_id TEXT,
                context TEXT,
                deprecated INTEGER NOT NULL DEFAULT 0,
                deprecation_reason TEXT,
                tags TEXT,
                temporal_status TEXT NOT NULL DEFAULT 'active',
                domains TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_memories_source ON memories(source);
            CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp);
            CREATE TABLE IF NOT EXISTS trust_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                memory_id TEXT NOT NULL,
                old_trust REAL NOT NULL,
                new_trust REAL NOT NULL,
                reason TEXT NOT NULL,
                timestamp REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trust_log_memory ON trust_log(memory_id);
            CREATE TABLE IF NOT EXISTS belief_speech (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                memory_ids TEXT,
                avg_trust REAL,
                source TEXT,
                timestamp REAL NOT NULL
            );",
        )
        .map_err(|e| storage_error("initialize_memory_store", &e))
    }

    /// Next strictly-monotonic timestamp for this store.
    fn next_timestamp(&self) -> f64 {
        let mut last = acquire_lock(&self.last_timestamp);
        let now = current_timestamp();
        let next = if now > *last { now } else { *last + 0.001 };
        *last = next;
        next
    }

    /// Embeds, normalizes, and persists a new memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty text or out-of-range
    /// confidence, [`Error::Embedding`] if encoding fails, and
    /// [`Error::Storage`] on write failure.
    pub fn store_memory(&self, request: StoreMemoryRequest) -> Result<MemoryItem> {
        let text = request.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Validation("memory text must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&request.confidence) {
            return Err(Error::Validation(format!(
                "confidence {} outside [0, 1]",
                request.confidence
            )));
        }

        let vector = self.embedder.encode(&text)?;
        let mut trust = initial_trust(request.source);
        if request.user_marked_important {
            trust = (trust + 0.1).min(1.0);
        }

        let item = MemoryItem {
            memory_id: format!("mem_{}", Uuid::new_v4().simple()),
            vector,
            text: text.clone(),
            timestamp: self.next_timestamp(),
            confidence: request.confidence,
            trust,
            source: request.source,
            sse_mode: request.sse_mode,
            thread_id: request.thread_id,
            context: request.context,
            deprecated: false,
            deprecation_reason: None,
            tags: Vec::new(),
            temporal_status: facts::infer_temporal_status(&text),
            domains: facts::detect_domains(&text),
        };

        self.insert_memory(&item)?;
        tracing::debug!(memory_id = %item.memory_id, source = %item.source, "stored memory");
        metrics::counter!("memories_stored_total", "source" => item.source.as_str()).increment(1);
        Ok(item)
    }

    fn insert_memory(&self, item: &MemoryItem) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO memories
             (memory_id, vector, text, timestamp, confidence, trust, source, sse_mode,
              thread_id, context, deprecated, deprecation_reason, tags, temporal_status, domains)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                item.memory_id,
                vector_to_blob(&item.vector),
                item.text,
                item.timestamp,
                item.confidence,
                item.trust,
                item.source.as_str(),
                item.sse_mode.as_str(),
                item.thread_id,
                item.context
                    .as_ref()
                    .map(|c| serde_json::Value::Object(c.clone()).to_string()),
                i32::from(item.deprecated),
                item.deprecation_reason,
                serde_json::to_string(&item.tags).ok(),
                item.temporal_status.as_str(),
                serde_json::to_string(&item.domains).ok(),
            ],
        )
        .map_err(|e| storage_error("insert_memory", &e))?;
        Ok(())
    }

    fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryItem> {
        let vector_blob: Vec<u8> = row.get("vector")?;
        let source_str: String = row.get("source")?;
        let sse_str: String = row.get("sse_mode")?;
        let temporal_str: String = row.get("temporal_status")?;
        let context_str: Option<String> = row.get("context")?;
        let tags_str: Option<String> = row.get("tags")?;
        let domains_str: Option<String> = row.get("domains")?;
        Ok(MemoryItem {
            memory_id: row.get("memory_id")?,
            vector: blob_to_vector(&vector_blob),
            text: row.get("text")?,
            timestamp: row.get("timestamp")?,
            confidence: row.get("confidence")?,
            trust: row.get("trust")?,
            source: MemorySource::parse(&source_str).unwrap_or(MemorySource::Fallback),
            sse_mode: SseMode::parse(&sse_str).unwrap_or_default(),
            thread_id: row.get("thread_id")?,
            context: context_str
                .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
                .and_then(|v| v.as_object().cloned()),
            deprecated: row.get::<_, i32>("deprecated")? != 0,
            deprecation_reason: row.get("deprecation_reason")?,
            tags: tags_str
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            temporal_status: TemporalStatus::parse(&temporal_str).unwrap_or_default(),
            domains: domains_str
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
        })
    }

    /// Retrieves memories ranked by trust-weighted score.
    ///
    /// Excluded ids are dropped before scoring; derived helper outputs
    /// (memory citations, contradiction status, inventories) never come
    /// back as candidates because their FALLBACK contexts are filtered by
    /// the allowed-source set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure or [`Error::Embedding`]
    /// if the query cannot be encoded.
    pub fn retrieve_memories(&self, request: &RetrievalRequest) -> Result<Vec<(MemoryItem, f64)>> {
        let query_vector = self.embedder.encode(&request.query)?;
        let now = current_timestamp();

        let candidates = self.load_candidates(request)?;
        let mut scored: Vec<(MemoryItem, f64)> = candidates
            .into_iter()
            .filter(|m| !request.excluded_ids.contains(&m.memory_id))
            .map(|m| {
                let s = self.math.similarity(&query_vector, &m.vector);
                let rho = self.math.recency_weight(m.timestamp, now);
                let score = self.math.retrieval_score(s, rho, m.trust, m.confidence);
                (m, score)
            })
            .collect();

        // Deterministic ordering: score, then recency, then id.
        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then(b.0.timestamp.total_cmp(&a.0.timestamp))
                .then(a.0.memory_id.cmp(&b.0.memory_id))
        });
        scored.truncate(request.k);
        Ok(scored)
    }

    fn load_candidates(&self, request: &RetrievalRequest) -> Result<Vec<MemoryItem>> {
        let sources: Vec<String> = request
            .allowed_sources
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect();
        let sql = format!(
            "SELECT * FROM memories
             WHERE trust >= ?1 {} AND source IN ({})",
            if request.exclude_deprecated { "AND deprecated = 0" } else { "" },
            sources.join(",")
        );
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| storage_error("retrieve_memories", &e))?;
        let rows = stmt
            .query_map(params![request.min_trust], Self::row_to_memory)
            .map_err(|e| storage_error("retrieve_memories", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| storage_error("retrieve_memories", &e))
    }

    /// Loads a memory by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_memory_by_id(&self, memory_id: &str) -> Result<Option<MemoryItem>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT * FROM memories WHERE memory_id = ?1",
            params![memory_id],
            Self::row_to_memory,
        )
        .optional()
        .map_err(|e| storage_error("get_memory_by_id", &e))
    }

    /// Loads a memory by id, failing with [`Error::NotFound`] if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the id does not exist.
    pub fn require_memory(&self, memory_id: &str) -> Result<MemoryItem> {
        self.get_memory_by_id(memory_id)?
            .ok_or_else(|| Error::NotFound(format!("memory {memory_id}")))
    }

    /// Loads all non-deprecated memories of a source, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn load_by_source(&self, source: MemorySource) -> Result<Vec<MemoryItem>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT * FROM memories WHERE source = ?1 AND deprecated = 0 ORDER BY timestamp ASC",
            )
            .map_err(|e| storage_error("load_by_source", &e))?;
        let rows = stmt
            .query_map(params![source.as_str()], Self::row_to_memory)
            .map_err(|e| storage_error("load_by_source", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| storage_error("load_by_source", &e))
    }

    /// Trust history for a memory, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn get_trust_history(&self, memory_id: &str) -> Result<Vec<TrustLogEntry>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT memory_id, old_trust, new_trust, reason, timestamp
                 FROM trust_log WHERE memory_id = ?1 ORDER BY id ASC",
            )
            .map_err(|e| storage_error("get_trust_history", &e))?;
        let rows = stmt
            .query_map(params![memory_id], |row| {
                Ok(TrustLogEntry {
                    memory_id: row.get(0)?,
                    old_trust: row.get(1)?,
                    new_trust: row.get(2)?,
                    reason: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })
            .map_err(|e| storage_error("get_trust_history", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| storage_error("get_trust_history", &e))
    }

    /// Sets trust to a new value and appends the delta to the trust log.
    fn set_trust(&self, memory_id: &str, old_trust: f64, new_trust: f64, reason: &str) -> Result<()> {
        let new_trust = new_trust.clamp(0.0, 1.0);
        let conn = acquire_lock(&self.conn);
        let updated = conn
            .execute(
                "UPDATE memories SET trust = ?1 WHERE memory_id = ?2",
                params![new_trust, memory_id],
            )
            .map_err(|e| storage_error("set_trust", &e))?;
        if updated == 0 {
            return Err(Error::NotFound(format!("memory {memory_id}")));
        }
        conn.execute(
            "INSERT INTO trust_log (memory_id, old_trust, new_trust, reason, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![memory_id, old_trust, new_trust, reason, current_timestamp()],
        )
        .map_err(|e| storage_error("set_trust", &e))?;
        tracing::debug!(memory_id, old_trust, new_trust, reason, "trust updated");
        Ok(())
    }

    /// Increases trust after the memory aligned with a gate-passing output.
    ///
    /// Saturating step: `trust += rate_up * (1 - trust)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn evolve_trust_for_alignment(&self, memory_id: &str) -> Result<f64> {
        let item = self.require_memory(memory_id)?;
        let new_trust = item.trust + self.math.config().rate_up * (1.0 - item.trust);
        self.set_trust(memory_id, item.trust, new_trust, "aligned_with_gated_output")?;
        Ok(new_trust)
    }

    /// Decreases trust of the older side of a hard conflict.
    ///
    /// Saturating step: `trust -= rate_down * trust`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn evolve_trust_for_contradiction(&self, memory_id: &str) -> Result<f64> {
        let item = self.require_memory(memory_id)?;
        let new_trust = item.trust - self.math.config().rate_down * item.trust;
        self.set_trust(memory_id, item.trust, new_trust, "contradicted_by_newer_claim")?;
        Ok(new_trust)
    }

    /// Applies a bounded trust boost (NL resolution winner, confirmations).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn boost_trust(&self, memory_id: &str, delta: f64, reason: &str) -> Result<f64> {
        let item = self.require_memory(memory_id)?;
        let new_trust = (item.trust + delta).clamp(0.0, 1.0);
        self.set_trust(memory_id, item.trust, new_trust, reason)?;
        Ok(new_trust)
    }

    /// Soft-retires a memory; the row stays auditable forever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn deprecate_memory(&self, memory_id: &str, reason: &str) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let updated = conn
            .execute(
                "UPDATE memories SET deprecated = 1, deprecation_reason = ?1 WHERE memory_id = ?2",
                params![reason, memory_id],
            )
            .map_err(|e| storage_error("deprecate_memory", &e))?;
        if updated == 0 {
            return Err(Error::NotFound(format!("memory {memory_id}")));
        }
        metrics::counter!("memories_deprecated_total").increment(1);
        Ok(())
    }

    /// Records a gate-passing belief turn (does not affect retrieval).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn record_belief(
        &self,
        query: &str,
        response: &str,
        memory_ids: &[String],
        avg_trust: f64,
    ) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO belief_speech (kind, query, response, memory_ids, avg_trust, timestamp)
             VALUES ('belief', ?1, ?2, ?3, ?4, ?5)",
            params![
                query,
                response,
                serde_json::to_string(memory_ids).ok(),
                avg_trust,
                current_timestamp()
            ],
        )
        .map_err(|e| storage_error("record_belief", &e))?;
        Ok(())
    }

    /// Records a gate-failing speech turn (does not affect retrieval).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on write failure.
    pub fn record_speech(&self, query: &str, response: &str, source: MemorySource) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO belief_speech (kind, query, response, source, timestamp)
             VALUES ('speech', ?1, ?2, ?3, ?4)",
            params![query, response, source.as_str(), current_timestamp()],
        )
        .map_err(|e| storage_error("record_speech", &e))?;
        Ok(())
    }

    /// Belief and speech counts, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn belief_speech_counts(&self) -> Result<(u64, u64)> {
        let conn = acquire_lock(&self.conn);
        let count = |kind: &str| -> Result<u64> {
            conn.query_row(
                "SELECT COUNT(*) FROM belief_speech WHERE kind = ?1",
                params![kind],
                |row| row.get::<_, i64>(0),
            )
            .map(i64::unsigned_abs)
            .map_err(|e| storage_error("belief_speech_counts", &e))
        };
        Ok((count("belief")?, count("speech")?))
    }

    /// Stores a quarantined EXTERNAL memory from a research evidence packet.
    ///
    /// Trust 0.4, `notes` lane, citations carried in `context.provenance`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty summary or
    /// [`Error::Storage`] on write failure.
    pub fn store_research_result(&self, query: &str, packet: &EvidencePacket) -> Result<MemoryItem> {
        let mut provenance = serde_json::Map::new();
        provenance.insert("tool".to_string(), serde_json::Value::from("research"));
        provenance.insert(
            "citations".to_string(),
            serde_json::to_value(&packet.citations).unwrap_or(serde_json::Value::Null),
        );
        provenance.insert("packet_id".to_string(), serde_json::Value::from(packet.packet_id.clone()));

        let mut context = serde_json::Map::new();
        context.insert("kind".to_string(), serde_json::Value::from("research"));
        context.insert("lane".to_string(), serde_json::Value::from(packet.lane.clone()));
        context.insert("query".to_string(), serde_json::Value::from(query));
        context.insert("provenance".to_string(), serde_json::Value::Object(provenance));

        let confidence = if packet.citations.is_empty() {
            0.5
        } else {
            packet.citations.iter().map(|c| c.confidence).sum::<f64>()
                / packet.citations.len() as f64
        };

        self.store_memory(StoreMemoryRequest {
            text: packet.summary.clone(),
            confidence,
            source: MemorySource::External,
            context: Some(context),
            sse_mode: SseMode::Lossy,
            ..Default::default()
        })
    }

    /// Promotes a quarantined research memory to belief-grade trust.
    ///
    /// Only an explicit user confirmation raises trust from 0.4 to 0.8.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without confirmation,
    /// [`Error::NotFound`] for an unknown id.
    pub fn promote_to_belief(&self, memory_id: &str, user_confirmed: bool) -> Result<MemoryItem> {
        if !user_confirmed {
            return Err(Error::Validation(
                "promotion requires explicit user confirmation".to_string(),
            ));
        }
        let item = self.require_memory(memory_id)?;
        self.set_trust(memory_id, item.trust, PROMOTED_TRUST, "user_confirmed_promotion")?;
        self.require_memory(memory_id)
    }

    /// Total and deprecated memory counts, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on read failure.
    pub fn memory_counts(&self) -> Result<(u64, u64)> {
        let conn = acquire_lock(&self.conn);
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
            .map_err(|e| storage_error("memory_counts", &e))?;
        let deprecated: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories WHERE deprecated = 1", [], |row| row.get(0))
            .map_err(|e| storage_error("memory_counts", &e))?;
        Ok((total.unsigned_abs(), deprecated.unsigned_abs()))
    }
}
