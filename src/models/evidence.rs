//! Evidence packets: provenance-carrying research results.
//!
//! Every research fact keeps a traceable source. When sources conflict the
//! engine records a contradiction instead of merging into false consensus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single citation from a research source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Exact quote from the source.
    pub quote_text: String,
    /// URL or file path of the source.
    pub source_url: String,
    /// `(start, end)` character offsets in the original document.
    pub char_offset: (usize, usize),
    /// When the source was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Confidence of the quote extraction.
    pub confidence: f64,
}

/// A research result with full provenance.
///
/// Tool-sourced packets start quarantined at trust 0.4 in the `notes` lane;
/// they are never auto-promoted to belief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePacket {
    /// Unique identifier: `ep_<yyyymmdd_hhmmss>_<16 hex of sha256(query)>`.
    pub packet_id: String,
    /// Original user question.
    pub query: String,
    /// Synthesized answer from the sources.
    pub summary: String,
    /// Sources supporting the summary.
    pub citations: Vec<Citation>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Trust at storage time (tool sources start at 0.4).
    pub trust: f64,
    /// Storage lane; always `notes` for research results.
    pub lane: String,
}

impl EvidencePacket {
    /// Creates a new quarantined packet from a research query.
    #[must_use]
    pub fn create(query: impl Into<String>, summary: impl Into<String>, citations: Vec<Citation>) -> Self {
        let query = query.into();
        Self {
            packet_id: Self::generate_packet_id(&query, Utc::now()),
            query,
            summary: summary.into(),
            citations,
            created_at: Utc::now(),
            trust: 0.4,
            lane: "notes".to_string(),
        }
    }

    /// Generates a deterministic packet id for a query at a point in time.
    #[must_use]
    pub fn generate_packet_id(query: &str, at: DateTime<Utc>) -> String {
        let digest = Sha256::digest(query.as_bytes());
        let short = hex::encode(&digest[..8]);
        format!("ep_{}_{short}", at.format("%Y%m%d_%H%M%S"))
    }

    /// True if the packet carries at least one citation.
    #[must_use]
    pub fn has_citations(&self) -> bool {
        !self.citations.is_empty()
    }

    /// All source URLs, in citation order.
    #[must_use]
    pub fn source_urls(&self) -> Vec<&str> {
        self.citations.iter().map(|c| c.source_url.as_str()).collect()
    }
}
