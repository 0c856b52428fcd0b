//! Property-based laws for the extractor, classifier, disclosure policy,
//! and evidence packets.

use chrono::{TimeZone, Utc};
use crtmem::config::{DisclosureConfig, TrustConfig};
use crtmem::crt::{CrtMath, drift_meaning, similarity};
use crtmem::disclosure::{DisclosureAction, DisclosurePolicy};
use crtmem::embedding::HashEmbedder;
use crtmem::facts::extract_fact_slots;
use crtmem::ledger::classify_contradiction;
use crtmem::models::{Citation, ContradictionType, EvidencePacket};
use crtmem::store::{MemoryStore, RetrievalRequest, StoreMemoryRequest};
use crtmem::Embedder;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    /// Extraction is a pure function of the text.
    #[test]
    fn extractor_is_pure(text in ".{0,200}") {
        prop_assert_eq!(extract_fact_slots(&text), extract_fact_slots(&text));
    }

    /// A revision marker in the newer text always classifies as revision.
    #[test]
    fn revision_marker_wins(
        old in "[a-z ]{1,40}",
        new_suffix in "[a-z ]{1,40}",
        marker in prop::sample::select(vec!["actually", "correction", "i meant", "wrong", "mistake"]),
    ) {
        let new_text = format!("{marker} {new_suffix}");
        prop_assert_eq!(
            classify_contradiction(&old, &new_text, 0.4, None, None),
            ContradictionType::Revision
        );
    }

    /// Disclosure thresholds partition the probability space.
    #[test]
    fn disclosure_zones_partition(p in 0.0f64..=1.0f64) {
        let config = DisclosureConfig::default();
        let policy = DisclosurePolicy::new(config.clone());
        let action = policy.decide(p, "employer", "a", "b").action;
        if p < config.low_threshold {
            prop_assert_eq!(action, DisclosureAction::Reject);
        } else if p >= config.high_threshold {
            prop_assert_eq!(action, DisclosureAction::Accept);
        } else {
            prop_assert_eq!(action, DisclosureAction::Clarify);
        }
    }

    /// Embeddings are deterministic and drift is bounded.
    #[test]
    fn embedding_drift_bounds(a in ".{1,80}", b in ".{1,80}") {
        let embedder = HashEmbedder::new();
        let va = embedder.encode(&a).unwrap();
        let vb = embedder.encode(&b).unwrap();
        let drift = drift_meaning(&va, &vb);
        prop_assert!((0.0..=2.0).contains(&drift));
        prop_assert!((similarity(&va, &va) - 1.0).abs() < 1e-4 || va.iter().all(|x| *x == 0.0));
    }

    /// Recency weight is monotone in age and bounded by [0, 1].
    #[test]
    fn recency_weight_monotone(age_a in 0.0f64..1e9, age_b in 0.0f64..1e9) {
        let math = CrtMath::new(TrustConfig::default());
        let now = 2e9;
        let wa = math.recency_weight(now - age_a, now);
        let wb = math.recency_weight(now - age_b, now);
        prop_assert!((0.0..=1.0).contains(&wa));
        if age_a < age_b {
            prop_assert!(wa >= wb);
        }
    }
}

/// Evidence packets survive a serde round trip.
#[test]
fn evidence_packet_round_trip() {
    let packet = EvidencePacket {
        packet_id: EvidencePacket::generate_packet_id(
            "query",
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
        ),
        query: "query".to_string(),
        summary: "summary with unicode: café".to_string(),
        citations: vec![Citation {
            quote_text: "a quoted sentence".to_string(),
            source_url: "https://example.org/a".to_string(),
            char_offset: (3, 20),
            fetched_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            confidence: 0.8,
        }],
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
        trust: 0.4,
        lane: "notes".to_string(),
    };
    let json = serde_json::to_string(&packet).unwrap();
    let back: EvidencePacket = serde_json::from_str(&json).unwrap();
    assert_eq!(packet, back);
}

/// Identical store snapshots retrieve identically ordered results.
#[test]
fn retrieval_is_deterministic() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new());
    let store = MemoryStore::in_memory(Arc::clone(&embedder), TrustConfig::default()).unwrap();
    for text in [
        "I work at Microsoft as an engineer",
        "I live in Seattle",
        "my favorite color is blue",
        "I manage a team of 8 engineers",
    ] {
        store
            .store_memory(StoreMemoryRequest {
                text: text.to_string(),
                ..Default::default()
            })
            .unwrap();
    }
    let request = RetrievalRequest {
        query: "what do you know about my work".to_string(),
        k: 4,
        ..Default::default()
    };
    let ids = |results: Vec<(crtmem::MemoryItem, f64)>| -> Vec<String> {
        results.into_iter().map(|(m, _)| m.memory_id).collect()
    };
    let first = ids(store.retrieve_memories(&request).unwrap());
    for _ in 0..5 {
        assert_eq!(first, ids(store.retrieve_memories(&request).unwrap()));
    }
}
