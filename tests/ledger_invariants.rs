//! Store and ledger invariants exercised through the engine surface.

mod common;

use crtmem::models::{ContradictionStatus, LifecycleState};
use crtmem::{CrtConfig, CrtEngine, Error};

fn engine() -> (CrtEngine, tempfile::TempDir) {
    common::init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let config = CrtConfig {
        data_dir: dir.path().to_path_buf(),
        learned_model_path: None,
        ..CrtConfig::default()
    };
    (CrtEngine::new(config).expect("engine"), dir)
}

/// No silent overwrite: contradictions create ledger entries; the original
/// memory keeps its text, vector, source, and timestamp forever.
#[test]
fn contradictions_never_mutate_memories() {
    let (engine, _dir) = engine();

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    let before = engine
        .retrieve("default", "where do I work", 5, 0.0, false, false)
        .unwrap()
        .first()
        .map(|(m, _)| m.clone())
        .expect("stored memory");

    engine.query("I work at Amazon as an engineer.", "default").unwrap();

    let after = engine.get_memory_by_id("default", &before.memory_id).unwrap().unwrap();
    assert_eq!(after.text, before.text);
    assert_eq!(after.vector, before.vector);
    assert_eq!(after.source, before.source);
    assert!((after.timestamp - before.timestamp).abs() < f64::EPSILON);
    // Only trust and derived flags may differ.
    assert_eq!(engine.get_open_contradictions("default", 10).unwrap().len(), 1);
}

/// Every trust change is logged with its reason.
#[test]
fn trust_deltas_are_logged() {
    let (engine, _dir) = engine();

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    let memory = engine
        .retrieve("default", "microsoft", 5, 0.0, false, false)
        .unwrap()
        .first()
        .map(|(m, _)| m.clone())
        .expect("stored memory");

    engine.query("I work at Amazon as an engineer.", "default").unwrap();

    let history = engine.get_trust_history("default", &memory.memory_id).unwrap();
    assert!(!history.is_empty(), "conflict must log a trust delta on the older side");
    for entry in &history {
        assert!((0.0..=1.0).contains(&entry.new_trust));
        assert!(!entry.reason.is_empty());
    }
}

/// Ledger entries only move forward: resolving twice is an error, and the
/// resolution metadata is append-only audit state.
#[test]
fn ledger_is_append_only() {
    let (engine, _dir) = engine();

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    engine.query("I work at Amazon as an engineer.", "default").unwrap();
    let entry = engine.get_open_contradictions("default", 10).unwrap().remove(0);

    let resolved = engine
        .resolve_contradiction(
            "default",
            &entry.ledger_id,
            "accept_both",
            None,
            Some("accepted"),
        )
        .unwrap();
    assert_eq!(resolved.status, ContradictionStatus::Accepted);
    assert_eq!(resolved.old_memory_id, entry.old_memory_id);
    assert_eq!(resolved.timestamp, entry.timestamp);

    let err = engine
        .resolve_contradiction("default", &entry.ledger_id, "accept_both", None, None)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyResolved(_)));
}

/// Resolving a nonexistent entry is NotFound; unknown methods are
/// validation failures.
#[test]
fn resolution_failure_semantics() {
    let (engine, _dir) = engine();
    let err = engine
        .resolve_contradiction("default", "contra_missing", "accept_both", None, None)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    engine.query("I work at Amazon as an engineer.", "default").unwrap();
    let entry = engine.get_open_contradictions("default", 10).unwrap().remove(0);
    let err = engine
        .resolve_contradiction("default", &entry.ledger_id, "flip_a_coin", None, None)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

/// Lifecycle rows exist from detection and advance monotonically with
/// confirmations.
#[test]
fn lifecycle_advances_with_confirmations() {
    let (engine, _dir) = engine();

    engine.query("I live in Portland.", "default").unwrap();
    engine.query("Actually I live in Denver now, not Portland.", "default").unwrap();
    let entry = engine.get_open_contradictions("default", 10).unwrap().remove(0);

    // Two confirmations of the new value: ACTIVE -> SETTLING.
    engine.query("I live in Denver.", "default").unwrap();
    engine.query("I live in Denver.", "default").unwrap();

    let sweep = engine.process_lifecycle_sweep("default").unwrap();
    // The increment path already advanced the state; the sweep is
    // idempotent at steady state.
    assert!(sweep.values().all(|count| *count <= 1));

    let views = engine.get_contradiction_views("default", 10).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].ledger_id, entry.ledger_id);
}

/// The worklog records ask/answer traffic without touching entry state.
#[test]
fn worklog_tracks_clarification_traffic() {
    let (engine, _dir) = engine();

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    engine.query("I work at Amazon as an engineer.", "default").unwrap();
    let entry = engine.get_open_contradictions("default", 10).unwrap().remove(0);

    engine.mark_contradiction_asked("default", &entry.ledger_id).unwrap();
    // An ungrounded mumble is logged but resolves nothing.
    let decision = engine
        .record_contradiction_user_answer("default", &entry.ledger_id, "hmm let me think")
        .unwrap();
    assert!(decision.confidence >= 0.3 || engine.get_open_contradictions("default", 10).unwrap().len() == 1);
    // "hmm let me think" parses as user_clarified with middling confidence
    // and no chosen side, so the entry stays open.
    assert_eq!(engine.get_open_contradictions("default", 10).unwrap().len(), 1);
}

/// Lifecycle states never move backwards through the public sweep.
#[test]
fn lifecycle_states_are_monotone() {
    for (from, to) in [
        (LifecycleState::Active, LifecycleState::Settling),
        (LifecycleState::Settling, LifecycleState::Settled),
        (LifecycleState::Settled, LifecycleState::Archived),
    ] {
        assert!(from.rank() < to.rank());
    }
}
