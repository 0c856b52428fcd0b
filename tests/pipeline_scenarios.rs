//! End-to-end conversation scenarios through the full engine.

mod common;

use crtmem::models::{ContradictionType, ResponseType};
use crtmem::orchestrator::answer_has_caveat;
use crtmem::{CrtConfig, CrtEngine};

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

/// Employer revision: "actually" corrections record a revision entry and
/// later questions answer the new value with a caveat.
#[test]
fn employer_revision_flow() {
    let (engine, _dir) = engine();

    let first = engine
        .query("I work at Microsoft as a senior developer.", "default")
        .unwrap();
    assert!(!first.contradiction_detected);
    assert_eq!(first.unresolved_contradictions_total, 0);

    let second = engine
        .query("Actually, I work at Amazon, not Microsoft.", "default")
        .unwrap();
    assert!(second.contradiction_detected);
    let open = engine.get_open_contradictions("default", 10).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].contradiction_type, ContradictionType::Revision);
    assert!(open[0].affected_slot_list().contains(&"employer".to_string()));

    let third = engine.query("Where do I work?", "default").unwrap();
    assert!(third.answer.contains("Amazon"), "answer: {}", third.answer);
    assert!(
        third.answer.contains("changed from Microsoft") || third.answer.contains("most recent update"),
        "answer must carry a caveat: {}",
        third.answer
    );
    assert!(third.gates_passed);
    assert!(third.contradiction_resolved);
}

/// Hard conflict: mutually exclusive employers trigger the uncertainty
/// exit until the user clarifies.
#[test]
fn hard_conflict_uncertainty_and_clarification() {
    let (engine, _dir) = engine();

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    engine.query("I work at Amazon as an engineer.", "default").unwrap();

    let open = engine.get_open_contradictions("default", 10).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].contradiction_type, ContradictionType::Conflict);

    let question = engine.query("Where do I work?", "default").unwrap();
    assert_eq!(question.response_type, ResponseType::Uncertainty);
    assert!(question.answer.contains("Microsoft"), "answer: {}", question.answer);
    assert!(question.answer.contains("Amazon"), "answer: {}", question.answer);
    assert!(question.answer.contains('?'), "must ask a clarifying question");
    assert!((question.confidence - 0.3).abs() < 1e-9);

    // Clarification resolves the entry.
    engine.query("Employer = Amazon", "default").unwrap();
    assert!(engine.get_open_contradictions("default", 10).unwrap().is_empty());

    let after = engine.query("Where do I work?", "default").unwrap();
    assert_ne!(after.response_type, ResponseType::Uncertainty);
    assert!(after.answer.contains("Amazon"), "answer: {}", after.answer);
}

/// Refinement: narrowing a location is recorded but never punishes the
/// older memory; follow-ups answer the specific value.
#[test]
fn location_refinement_not_conflict() {
    let (engine, _dir) = engine();

    engine.query("I live in Seattle.", "default").unwrap();
    let memories = engine.retrieve("default", "where do I live", 5, 0.0, false, false).unwrap();
    let seattle = memories
        .iter()
        .find(|(m, _)| m.text.contains("Seattle"))
        .map(|(m, _)| m.clone())
        .expect("seattle memory");

    engine
        .query("I live in the Seattle metro area, specifically in Bellevue.", "default")
        .unwrap();

    let open = engine.get_open_contradictions("default", 10).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].contradiction_type, ContradictionType::Refinement);

    let after = engine.get_memory_by_id("default", &seattle.memory_id).unwrap().unwrap();
    assert!(
        (after.trust - seattle.trust).abs() < 1e-9,
        "refinement must not reduce trust of the older memory"
    );

    let answer = engine.query("Where do I live?", "default").unwrap();
    assert!(answer.answer.contains("Bellevue"), "answer: {}", answer.answer);
}

/// Name idempotence: restating the same name never creates a
/// contradiction.
#[test]
fn name_idempotence() {
    let (engine, _dir) = engine();

    let first = engine.query("My name is Sarah.", "default").unwrap();
    assert!(first.answer.contains("Sarah"));

    let second = engine.query("Yes, I'm Sarah.", "default").unwrap();
    assert!(second.answer.contains("Sarah"));
    assert!(!second.contradiction_detected);
    assert!(engine.get_open_contradictions("default", 10).unwrap().is_empty());
}

/// Assistant profile questions deflect deterministically without touching
/// the store or the ledger.
#[test]
fn assistant_profile_deflection() {
    let (engine, _dir) = engine();

    let result = engine.query("What's your background in filmmaking?", "default").unwrap();
    assert_eq!(result.gate_reason, "assistant_profile");
    assert!(!result.answer.is_empty());

    let status = engine.get_crt_status("default").unwrap();
    assert_eq!(status.total_memories, 0);
    assert_eq!(status.open_contradictions, 0);
}

/// NL resolution: "X is correct, I switched jobs" closes the conflict,
/// deprecates the losing memory, and later answers are confident.
#[test]
fn nl_resolution_closes_conflict() {
    let (engine, _dir) = engine();

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    engine.query("I work at Google as an engineer.", "default").unwrap();
    let open = engine.get_open_contradictions("default", 10).unwrap();
    assert_eq!(open.len(), 1);
    let microsoft_id = open[0].old_memory_id.clone();

    let resolution = engine.query("Google is correct, I switched jobs", "default").unwrap();
    assert!(resolution.contradiction_resolved);
    assert!(engine.get_open_contradictions("default", 10).unwrap().is_empty());

    let resolved = engine.get_resolved_contradictions("default", 10).unwrap();
    assert_eq!(resolved.len(), 1);

    let microsoft = engine.get_memory_by_id("default", &microsoft_id).unwrap().unwrap();
    assert!(microsoft.deprecated);
    assert!(
        microsoft
            .deprecation_reason
            .as_deref()
            .unwrap_or("")
            .contains("natural language")
    );

    let after = engine.query("Where do I work?", "default").unwrap();
    assert!(after.answer.contains("Google"), "answer: {}", after.answer);
    assert_ne!(after.response_type, ResponseType::Uncertainty);
    assert!(after.gates_passed);
}

/// Reintroduced claims always carry the flag, and flagged results always
/// carry caveat language.
#[test]
fn reintroduction_flags_and_mandatory_caveats() {
    let (engine, _dir) = engine();

    engine.query("I work at Microsoft as a senior developer.", "default").unwrap();
    engine.query("Actually, I work at Amazon, not Microsoft.", "default").unwrap();

    let result = engine.query("Where do I work?", "default").unwrap();
    let open = engine.get_open_contradictions("default", 10).unwrap();
    let contested: Vec<&str> = open
        .iter()
        .flat_map(|e| [e.old_memory_id.as_str(), e.new_memory_id.as_str()])
        .collect();

    for memory in &result.retrieved_memories {
        if contested.contains(&memory.memory_id.as_str()) {
            assert!(memory.reintroduced_claim, "contested memory must be flagged");
        }
    }
    if result.reintroduced_claims_count > 0 {
        assert!(answer_has_caveat(&result.answer), "answer: {}", result.answer);
    }
}

/// Repeating the new-side value settles the contradiction through the
/// lifecycle instead of re-recording it.
#[test]
fn implicit_confirmations_advance_lifecycle() {
    let (engine, _dir) = engine();

    engine.query("I live in Portland.", "default").unwrap();
    engine.query("Actually I live in Denver now, not Portland.", "default").unwrap();
    let open = engine.get_open_contradictions("default", 10).unwrap();
    assert_eq!(open.len(), 1, "one revision entry expected");

    // Reasserting Denver confirms the new side; no new entries appear.
    engine.query("I live in Denver.", "default").unwrap();
    engine.query("I live in Denver.", "default").unwrap();
    let open_after = engine.get_open_contradictions("default", 10).unwrap();
    assert_eq!(open_after.len(), 1, "confirmations must not create new entries");
}

/// The contradiction status view answers deterministically from the
/// ledger.
#[test]
fn contradiction_status_view() {
    let (engine, _dir) = engine();

    let empty = engine.query("Do you have any open contradictions?", "default").unwrap();
    assert!(empty.answer.contains("no open contradictions"));

    engine.query("I work at Microsoft as an engineer.", "default").unwrap();
    engine.query("I work at Amazon as an engineer.", "default").unwrap();

    let status = engine.query("Do you have any open contradictions?", "default").unwrap();
    assert_eq!(status.gate_reason, "contradiction_status");
    assert!(status.answer.contains("1 open contradiction"), "answer: {}", status.answer);
}

/// Memory inventory requests never expose internal memory ids.
#[test]
fn memory_inventory_hides_internal_ids() {
    let (engine, _dir) = engine();
    engine.query("My name is Sarah.", "default").unwrap();

    let result = engine.query("List all memories with their memory IDs", "default").unwrap();
    assert_eq!(result.gate_reason, "memory_inventory");
    assert!(!result.answer.contains("mem_"), "answer: {}", result.answer);
    assert!(result.answer.contains("Sarah"));
}

/// Synthesis queries list the canonical slot view.
#[test]
fn synthesis_lists_canonical_view() {
    let (engine, _dir) = engine();
    engine.query("My name is Sarah.", "default").unwrap();
    engine.query("I live in Seattle.", "default").unwrap();
    engine.query("I work at Google as an engineer.", "default").unwrap();

    let result = engine.query("What do you know about me?", "default").unwrap();
    assert!(result.answer.contains("Sarah"));
    assert!(result.answer.contains("Seattle"));
    assert!(result.answer.contains("Google"));
}
