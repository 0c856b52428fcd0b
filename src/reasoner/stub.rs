//! Deterministic stub reasoner.

use super::{Reasoner, ReasonerContext, ReasonerOutput};
use crate::Result;

/// Deterministic reasoner answering from the resolved FACT context.
///
/// Picks the `FACT: slot = value` line whose slot or value words overlap
/// the query; falls back to the best retrieved document, then to a fixed
/// no-information response. Same inputs always give the same output, which
/// keeps the pipeline testable without a model.
pub struct StubReasoner;

impl StubReasoner {
    /// Creates a new stub reasoner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn query_words(query: &str) -> Vec<String> {
        query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(ToString::to_string)
            .collect()
    }
}

impl Default for StubReasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl Reasoner for StubReasoner {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn reason(&self, query: &str, context: &ReasonerContext, mode: &str) -> Result<ReasonerOutput> {
        let words = Self::query_words(query);

        // FACT lines first: they are the resolved view of the store.
        for line in &context.memory_context {
            let Some(rest) = line.strip_prefix("FACT: ") else {
                continue;
            };
            let Some((slot, value)) = rest.split_once(" = ") else {
                continue;
            };
            let slot_words: Vec<String> = slot.split('_').map(str::to_lowercase).collect();
            let hit = words
                .iter()
                .any(|w| slot_words.contains(w) || value.to_lowercase().contains(w.as_str()));
            if hit {
                return Ok(ReasonerOutput {
                    answer: value.trim().to_string(),
                    thinking: None,
                    mode: mode.to_string(),
                    confidence: 0.9,
                });
            }
        }

        if let Some(best) = context.retrieved_docs.first() {
            return Ok(ReasonerOutput {
                answer: best.text.clone(),
                thinking: None,
                mode: mode.to_string(),
                confidence: 0.6,
            });
        }

        Ok(ReasonerOutput {
            answer: "I don't have enough stored context to answer that yet.".to_string(),
            thinking: None,
            mode: mode.to_string(),
            confidence: 0.2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::RetrievedDoc;

    #[test]
    fn test_answers_from_fact_lines() {
        let context = ReasonerContext {
            memory_context: vec![
                "FACT: name = Sarah".to_string(),
                "FACT: employer = Amazon".to_string(),
            ],
            ..Default::default()
        };
        let out = StubReasoner::new().reason("Where is my employer?", &context, "standard").unwrap();
        assert_eq!(out.answer, "Amazon");
        assert!(out.confidence > 0.8);
    }

    #[test]
    fn test_falls_back_to_top_doc() {
        let context = ReasonerContext {
            retrieved_docs: vec![RetrievedDoc {
                text: "I like hiking on weekends".to_string(),
                trust: 0.8,
                confidence: 0.9,
                source: "user".to_string(),
                memory_id: None,
            }],
            ..Default::default()
        };
        let out = StubReasoner::new().reason("what do I do on weekends?", &context, "standard").unwrap();
        assert_eq!(out.answer, "I like hiking on weekends");
    }

    #[test]
    fn test_no_context_low_confidence() {
        let out = StubReasoner::new()
            .reason("anything", &ReasonerContext::default(), "standard")
            .unwrap();
        assert!(out.confidence < 0.3);
    }

    #[test]
    fn test_deterministic() {
        let context = ReasonerContext {
            memory_context: vec!["FACT: location = Seattle".to_string()],
            ..Default::default()
        };
        let a = StubReasoner::new().reason("where do I live, Seattle?", &context, "standard").unwrap();
        let b = StubReasoner::new().reason("where do I live, Seattle?", &context, "standard").unwrap();
        assert_eq!(a.answer, b.answer);
    }
}
