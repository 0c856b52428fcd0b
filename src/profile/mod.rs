//! Cross-thread global user profile.
//!
//! A per-process registry of canonical per-slot values with temporal
//! history, shared by every conversation thread and serialized to disk as a
//! JSON snapshot. The profile never forgets: superseded values are flipped
//! inactive, not removed.

use crate::models::ExtractedFact;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// One observed value for a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotObservation {
    /// Value as the user stated it.
    pub value: String,
    /// Stable normalized form.
    pub normalized: String,
    /// When the value was observed, epoch seconds.
    pub observed_at: f64,
    /// Whether this is the current value for the slot.
    pub active: bool,
    /// Thread the observation came from.
    pub thread_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileSnapshot {
    slots: BTreeMap<String, Vec<SlotObservation>>,
}

/// Per-process global user profile.
pub struct GlobalUserProfile {
    path: Option<PathBuf>,
    snapshot: Mutex<ProfileSnapshot>,
}

impl GlobalUserProfile {
    /// Loads (or creates) a profile backed by a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if an existing snapshot cannot be parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| Error::Storage {
                operation: "load_profile".to_string(),
                cause: e.to_string(),
            })?;
            serde_json::from_str(&raw).map_err(|e| Error::Storage {
                operation: "load_profile".to_string(),
                cause: e.to_string(),
            })?
        } else {
            ProfileSnapshot::default()
        };
        Ok(Self {
            path: Some(path),
            snapshot: Mutex::new(snapshot),
        })
    }

    /// Creates an unpersisted profile (tests and ephemeral sessions).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            snapshot: Mutex::new(ProfileSnapshot::default()),
        }
    }

    /// Records an observed fact, retiring prior values of the slot.
    ///
    /// A re-observation of the current normalized value only refreshes its
    /// timestamp; it never creates history churn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the snapshot cannot be written.
    pub fn observe(
        &self,
        fact: &ExtractedFact,
        observed_at: f64,
        thread_id: Option<&str>,
    ) -> Result<()> {
        {
            let Ok(mut snapshot) = self.snapshot.lock() else {
                return Err(Error::Storage {
                    operation: "observe_profile".to_string(),
                    cause: "profile lock poisoned".to_string(),
                });
            };
            let history = snapshot.slots.entry(fact.slot.clone()).or_default();
            if let Some(current) = history.iter_mut().find(|o| o.active) {
                if current.normalized == fact.normalized {
                    current.observed_at = observed_at;
                    drop(snapshot);
                    return self.persist();
                }
                current.active = false;
            }
            history.push(SlotObservation {
                value: fact.raw_value.clone(),
                normalized: fact.normalized.clone(),
                observed_at,
                active: true,
                thread_id: thread_id.map(ToString::to_string),
            });
        }
        self.persist()
    }

    /// The current active value for a slot.
    #[must_use]
    pub fn current_value(&self, slot: &str) -> Option<SlotObservation> {
        let snapshot = self.snapshot.lock().ok()?;
        snapshot
            .slots
            .get(slot)
            .and_then(|history| history.iter().rev().find(|o| o.active).cloned())
    }

    /// Full observation history for a slot, oldest first.
    #[must_use]
    pub fn history(&self, slot: &str) -> Vec<SlotObservation> {
        self.snapshot
            .lock()
            .ok()
            .and_then(|s| s.slots.get(slot).cloned())
            .unwrap_or_default()
    }

    /// All slots with an active value, with that value.
    #[must_use]
    pub fn active_slots(&self) -> BTreeMap<String, SlotObservation> {
        let Ok(snapshot) = self.snapshot.lock() else {
            return BTreeMap::new();
        };
        snapshot
            .slots
            .iter()
            .filter_map(|(slot, history)| {
                history
                    .iter()
                    .rev()
                    .find(|o| o.active)
                    .map(|o| (slot.clone(), o.clone()))
            })
            .collect()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let Ok(snapshot) = self.snapshot.lock() else {
            return Err(Error::Storage {
                operation: "persist_profile".to_string(),
                cause: "profile lock poisoned".to_string(),
            });
        };
        let json = serde_json::to_string_pretty(&*snapshot).map_err(|e| Error::Storage {
            operation: "persist_profile".to_string(),
            cause: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| Error::Storage {
            operation: "persist_profile".to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedFact;

    fn fact(slot: &str, value: &str) -> ExtractedFact {
        ExtractedFact::new(slot, value, value.to_lowercase())
    }

    #[test]
    fn test_observe_and_current() {
        let profile = GlobalUserProfile::in_memory();
        profile.observe(&fact("employer", "Microsoft"), 1.0, Some("t1")).unwrap();
        let current = profile.current_value("employer").unwrap();
        assert_eq!(current.normalized, "microsoft");
        assert!(current.active);
    }

    #[test]
    fn test_supersede_keeps_history() {
        let profile = GlobalUserProfile::in_memory();
        profile.observe(&fact("employer", "Microsoft"), 1.0, None).unwrap();
        profile.observe(&fact("employer", "Amazon"), 2.0, None).unwrap();

        let current = profile.current_value("employer").unwrap();
        assert_eq!(current.normalized, "amazon");

        let history = profile.history("employer");
        assert_eq!(history.len(), 2);
        assert!(!history[0].active);
        assert!(history[1].active);
    }

    #[test]
    fn test_reobservation_refreshes_without_churn() {
        let profile = GlobalUserProfile::in_memory();
        profile.observe(&fact("name", "Sarah"), 1.0, None).unwrap();
        profile.observe(&fact("name", "Sarah"), 5.0, None).unwrap();
        let history = profile.history("name");
        assert_eq!(history.len(), 1);
        assert!((history[0].observed_at - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        {
            let profile = GlobalUserProfile::load(&path).unwrap();
            profile.observe(&fact("location", "Seattle"), 1.0, None).unwrap();
        }
        let reloaded = GlobalUserProfile::load(&path).unwrap();
        assert_eq!(reloaded.current_value("location").unwrap().normalized, "seattle");
    }

    #[test]
    fn test_active_slots() {
        let profile = GlobalUserProfile::in_memory();
        profile.observe(&fact("name", "Sarah"), 1.0, None).unwrap();
        profile.observe(&fact("employer", "Google"), 2.0, None).unwrap();
        let active = profile.active_slots();
        assert_eq!(active.len(), 2);
        assert!(active.contains_key("name"));
    }
}
