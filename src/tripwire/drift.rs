//! Staleness detection: compare a fresh resolution to the locked one.

use crate::core::types::ResolvedLock;
use crate::tripwire::hasher;
use serde_yaml_ng::Value;

/// A locked resolution that no longer matches.
#[derive(Debug, Clone)]
pub struct StaleFinding {
    pub expected_fingerprint: String,
    pub actual_fingerprint: String,
    /// Top-level keys added, removed or changed, in lock order then new keys
    pub changed_keys: Vec<String>,
}

impl std::fmt::Display for StaleFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "resolved config is stale ({} != {})",
            self.expected_fingerprint, self.actual_fingerprint
        )?;
        if !self.changed_keys.is_empty() {
            write!(f, ", changed: {}", self.changed_keys.join(", "))?;
        }
        Ok(())
    }
}

/// Compare `fresh` against the lock. `None` when the fingerprints agree.
pub fn detect_stale(lock: &ResolvedLock, fresh: &Value) -> Option<StaleFinding> {
    let actual = hasher::fingerprint(fresh);
    if actual == lock.fingerprint {
        return None;
    }
    Some(StaleFinding {
        expected_fingerprint: lock.fingerprint.clone(),
        actual_fingerprint: actual,
        changed_keys: changed_top_level_keys(&lock.config, fresh),
    })
}

/// True when the lock recorded an inputs hash that differs from `current`.
/// Locks written without one never report input drift.
pub fn inputs_changed(lock: &ResolvedLock, current: &str) -> bool {
    lock.inputs.as_deref().is_some_and(|recorded| recorded != current)
}

fn changed_top_level_keys(locked: &Value, fresh: &Value) -> Vec<String> {
    let (Some(old), Some(new)) = (locked.as_mapping(), fresh.as_mapping()) else {
        return vec!["<root>".to_string()];
    };

    let mut changed = Vec::new();
    for (key, old_val) in old {
        let same = new
            .get(key)
            .is_some_and(|new_val| hasher::fingerprint(old_val) == hasher::fingerprint(new_val));
        if !same {
            changed.push(crate::core::types::yaml_value_to_string(key));
        }
    }
    for key in new.keys() {
        if !old.contains_key(key) {
            changed.push(crate::core::types::yaml_value_to_string(key));
        }
    }
    changed
}
