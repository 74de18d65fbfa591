//! Resolved lock management: load, save (atomic), path derivation.

use super::types::ResolvedLock;
use crate::tripwire::hasher::fingerprint;
use serde_yaml_ng::Value;
use std::path::{Path, PathBuf};

/// Lock schema version written by this build.
pub const LOCK_SCHEMA: &str = "1.0";

/// Derive the lock file path within the state directory.
pub fn lock_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join("resolved.lock.yaml")
}

/// Load the lock file. Returns None if it doesn't exist.
pub fn load_lock(state_dir: &Path) -> Result<Option<ResolvedLock>, String> {
    let path = lock_file_path(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let lock: ResolvedLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("invalid lock file {}: {}", path.display(), e))?;
    Ok(Some(lock))
}

/// Save the lock file atomically (write to temp, then rename).
pub fn save_lock(state_dir: &Path, lock: &ResolvedLock) -> Result<PathBuf, String> {
    std::fs::create_dir_all(state_dir)
        .map_err(|e| format!("cannot create dir {}: {}", state_dir.display(), e))?;
    let path = lock_file_path(state_dir);

    let yaml = serde_yaml_ng::to_string(lock).map_err(|e| format!("serialize error: {}", e))?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "cannot rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;

    Ok(path)
}

/// Create a lock for a freshly resolved config.
pub fn new_lock(name: &str, config: Value) -> ResolvedLock {
    ResolvedLock {
        schema: LOCK_SCHEMA.to_string(),
        name: name.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        generator: format!("stackdef {}", env!("CARGO_PKG_VERSION")),
        fingerprint: fingerprint(&config),
        inputs: None,
        config,
    }
}
