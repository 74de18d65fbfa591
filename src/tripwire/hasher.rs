//! BLAKE3 fingerprints for resolved configuration trees and project inputs.

use serde_yaml_ng::value::TaggedValue;
use serde_yaml_ng::Value;
use std::path::Path;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(format!("blake3:{}", blake3::hash(&bytes).to_hex()))
}

/// Fingerprint a value tree.
///
/// Mapping keys are sorted at every depth before the tree is rendered as
/// YAML, so two trees that differ only in mapping order fingerprint the
/// same. Scalars keep their YAML identity: `1` and `"1"` differ, as do
/// `.nan` and `null`.
pub fn fingerprint(value: &Value) -> String {
    match serde_yaml_ng::to_string(&canonical(value)) {
        Ok(text) => hash_string(&text),
        Err(e) => hash_string(&format!("unserializable:{}", e)),
    }
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Mapping(mapping) => {
            let mut entries: Vec<(String, Value, Value)> = mapping
                .iter()
                .map(|(k, v)| {
                    let k = canonical(k);
                    (sort_key(&k), k, canonical(v))
                })
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Mapping(entries.into_iter().map(|(_, k, v)| (k, v)).collect())
        }
        Value::Sequence(items) => Value::Sequence(items.iter().map(canonical).collect()),
        Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: canonical(&tagged.value),
        })),
        scalar => scalar.clone(),
    }
}

fn sort_key(key: &Value) -> String {
    serde_yaml_ng::to_string(key).unwrap_or_default()
}

/// Compute a composite hash from multiple component hashes.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
