//! Merge engine: combine a partial config tree with its defaults tree.
//!
//! For every mapping node the result keys are the config keys followed by
//! the defaults keys (with a trailing `_defaults` stripped), in first-seen
//! order. Each key takes the config value, else the default value. The
//! `<key>_defaults` entry of the defaults node is the defaults tree used
//! when recursing into that key; array elements all share it. Mappings
//! inside nested arrays or behind a YAML tag are merged too.
//!
//! Neither input is modified. No `_defaults` key survives into the result.

use super::types::{value_kind, Coalesce, FieldPath, MergeOptions, DEFAULTS_SUFFIX};
use crate::error::MergeError;
use indexmap::IndexSet;
use serde_yaml_ng::value::TaggedValue;
use serde_yaml_ng::{Mapping, Value};
use tracing::{debug, trace, warn};

/// Merge `config` over `defaults`. Both roots must be mappings.
///
/// Fields set in neither tree are omitted from the result.
pub fn generate_final_config(
    config: &Value,
    defaults: &Value,
    options: &MergeOptions,
) -> Result<Value, MergeError> {
    let config = root_mapping(config, "config")?;
    let defaults = root_mapping(defaults, "defaults")?;
    let mut path = FieldPath::root();
    let merged = merge_mapping(config, defaults, options, &mut path)?;
    Ok(Value::Mapping(merged))
}

fn root_mapping<'a>(value: &'a Value, which: &'static str) -> Result<&'a Mapping, MergeError> {
    match value {
        Value::Mapping(m) => Ok(m),
        other => Err(MergeError::NotAMapping {
            which,
            found: value_kind(other),
        }),
    }
}

fn merge_mapping(
    config: &Mapping,
    defaults: &Mapping,
    options: &MergeOptions,
    path: &mut FieldPath,
) -> Result<Mapping, MergeError> {
    if path.depth() > options.max_depth {
        return Err(MergeError::DepthExceeded {
            path: path.clone(),
            limit: options.max_depth,
        });
    }

    let empty = Mapping::new();
    let mut result = Mapping::new();

    for key in result_keys(config, defaults, path) {
        path.push_key(key_name(&key));

        let selected = select(config.get(&key), defaults.get(&key), options.coalesce);
        let nested = nested_defaults(defaults, &key, path).unwrap_or(&empty);

        match selected {
            None => {
                debug!(field = %path, "unset in both config and defaults");
            }
            Some(value) => {
                let merged = merge_value(value, nested, options, path)?;
                result.insert(key, merged);
            }
        }

        path.pop();
    }

    Ok(result)
}

/// Merge one selected value. Mappings recurse with `nested`; array
/// elements all share it, except arrays nested inside arrays, whose
/// elements merge against an empty defaults tree. Tags are kept.
fn merge_value(
    value: &Value,
    nested: &Mapping,
    options: &MergeOptions,
    path: &mut FieldPath,
) -> Result<Value, MergeError> {
    match value {
        Value::Mapping(child) => Ok(Value::Mapping(merge_mapping(child, nested, options, path)?)),
        Value::Sequence(items) => {
            let empty = Mapping::new();
            let mut merged = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let element_defaults = match untag(item) {
                    Value::Sequence(_) => &empty,
                    _ => nested,
                };
                path.push_index(i);
                merged.push(merge_value(item, element_defaults, options, path)?);
                path.pop();
            }
            Ok(Value::Sequence(merged))
        }
        Value::Tagged(tagged) => Ok(Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: merge_value(&tagged.value, nested, options, path)?,
        }))),
        scalar => Ok(scalar.clone()),
    }
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

/// Union of config keys and stripped defaults keys, first-seen order.
fn result_keys(config: &Mapping, defaults: &Mapping, path: &FieldPath) -> IndexSet<Value> {
    let mut keys = IndexSet::with_capacity(config.len() + defaults.len());
    for key in config.keys() {
        if is_reserved(key) {
            warn!(
                field = %path.child(key_name(key)),
                "config key uses the reserved `{}` suffix; dropped", DEFAULTS_SUFFIX
            );
            continue;
        }
        keys.insert(key.clone());
    }
    for key in defaults.keys() {
        match key.as_str().and_then(|k| k.strip_suffix(DEFAULTS_SUFFIX)) {
            Some("") => {}
            // `a_defaults_defaults` would surface `a_defaults`
            Some(base) if base.ends_with(DEFAULTS_SUFFIX) => {
                debug!(field = %path.child(key_name(key)), "ignoring doubly-suffixed defaults key");
            }
            Some(base) => {
                keys.insert(Value::String(base.to_string()));
            }
            None => {
                keys.insert(key.clone());
            }
        }
    }
    keys
}

fn is_reserved(key: &Value) -> bool {
    key.as_str().is_some_and(|k| k.ends_with(DEFAULTS_SUFFIX))
}

fn key_name(key: &Value) -> String {
    match key.as_str() {
        Some(s) => s.to_string(),
        None => super::types::yaml_value_to_string(key),
    }
}

/// The `<key>_defaults` mapping for `key`, if any. Anything that is not a
/// mapping is ignored.
fn nested_defaults<'a>(defaults: &'a Mapping, key: &Value, path: &FieldPath) -> Option<&'a Mapping> {
    let name = key.as_str()?;
    match defaults.get(format!("{}{}", name, DEFAULTS_SUFFIX)) {
        Some(Value::Mapping(m)) => Some(m),
        Some(Value::Null) | None => None,
        Some(other) => {
            debug!(
                field = %path,
                found = value_kind(other),
                "ignoring non-mapping nested defaults"
            );
            None
        }
    }
}

fn select<'a>(
    config: Option<&'a Value>,
    default: Option<&'a Value>,
    rule: Coalesce,
) -> Option<&'a Value> {
    let present = |v: &&Value| !v.is_null();
    match rule {
        Coalesce::Presence => config.filter(present).or(default.filter(present)),
        // `config || default`: a falsy config value yields the default even
        // when the default is itself falsy or missing.
        Coalesce::Truthy => match config.filter(|v| is_truthy(v)) {
            Some(v) => Some(v),
            None => {
                if let Some(v) = config.filter(present) {
                    trace!(value = ?v, "falsy config value replaced by default");
                }
                default.filter(present)
            }
        },
    }
}

/// Truthiness used by [`Coalesce::Truthy`].
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(_) | Value::Mapping(_) => true,
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}
