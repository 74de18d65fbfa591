//! Schema-checked resolution.
//!
//! In strict mode the config is checked against the declared schema, the
//! defaults against the derived defaults shape, and the merged tree against
//! the final shape, so gaps are reported with their path right away instead
//! of surfacing when the resolved config is first read.

use super::merge::generate_final_config;
use super::schema::Schema;
use super::shape::{check_conforms, derive_defaults_shape, derive_final_shape};
use super::types::{MergeOptions, ResolveMode, Stage, Violation};
use crate::error::ResolveError;
use serde_yaml_ng::Value;
use tracing::{debug, info};

/// Resolve `config` against `defaults` according to `options.mode`.
pub fn resolve(
    schema: &Schema,
    config: &Value,
    defaults: &Value,
    options: &MergeOptions,
) -> Result<Value, ResolveError> {
    info!(mode = %options.mode, coalesce = %options.coalesce, "resolving configuration");
    match options.mode {
        ResolveMode::Legacy => Ok(generate_final_config(config, defaults, options)?),
        ResolveMode::Strict => resolve_strict(schema, config, defaults, options),
    }
}

fn resolve_strict(
    schema: &Schema,
    config: &Value,
    defaults: &Value,
    options: &MergeOptions,
) -> Result<Value, ResolveError> {
    ensure_conforms(Stage::Config, config, schema)?;
    ensure_conforms(Stage::Defaults, defaults, &derive_defaults_shape(schema))?;

    let merged = generate_final_config(config, defaults, options)?;

    let violations = check_conforms(&merged, &derive_final_shape(schema));
    if let Some(path) = violations.iter().find_map(|v| match v {
        Violation::Missing { path } => Some(path.clone()),
        _ => None,
    }) {
        return Err(ResolveError::MissingRequiredField { path });
    }
    if !violations.is_empty() {
        return Err(ResolveError::Invalid {
            stage: Stage::Result,
            violations,
        });
    }
    Ok(merged)
}

fn ensure_conforms(stage: Stage, value: &Value, shape: &Schema) -> Result<(), ResolveError> {
    let violations = check_conforms(value, shape);
    if violations.is_empty() {
        debug!(%stage, "conforms");
        return Ok(());
    }
    Err(ResolveError::Invalid { stage, violations })
}
