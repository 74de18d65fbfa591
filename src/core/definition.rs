//! Typed configuration definitions.
//!
//! A definition ties a [`Schema`] to three Rust types: the draft a caller
//! writes (defaulted fields are `Option`s), the defaults tree, and the
//! resolved config where defaulted fields are plain values.

use super::resolve::resolve;
use super::schema::Schema;
use super::types::MergeOptions;
use crate::error::ResolveError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A configuration with draft, defaults and resolved representations.
pub trait ConfigDefinition {
    /// What callers write; fields with defaults may be left out.
    type Draft: Serialize;
    /// The defaults tree, following the derived defaults shape.
    type Defaults: Serialize;
    /// The resolved configuration.
    type Resolved: DeserializeOwned;

    fn schema() -> Schema;
}

/// Resolve a typed draft against typed defaults.
pub fn resolve_typed<D: ConfigDefinition>(
    draft: &D::Draft,
    defaults: &D::Defaults,
    options: &MergeOptions,
) -> Result<D::Resolved, ResolveError> {
    let config = serde_yaml_ng::to_value(draft)?;
    let defaults = serde_yaml_ng::to_value(defaults)?;
    let resolved = resolve(&D::schema(), &config, &defaults, options)?;
    Ok(serde_yaml_ng::from_value(resolved)?)
}
