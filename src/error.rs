//! Error types for schema loading, merging and resolution.

use crate::core::types::{FieldPath, Stage, Violation};
use thiserror::Error;

/// Schema declaration errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema parse error: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    #[error("field '{path}': unknown type '{found}'")]
    UnknownType { path: String, found: String },

    #[error("field '{0}': names ending in `_defaults` are reserved")]
    ReservedName(String),

    #[error("field '{path}': {message}")]
    Invalid { path: String, message: String },
}

/// Merge engine errors
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{which} must be a mapping at the root, found {found}")]
    NotAMapping {
        which: &'static str,
        found: &'static str,
    },

    #[error("nesting deeper than {limit} levels at {path}")]
    DepthExceeded { path: FieldPath, limit: usize },
}

/// Errors from schema-checked resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("{stage} does not match its shape ({} violation(s)): {}", .violations.len(), summarize(.violations))]
    Invalid {
        stage: Stage,
        violations: Vec<Violation>,
    },

    #[error("required field {path} is set in neither config nor defaults")]
    MissingRequiredField { path: FieldPath },

    #[error("serialization error: {0}")]
    Serde(String),
}

fn summarize(violations: &[Violation]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = violations.iter().take(SHOWN).map(|v| v.to_string()).collect();
    if violations.len() > SHOWN {
        parts.push(format!("and {} more", violations.len() - SHOWN));
    }
    parts.join("; ")
}

impl From<serde_yaml_ng::Error> for ResolveError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ResolveError::Serde(err.to_string())
    }
}
