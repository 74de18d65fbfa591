//! Shared types: field paths, merge options, conformance violations,
//! the `stackdef.yaml` project file and the resolved lock.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Reserved suffix for keys that carry a field's own defaults.
pub const DEFAULTS_SUFFIX: &str = "_defaults";

// ============================================================================
// Field paths
// ============================================================================

/// One step in a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a field inside a configuration tree.
///
/// Renders as `backend.environments[1].autoscaling.minInstances`; the empty
/// path renders as `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path such as `backend.environments[0].name`.
    pub fn parse(s: &str) -> Self {
        let mut path = Self::root();
        for part in s.split('.').filter(|p| !p.is_empty()) {
            let (key, rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if !key.is_empty() {
                path.push_key(key);
            }
            for idx in rest.split('[').filter(|p| !p.is_empty()) {
                match idx.trim_end_matches(']').parse::<usize>() {
                    Ok(i) => path.push_index(i),
                    Err(_) => path.push_key(idx),
                }
            }
        }
        path
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(PathSegment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    /// New path with `key` appended.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut p = self.clone();
        p.push_key(key);
        p
    }

    /// New path with `index` appended.
    pub fn index(&self, index: usize) -> Self {
        let mut p = self.clone();
        p.push_index(index);
        p
    }

    /// Number of mapping levels below the root (array indices don't count).
    pub fn depth(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PathSegment::Key(_)))
            .count()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Key(k) if i == 0 => write!(f, "{}", k)?,
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Merge options
// ============================================================================

/// Rule used to pick between a config value and its default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coalesce {
    /// Legacy rule: any falsy config value (`null`, `false`, `0`, `""`)
    /// falls through to the default.
    Truthy,
    /// Any non-null config value wins.
    #[default]
    Presence,
}

impl fmt::Display for Coalesce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truthy => write!(f, "truthy"),
            Self::Presence => write!(f, "presence"),
        }
    }
}

/// How gaps in the merged tree are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Merge only. Fields set nowhere are silently omitted.
    Legacy,
    /// Validate inputs and output against the schema-derived shapes.
    #[default]
    Strict,
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Merge engine knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    #[serde(default)]
    pub coalesce: Coalesce,

    #[serde(default)]
    pub mode: ResolveMode,

    /// Maximum mapping nesting accepted before the merge bails out
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    64
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            coalesce: Coalesce::default(),
            mode: ResolveMode::default(),
            max_depth: default_max_depth(),
        }
    }
}

impl MergeOptions {
    /// Options reproducing the historical behaviour: truthy coalescing, no
    /// validation.
    pub fn legacy() -> Self {
        Self {
            coalesce: Coalesce::Truthy,
            mode: ResolveMode::Legacy,
            ..Self::default()
        }
    }
}

// ============================================================================
// Conformance violations
// ============================================================================

/// Which tree a validation pass looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Defaults,
    Result,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Defaults => write!(f, "defaults"),
            Self::Result => write!(f, "resolved config"),
        }
    }
}

/// A single place where an instance does not match its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Missing {
        path: FieldPath,
    },
    Unknown {
        path: FieldPath,
    },
    TypeMismatch {
        path: FieldPath,
        expected: String,
        found: &'static str,
    },
    EmptyArray {
        path: FieldPath,
    },
    NotInChoices {
        path: FieldPath,
        value: String,
        choices: Vec<String>,
    },
}

impl Violation {
    pub fn path(&self) -> &FieldPath {
        match self {
            Self::Missing { path }
            | Self::Unknown { path }
            | Self::TypeMismatch { path, .. }
            | Self::EmptyArray { path }
            | Self::NotInChoices { path, .. } => path,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path } => write!(f, "{}: required field is missing", path),
            Self::Unknown { path } => write!(f, "{}: unknown field", path),
            Self::TypeMismatch {
                path,
                expected,
                found,
            } => write!(f, "{}: expected {}, found {}", path, expected, found),
            Self::EmptyArray { path } => write!(f, "{}: array must not be empty", path),
            Self::NotInChoices {
                path,
                value,
                choices,
            } => write!(
                f,
                "{}: '{}' is not one of: {}",
                path,
                value,
                choices.join(", ")
            ),
        }
    }
}

// ============================================================================
// Project file (stackdef.yaml)
// ============================================================================

/// Root project file: where the schema, config and defaults live and how
/// they are merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable project name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Schema file. The built-in application schema is used when absent.
    #[serde(default)]
    pub schema: Option<PathBuf>,

    /// Partial configuration instance
    pub config: PathBuf,

    /// Defaults tree
    pub defaults: PathBuf,

    #[serde(default)]
    pub merge: MergeOptions,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============================================================================
// Resolved lock
// ============================================================================

/// A resolved configuration persisted together with its fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLock {
    /// Lock schema version
    pub schema: String,

    /// Project name
    pub name: String,

    /// When the lock was generated (RFC 3339)
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// BLAKE3 fingerprint of `config`
    pub fingerprint: String,

    /// Composite hash of the schema, config and defaults files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<String>,

    /// The resolved configuration tree
    pub config: serde_yaml_ng::Value,
}

// ============================================================================
// Value helpers
// ============================================================================

/// Render a scalar YAML value as a plain string.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// Short name of a value's kind, for error messages.
pub fn value_kind(val: &serde_yaml_ng::Value) -> &'static str {
    match val {
        serde_yaml_ng::Value::Null => "null",
        serde_yaml_ng::Value::Bool(_) => "boolean",
        serde_yaml_ng::Value::Number(_) => "number",
        serde_yaml_ng::Value::String(_) => "string",
        serde_yaml_ng::Value::Sequence(_) => "array",
        serde_yaml_ng::Value::Mapping(_) => "object",
        serde_yaml_ng::Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_path_display() {
        let mut p = FieldPath::root();
        assert_eq!(p.to_string(), "<root>");
        p.push_key("backend");
        p.push_key("environments");
        p.push_index(1);
        p.push_key("minInstances");
        assert_eq!(p.to_string(), "backend.environments[1].minInstances");
        assert_eq!(p.depth(), 3);
        p.pop();
        assert_eq!(p.to_string(), "backend.environments[1]");
    }

    #[test]
    fn test_field_path_parse_roundtrip() {
        let p = FieldPath::parse("backend.environments[0].healthCheck.path");
        assert_eq!(p.to_string(), "backend.environments[0].healthCheck.path");
        assert_eq!(p, FieldPath::root().child("backend").child("environments").index(0).child("healthCheck").child("path"));
    }

    #[test]
    fn test_merge_options_defaults() {
        let o = MergeOptions::default();
        assert_eq!(o.coalesce, Coalesce::Presence);
        assert_eq!(o.mode, ResolveMode::Strict);
        assert_eq!(o.max_depth, 64);

        let legacy = MergeOptions::legacy();
        assert_eq!(legacy.coalesce, Coalesce::Truthy);
        assert_eq!(legacy.mode, ResolveMode::Legacy);
    }

    #[test]
    fn test_merge_options_serde() {
        let o: MergeOptions = serde_yaml_ng::from_str("coalesce: truthy\n").unwrap();
        assert_eq!(o.coalesce, Coalesce::Truthy);
        assert_eq!(o.mode, ResolveMode::Strict);
        assert_eq!(o.max_depth, 64);
    }

    #[test]
    fn test_project_config_parse() {
        let yaml = r#"
version: "1.0"
name: games
config: config.yaml
defaults: defaults.yaml
merge:
  mode: legacy
"#;
        let p: ProjectConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(p.name, "games");
        assert!(p.schema.is_none());
        assert_eq!(p.merge.mode, ResolveMode::Legacy);
        assert_eq!(p.merge.coalesce, Coalesce::Presence);
        assert_eq!(p.logging.level, "warn");
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::NotInChoices {
            path: FieldPath::parse("healthCheck.protocol"),
            value: "FTP".to_string(),
            choices: vec!["HTTP".to_string(), "HTTPS".to_string()],
        };
        assert_eq!(
            v.to_string(),
            "healthCheck.protocol: 'FTP' is not one of: HTTP, HTTPS"
        );
        assert_eq!(v.path().to_string(), "healthCheck.protocol");
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(
            yaml_value_to_string(&serde_yaml_ng::Value::String("hello".into())),
            "hello"
        );
        assert_eq!(yaml_value_to_string(&serde_yaml_ng::Value::Null), "");
        assert_eq!(value_kind(&serde_yaml_ng::Value::Bool(true)), "boolean");
        assert_eq!(
            value_kind(&serde_yaml_ng::Value::Mapping(Default::default())),
            "object"
        );
    }
}
