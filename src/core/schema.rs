//! Configuration shapes and defaulting markers.
//!
//! A [`Schema`] is an ordered set of named [`Field`]s. Every field carries
//! its [`Shape`], whether it may be omitted, and an optional [`Marker`] that
//! changes how defaults apply to it. Markers live beside the shape and never
//! touch the value representation.
//!
//! Schemas are written in YAML. A field is either shorthand
//! (`string`, `integer?`) or a mapping:
//!
//! ```yaml
//! healthCheck:
//!   type: object
//!   optional: true
//!   fields:
//!     protocol: { type: string, optional: true, choices: [HTTP, HTTPS] }
//!     port: integer?
//! description: { type: string, optional: true, marker: no_default }
//! ```

use super::types::DEFAULTS_SUFFIX;
use crate::error::SchemaError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
    Any,
}

impl ScalarKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Defaulting tag attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Never defaulted; absence propagates to the resolved config.
    NoDefault,
    /// Defaulted, but the default itself may be absent.
    NullableDefault,
}

/// Effective defaulting policy of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// Must come from the config instance.
    Required,
    /// Optional in config, guaranteed after resolution.
    WithDefault,
    /// Optional, never defaulted.
    NoDefault,
    /// Optional, default may be absent.
    NullableDefault,
}

/// Structural shape of a field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Scalar {
        kind: ScalarKind,
        choices: Vec<String>,
    },
    Object(Schema),
    Array {
        items: Box<Shape>,
        non_empty: bool,
    },
}

impl Shape {
    pub fn scalar(kind: ScalarKind) -> Self {
        Self::Scalar {
            kind,
            choices: Vec::new(),
        }
    }

    /// The schema that defaults recurse into: the object itself, or the
    /// element of an array of objects.
    pub fn element_schema(&self) -> Option<&Schema> {
        match self {
            Self::Object(schema) => Some(schema),
            Self::Array { items, .. } => match items.as_ref() {
                Self::Object(schema) => Some(schema),
                _ => None,
            },
            Self::Scalar { .. } => None,
        }
    }

    /// Human-readable description used in violations.
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar { kind, choices } if choices.is_empty() => kind.to_string(),
            Self::Scalar { choices, .. } => format!("one of {}", choices.join(", ")),
            Self::Object(_) => "object".to_string(),
            Self::Array { items, .. } => format!("array of {}", items.describe()),
        }
    }

    fn mark_no_default_deep(&mut self) {
        match self {
            Self::Object(schema) => {
                for field in schema.fields.values_mut() {
                    if field.marker.is_none() {
                        field.marker = Some(Marker::NoDefault);
                    }
                    field.shape.mark_no_default_deep();
                }
            }
            Self::Array { items, .. } => items.mark_no_default_deep(),
            Self::Scalar { .. } => {}
        }
    }
}

/// A named slot in a [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub shape: Shape,
    pub optional: bool,
    pub marker: Option<Marker>,
}

impl Field {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            optional: false,
            marker: None,
        }
    }

    pub fn string() -> Self {
        Self::new(Shape::scalar(ScalarKind::String))
    }

    pub fn number() -> Self {
        Self::new(Shape::scalar(ScalarKind::Number))
    }

    pub fn integer() -> Self {
        Self::new(Shape::scalar(ScalarKind::Integer))
    }

    pub fn boolean() -> Self {
        Self::new(Shape::scalar(ScalarKind::Boolean))
    }

    pub fn any() -> Self {
        Self::new(Shape::scalar(ScalarKind::Any))
    }

    pub fn object(schema: Schema) -> Self {
        Self::new(Shape::Object(schema))
    }

    pub fn array(items: Shape) -> Self {
        Self::new(Shape::Array {
            items: Box::new(items),
            non_empty: false,
        })
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Never default this field. On objects and arrays the marker also
    /// reaches every unmarked descendant field.
    pub fn no_default(mut self) -> Self {
        self.marker = Some(Marker::NoDefault);
        self.shape.mark_no_default_deep();
        self
    }

    pub fn nullable_default(mut self) -> Self {
        self.marker = Some(Marker::NullableDefault);
        self
    }

    /// Like [`Field::no_default`], but a marker already on this field is
    /// kept. Descendants that already carry a marker keep it too.
    pub fn deep_no_default(mut self) -> Self {
        if self.marker.is_none() {
            self.marker = Some(Marker::NoDefault);
        }
        self.shape.mark_no_default_deep();
        self
    }

    /// Require at least one element. No effect on non-arrays.
    pub fn non_empty(mut self) -> Self {
        if let Shape::Array { non_empty, .. } = &mut self.shape {
            *non_empty = true;
        }
        self
    }

    /// Restrict a scalar to a fixed set of string values.
    pub fn choices<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Shape::Scalar { choices, .. } = &mut self.shape {
            *choices = values.into_iter().map(Into::into).collect();
        }
        self
    }

    pub fn policy(&self) -> DefaultPolicy {
        match (self.optional, self.marker) {
            (_, Some(Marker::NoDefault)) => DefaultPolicy::NoDefault,
            (_, Some(Marker::NullableDefault)) => DefaultPolicy::NullableDefault,
            (true, None) => DefaultPolicy::WithDefault,
            (false, None) => DefaultPolicy::Required,
        }
    }
}

/// Ordered set of named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: IndexMap<String, Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a schema document, rejecting malformed declarations.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let decls: IndexMap<String, FieldDecl> = serde_yaml_ng::from_str(yaml)?;
        schema_from_decls("", decls)
    }

    pub fn to_yaml(&self) -> Result<String, SchemaError> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    fn to_decls(&self) -> IndexMap<String, FieldDecl> {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), decl_from_field(field)))
            .collect()
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_decls().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let decls = IndexMap::<String, FieldDecl>::deserialize(deserializer)?;
        schema_from_decls("", decls).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// YAML declarations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FieldDecl {
    Short(String),
    Full(Box<FieldSpec>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default, skip_serializing_if = "is_false")]
    optional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    marker: Option<MarkerDecl>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    choices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<IndexMap<String, FieldDecl>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<FieldDecl>,

    #[serde(default, skip_serializing_if = "is_false")]
    non_empty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MarkerDecl {
    NoDefault,
    NullableDefault,
    DeepNoDefault,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn invalid(path: &str, message: &str) -> SchemaError {
    SchemaError::Invalid {
        path: path.to_string(),
        message: message.to_string(),
    }
}

fn schema_from_decls(
    prefix: &str,
    decls: IndexMap<String, FieldDecl>,
) -> Result<Schema, SchemaError> {
    let mut schema = Schema::new();
    for (name, decl) in decls {
        let path = join_path(prefix, &name);
        if name.ends_with(DEFAULTS_SUFFIX) {
            return Err(SchemaError::ReservedName(path));
        }
        let field = field_from_decl(&path, decl)?;
        schema.insert(name, field);
    }
    Ok(schema)
}

fn field_from_decl(path: &str, decl: FieldDecl) -> Result<Field, SchemaError> {
    match decl {
        FieldDecl::Short(text) => {
            let text = text.trim();
            let (name, optional) = match text.strip_suffix('?') {
                Some(name) => (name.trim(), true),
                None => (text, false),
            };
            let kind = match ScalarKind::from_name(name) {
                Some(kind) => kind,
                None if name == "object" || name == "array" => {
                    return Err(invalid(path, "object and array fields need the mapping form"));
                }
                None => {
                    return Err(SchemaError::UnknownType {
                        path: path.to_string(),
                        found: name.to_string(),
                    })
                }
            };
            let mut field = Field::new(Shape::scalar(kind));
            field.optional = optional;
            Ok(field)
        }
        FieldDecl::Full(spec) => {
            let spec = *spec;
            let optional = spec.optional;
            let marker = spec.marker;
            let mut field = Field::new(shape_from_spec(path, spec)?);
            field.optional = optional;
            Ok(match marker {
                Some(MarkerDecl::NoDefault) => field.no_default(),
                Some(MarkerDecl::NullableDefault) => field.nullable_default(),
                Some(MarkerDecl::DeepNoDefault) => field.deep_no_default(),
                None => field,
            })
        }
    }
}

fn shape_from_spec(path: &str, spec: FieldSpec) -> Result<Shape, SchemaError> {
    match spec.kind.as_str() {
        "object" => {
            if spec.items.is_some() || !spec.choices.is_empty() || spec.non_empty {
                return Err(invalid(path, "objects only accept `fields`"));
            }
            let fields = spec
                .fields
                .ok_or_else(|| invalid(path, "object fields need `fields`"))?;
            Ok(Shape::Object(schema_from_decls(path, fields)?))
        }
        "array" => {
            if spec.fields.is_some() || !spec.choices.is_empty() {
                return Err(invalid(path, "arrays only accept `items` and `non_empty`"));
            }
            let items = spec
                .items
                .ok_or_else(|| invalid(path, "array fields need `items`"))?;
            let item_path = format!("{}[]", path);
            let item = field_from_decl(&item_path, items)?;
            if item.optional || item.marker.is_some() {
                return Err(invalid(&item_path, "array items cannot be optional or marked"));
            }
            Ok(Shape::Array {
                items: Box::new(item.shape),
                non_empty: spec.non_empty,
            })
        }
        other => {
            let kind = ScalarKind::from_name(other).ok_or_else(|| SchemaError::UnknownType {
                path: path.to_string(),
                found: other.to_string(),
            })?;
            if spec.fields.is_some() || spec.items.is_some() || spec.non_empty {
                return Err(invalid(path, "scalars cannot declare `fields`, `items` or `non_empty`"));
            }
            if !spec.choices.is_empty() && kind != ScalarKind::String {
                return Err(invalid(path, "`choices` only applies to strings"));
            }
            Ok(Shape::Scalar {
                kind,
                choices: spec.choices,
            })
        }
    }
}

fn decl_from_field(field: &Field) -> FieldDecl {
    if let Shape::Scalar { kind, choices } = &field.shape {
        if choices.is_empty() && field.marker.is_none() {
            let suffix = if field.optional { "?" } else { "" };
            return FieldDecl::Short(format!("{}{}", kind, suffix));
        }
    }
    FieldDecl::Full(Box::new(spec_from_field(field)))
}

fn spec_from_field(field: &Field) -> FieldSpec {
    let mut spec = FieldSpec {
        kind: String::new(),
        optional: field.optional,
        marker: field.marker.map(|m| match m {
            Marker::NoDefault => MarkerDecl::NoDefault,
            Marker::NullableDefault => MarkerDecl::NullableDefault,
        }),
        choices: Vec::new(),
        fields: None,
        items: None,
        non_empty: false,
    };
    match &field.shape {
        Shape::Scalar { kind, choices } => {
            spec.kind = kind.to_string();
            spec.choices.clone_from(choices);
        }
        Shape::Object(schema) => {
            spec.kind = "object".to_string();
            spec.fields = Some(schema.to_decls());
        }
        Shape::Array { items, non_empty } => {
            spec.kind = "array".to_string();
            spec.items = Some(decl_from_field(&Field::new(items.as_ref().clone())));
            spec.non_empty = *non_empty;
        }
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA_YAML: &str = r#"
name: string
description: { type: string, optional: true, marker: no_default }
subdomain: { type: string, optional: true, marker: nullable_default }
instances:
  type: object
  optional: true
  fields:
    instanceType: string?
    minInstances: integer?
healthCheck:
  type: object
  fields:
    protocol: { type: string, optional: true, choices: [HTTP, HTTPS] }
    port: integer?
tags:
  type: array
  items: string
environments:
  type: array
  non_empty: true
  items:
    type: object
    fields:
      name: string
      wave: integer?
"#;

    #[test]
    fn test_policy_derivation() {
        assert_eq!(Field::string().policy(), DefaultPolicy::Required);
        assert_eq!(Field::string().optional().policy(), DefaultPolicy::WithDefault);
        assert_eq!(
            Field::string().optional().no_default().policy(),
            DefaultPolicy::NoDefault
        );
        assert_eq!(Field::string().no_default().policy(), DefaultPolicy::NoDefault);
        assert_eq!(
            Field::string().optional().nullable_default().policy(),
            DefaultPolicy::NullableDefault
        );
    }

    #[test]
    fn test_parse_shorthand_and_full() {
        let schema = Schema::from_yaml(SCHEMA_YAML).unwrap();
        assert_eq!(schema.len(), 7);
        assert_eq!(schema.get("name").unwrap(), &Field::string());
        assert_eq!(
            schema.get("description").unwrap().policy(),
            DefaultPolicy::NoDefault
        );
        assert_eq!(
            schema.get("subdomain").unwrap().policy(),
            DefaultPolicy::NullableDefault
        );

        let hc = schema.get("healthCheck").unwrap();
        let inner = hc.shape.element_schema().unwrap();
        assert_eq!(
            inner.get("protocol").unwrap().shape,
            Shape::Scalar {
                kind: ScalarKind::String,
                choices: vec!["HTTP".to_string(), "HTTPS".to_string()],
            }
        );

        let envs = schema.get("environments").unwrap();
        match &envs.shape {
            Shape::Array { non_empty, .. } => assert!(non_empty),
            other => panic!("expected array, got {:?}", other),
        }
        assert!(envs.shape.element_schema().unwrap().contains("wave"));
        assert!(schema.get("tags").unwrap().shape.element_schema().is_none());
    }

    #[test]
    fn test_field_order_preserved() {
        let schema = Schema::from_yaml(SCHEMA_YAML).unwrap();
        let names: Vec<&str> = schema.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["name", "description", "subdomain", "instances", "healthCheck", "tags", "environments"]
        );
    }

    #[test]
    fn test_yaml_roundtrip() {
        let schema = Schema::from_yaml(SCHEMA_YAML).unwrap();
        let yaml = schema.to_yaml().unwrap();
        let again = Schema::from_yaml(&yaml).unwrap();
        assert_eq!(schema, again);
        assert!(yaml.contains("name: string"));
    }

    #[test]
    fn test_deep_no_default_marks_descendants() {
        let field = Field::object(
            Schema::new()
                .with("a", Field::string().optional())
                .with("b", Field::string().optional().nullable_default())
                .with(
                    "items",
                    Field::array(Shape::Object(
                        Schema::new().with("x", Field::integer().optional()),
                    )),
                ),
        )
        .optional()
        .deep_no_default();

        assert_eq!(field.policy(), DefaultPolicy::NoDefault);
        let inner = field.shape.element_schema().unwrap();
        assert_eq!(inner.get("a").unwrap().policy(), DefaultPolicy::NoDefault);
        assert_eq!(
            inner.get("b").unwrap().policy(),
            DefaultPolicy::NullableDefault
        );
        let items = inner.get("items").unwrap().shape.element_schema().unwrap();
        assert_eq!(items.get("x").unwrap().policy(), DefaultPolicy::NoDefault);
    }

    #[test]
    fn test_no_default_container_marks_descendants() {
        let field = Field::object(
            Schema::new()
                .with("hostedZoneId", Field::string())
                .with("ttl", Field::integer().optional())
                .with("region", Field::string().optional().nullable_default()),
        )
        .optional()
        .no_default();

        let inner = field.shape.element_schema().unwrap();
        assert_eq!(inner.get("ttl").unwrap().policy(), DefaultPolicy::NoDefault);
        assert_eq!(
            inner.get("region").unwrap().policy(),
            DefaultPolicy::NullableDefault
        );
        assert!(!inner.get("hostedZoneId").unwrap().optional);
    }

    #[test]
    fn test_deep_no_default_is_idempotent() {
        let once = Field::object(Schema::new().with("a", Field::string().optional())).deep_no_default();
        let twice = once.clone().deep_no_default();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_deep_marker() {
        let yaml = r#"
extra:
  type: object
  optional: true
  marker: deep_no_default
  fields:
    note: string?
"#;
        let schema = Schema::from_yaml(yaml).unwrap();
        let extra = schema.get("extra").unwrap();
        let note = extra.shape.element_schema().unwrap().get("note").unwrap();
        assert_eq!(note.policy(), DefaultPolicy::NoDefault);
    }

    #[test]
    fn test_reject_unknown_type() {
        let err = Schema::from_yaml("a: strin").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref found, .. } if found == "strin"));
    }

    #[test]
    fn test_reject_reserved_name() {
        let err = Schema::from_yaml("outer:\n  type: object\n  fields:\n    x_defaults: string\n")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'outer.x_defaults': names ending in `_defaults` are reserved"
        );
    }

    #[test]
    fn test_reject_array_without_items() {
        let err = Schema::from_yaml("list: { type: array }").unwrap_err();
        assert!(err.to_string().contains("need `items`"));
    }

    #[test]
    fn test_reject_optional_items() {
        let err = Schema::from_yaml("list: { type: array, items: string? }").unwrap_err();
        assert!(err.to_string().contains("list[]"));
    }

    #[test]
    fn test_reject_shorthand_object() {
        let err = Schema::from_yaml("x: object").unwrap_err();
        assert!(err.to_string().contains("mapping form"));
    }

    #[test]
    fn test_reject_choices_on_integer() {
        let err = Schema::from_yaml("x: { type: integer, choices: [a] }").unwrap_err();
        assert!(err.to_string().contains("only applies to strings"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(Shape::scalar(ScalarKind::Integer).describe(), "integer");
        assert_eq!(
            Field::string().choices(["HTTP", "HTTPS"]).shape.describe(),
            "one of HTTP, HTTPS"
        );
        assert_eq!(
            Field::array(Shape::scalar(ScalarKind::String)).shape.describe(),
            "array of string"
        );
    }
}
