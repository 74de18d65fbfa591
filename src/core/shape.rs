//! Shape derivation and conformance checking.
//!
//! From one declared [`Schema`] three shapes follow:
//! - the config shape: the schema itself, optional fields may be omitted
//! - the defaults shape ([`derive_defaults_shape`]): what a defaults tree
//!   must supply, with `<field>_defaults` entries for nested defaults
//! - the final shape ([`derive_final_shape`]): what resolution guarantees
//!
//! [`check_conforms`] validates a value tree against any of them.

use super::schema::{DefaultPolicy, Field, ScalarKind, Schema, Shape};
use super::types::{value_kind, yaml_value_to_string, FieldPath, Violation, DEFAULTS_SUFFIX};
use serde_yaml_ng::Value;

/// Shape of the defaults tree for `schema`.
///
/// - `NoDefault` fields are left out entirely.
/// - Unmarked optional fields get a required entry of their own shape.
/// - `NullableDefault` optional fields get an entry that stays optional.
/// - Unmarked required fields get no entry of their own.
/// - Objects and arrays of objects whose derived sub-shape is non-empty
///   also get a required `<field>_defaults` entry; for arrays it describes
///   one element, shared by all of them.
pub fn derive_defaults_shape(schema: &Schema) -> Schema {
    let mut out = Schema::new();
    for (name, field) in schema.iter() {
        let policy = field.policy();
        match policy {
            DefaultPolicy::NoDefault => continue,
            DefaultPolicy::WithDefault => {
                out.insert(name.clone(), Field::new(field.shape.clone()));
            }
            DefaultPolicy::NullableDefault if field.optional => {
                out.insert(name.clone(), Field::new(field.shape.clone()).optional());
            }
            DefaultPolicy::NullableDefault | DefaultPolicy::Required => {}
        }

        if let Some(element) = field.shape.element_schema() {
            let nested = derive_defaults_shape(element);
            if !nested.is_empty() {
                out.insert(format!("{}{}", name, DEFAULTS_SUFFIX), Field::object(nested));
            }
        }
    }
    out
}

/// Shape guaranteed after a successful merge: fields that had a default
/// become required, markers are dropped.
pub fn derive_final_shape(schema: &Schema) -> Schema {
    let mut out = Schema::new();
    for (name, field) in schema.iter() {
        let optional = field.optional && field.policy() != DefaultPolicy::WithDefault;
        let mut resolved = Field::new(final_shape(&field.shape));
        resolved.optional = optional;
        out.insert(name.clone(), resolved);
    }
    out
}

fn final_shape(shape: &Shape) -> Shape {
    match shape {
        Shape::Scalar { .. } => shape.clone(),
        Shape::Object(schema) => Shape::Object(derive_final_shape(schema)),
        Shape::Array { items, non_empty } => Shape::Array {
            items: Box::new(final_shape(items)),
            non_empty: *non_empty,
        },
    }
}

/// Check `value` against `schema`, collecting every violation.
/// `null` is treated the same as an absent field.
pub fn check_conforms(value: &Value, schema: &Schema) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_object(value, schema, &FieldPath::root(), &mut violations);
    violations
}

fn check_object(value: &Value, schema: &Schema, path: &FieldPath, out: &mut Vec<Violation>) {
    let mapping = match untag(value) {
        Value::Mapping(m) => m,
        other => {
            out.push(Violation::TypeMismatch {
                path: path.clone(),
                expected: "object".to_string(),
                found: value_kind(other),
            });
            return;
        }
    };

    for (name, field) in schema.iter() {
        let child = path.child(name.as_str());
        match mapping.get(name.as_str()).filter(|v| !v.is_null()) {
            Some(v) => check_shape(v, &field.shape, &child, out),
            None if !field.optional => out.push(Violation::Missing { path: child }),
            None => {}
        }
    }

    for key in mapping.keys() {
        let known = key.as_str().is_some_and(|k| schema.contains(k));
        if !known {
            out.push(Violation::Unknown {
                path: path.child(yaml_value_to_string(key)),
            });
        }
    }
}

fn check_shape(value: &Value, shape: &Shape, path: &FieldPath, out: &mut Vec<Violation>) {
    let value = untag(value);
    match shape {
        Shape::Scalar { kind, choices } => {
            if !scalar_matches(value, *kind) {
                out.push(Violation::TypeMismatch {
                    path: path.clone(),
                    expected: shape.describe(),
                    found: value_kind(value),
                });
                return;
            }
            if !choices.is_empty() {
                let rendered = yaml_value_to_string(value);
                if !choices.contains(&rendered) {
                    out.push(Violation::NotInChoices {
                        path: path.clone(),
                        value: rendered,
                        choices: choices.clone(),
                    });
                }
            }
        }
        Shape::Object(schema) => check_object(value, schema, path, out),
        Shape::Array { items, non_empty } => {
            let seq = match value {
                Value::Sequence(seq) => seq,
                other => {
                    out.push(Violation::TypeMismatch {
                        path: path.clone(),
                        expected: shape.describe(),
                        found: value_kind(other),
                    });
                    return;
                }
            };
            if *non_empty && seq.is_empty() {
                out.push(Violation::EmptyArray { path: path.clone() });
            }
            for (i, item) in seq.iter().enumerate() {
                check_shape(item, items, &path.index(i), out);
            }
        }
    }
}

fn scalar_matches(value: &Value, kind: ScalarKind) -> bool {
    match kind {
        ScalarKind::Any => true,
        ScalarKind::String => value.is_string(),
        ScalarKind::Boolean => value.is_bool(),
        ScalarKind::Number => value.is_number(),
        ScalarKind::Integer => value.is_i64() || value.is_u64(),
    }
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health_check() -> Schema {
        Schema::new()
            .with("protocol", Field::string().optional().choices(["HTTP", "HTTPS"]))
            .with("port", Field::integer().optional())
            .with("path", Field::string().optional())
    }

    fn environment() -> Schema {
        Schema::new()
            .with("name", Field::string())
            .with("description", Field::string().optional().no_default())
            .with("minInstances", Field::integer().optional())
            .with("healthCheck", Field::object(health_check()))
    }

    fn sample() -> Schema {
        Schema::new()
            .with("appName", Field::string())
            .with(
                "commonSubdomain",
                Field::string().optional().nullable_default(),
            )
            .with("tags", Field::array(Shape::scalar(ScalarKind::String)).optional())
            .with(
                "environments",
                Field::array(Shape::Object(environment())).non_empty(),
            )
    }

    fn yaml(s: &str) -> Value {
        serde_yaml_ng::from_str(s).unwrap()
    }

    #[test]
    fn test_defaults_shape_rules() {
        let shape = derive_defaults_shape(&sample());
        let names: Vec<&str> = shape.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["commonSubdomain", "tags", "environments_defaults"]);

        // nullable default stays optional, plain default becomes required
        assert!(shape.get("commonSubdomain").unwrap().optional);
        assert!(!shape.get("tags").unwrap().optional);

        let env = shape
            .get("environments_defaults")
            .unwrap()
            .shape
            .element_schema()
            .unwrap();
        let env_names: Vec<&str> = env.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(env_names, vec!["minInstances", "healthCheck_defaults"]);

        let hc = env.get("healthCheck_defaults").unwrap().shape.element_schema().unwrap();
        assert_eq!(hc.len(), 3);
        assert!(hc.iter().all(|(_, f)| !f.optional));
    }

    #[test]
    fn test_defaults_shape_skips_empty_subtrees() {
        let schema = Schema::new().with(
            "deployment",
            Field::object(Schema::new().with("wave", Field::integer())),
        );
        assert!(derive_defaults_shape(&schema).is_empty());
    }

    #[test]
    fn test_defaults_shape_pass_through_and_defaults_coexist() {
        let schema = Schema::new().with("instances", Field::object(
            Schema::new()
                .with("instanceType", Field::string())
                .with("minInstances", Field::integer().optional()),
        ).optional());
        let shape = derive_defaults_shape(&schema);
        assert!(shape.contains("instances"));
        assert!(shape.contains("instances_defaults"));
    }

    #[test]
    fn test_defaults_shape_excludes_no_default_objects() {
        let schema = Schema::new().with(
            "extra",
            Field::object(Schema::new().with("x", Field::string().optional()))
                .optional()
                .deep_no_default(),
        );
        assert!(derive_defaults_shape(&schema).is_empty());
    }

    #[test]
    fn test_defaults_shape_ignores_required_nullable() {
        let schema = Schema::new().with("x", Field::string().nullable_default());
        assert!(derive_defaults_shape(&schema).is_empty());
    }

    #[test]
    fn test_final_shape_narrows() {
        let fin = derive_final_shape(&sample());
        assert!(!fin.get("tags").unwrap().optional);
        assert!(fin.get("commonSubdomain").unwrap().optional);
        let env = fin.get("environments").unwrap().shape.element_schema().unwrap();
        assert!(!env.get("minInstances").unwrap().optional);
        assert!(env.get("description").unwrap().optional);
        assert!(env.iter().all(|(_, f)| f.marker.is_none()));
        let hc = env.get("healthCheck").unwrap().shape.element_schema().unwrap();
        assert!(hc.iter().all(|(_, f)| !f.optional));
    }

    #[test]
    fn test_conforms_valid_config() {
        let value = yaml(
            r#"
appName: games
environments:
  - name: Beta
    healthCheck: { path: /ping }
"#,
        );
        assert!(check_conforms(&value, &sample()).is_empty());
    }

    #[test]
    fn test_conforms_reports_paths() {
        let value = yaml(
            r#"
appName: 3
bogus: true
environments:
  - healthCheck: { protocol: FTP, port: "80" }
"#,
        );
        let violations = check_conforms(&value, &sample());
        let rendered: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
        assert!(rendered.contains(&"appName: expected string, found number".to_string()));
        assert!(rendered.contains(&"environments[0].name: required field is missing".to_string()));
        assert!(rendered
            .contains(&"environments[0].healthCheck.protocol: 'FTP' is not one of: HTTP, HTTPS".to_string()));
        assert!(rendered
            .contains(&"environments[0].healthCheck.port: expected integer, found string".to_string()));
        assert!(rendered.contains(&"bogus: unknown field".to_string()));
    }

    #[test]
    fn test_conforms_empty_array() {
        let value = yaml("appName: a\nenvironments: []\n");
        let violations = check_conforms(&value, &sample());
        assert_eq!(
            violations,
            vec![Violation::EmptyArray {
                path: FieldPath::parse("environments")
            }]
        );
    }

    #[test]
    fn test_conforms_null_is_absent() {
        let value = yaml("appName: a\ncommonSubdomain: null\nenvironments: null\n");
        let violations = check_conforms(&value, &sample());
        assert_eq!(
            violations,
            vec![Violation::Missing {
                path: FieldPath::parse("environments")
            }]
        );
    }

    #[test]
    fn test_conforms_root_must_be_mapping() {
        let violations = check_conforms(&yaml("[1, 2]"), &sample());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path().to_string(), "<root>");
    }
}
