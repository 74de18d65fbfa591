//! Project file parsing and validation, plus loading of the schema, config
//! and defaults trees it points at.
//!
//! Relative paths in `stackdef.yaml` resolve against the directory holding
//! the project file.

use super::app::app_schema;
use super::schema::Schema;
use super::types::ProjectConfig;
use serde_yaml_ng::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a stackdef.yaml file from disk.
pub fn parse_project_file(path: &Path) -> Result<ProjectConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_project(&content)
}

/// Parse a stackdef.yaml from a string.
pub fn parse_project(yaml: &str) -> Result<ProjectConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed project. Returns a list of errors (empty = valid).
pub fn validate_project(project: &ProjectConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if project.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", project.version),
        });
    }

    if project.name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }

    if project.merge.max_depth == 0 {
        errors.push(ValidationError {
            message: "merge.max_depth must be at least 1".to_string(),
        });
    }

    if project.config.as_os_str().is_empty() {
        errors.push(ValidationError {
            message: "config path must not be empty".to_string(),
        });
    }

    if project.defaults.as_os_str().is_empty() {
        errors.push(ValidationError {
            message: "defaults path must not be empty".to_string(),
        });
    }

    if let Err(e) = project.logging.validate() {
        errors.push(ValidationError {
            message: format!("logging: {}", e),
        });
    }

    errors
}

/// Resolve a project-relative path.
pub fn project_path(project_file: &Path, relative: &Path) -> PathBuf {
    if relative.is_absolute() {
        return relative.to_path_buf();
    }
    match project_file.parent() {
        Some(dir) => dir.join(relative),
        None => relative.to_path_buf(),
    }
}

/// Load a YAML document as a value tree. An empty file is an empty mapping.
pub fn load_tree(path: &Path) -> Result<Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    if content.trim().is_empty() {
        return Ok(Value::Mapping(Default::default()));
    }
    serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("YAML parse error in {}: {}", path.display(), e))
}

/// Load a schema file.
pub fn load_schema(path: &Path) -> Result<Schema, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    Schema::from_yaml(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Everything a project points at, loaded and ready to resolve.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub project: ProjectConfig,
    pub schema: Schema,
    /// True when the built-in application schema is in use
    pub builtin_schema: bool,
    pub config: Value,
    pub defaults: Value,
}

/// Parse, validate and load a project and its trees.
pub fn load_project(project_file: &Path) -> Result<LoadedProject, String> {
    let project = parse_project_file(project_file)?;
    let errors = validate_project(&project);
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(format!(
            "{} is invalid: {}",
            project_file.display(),
            messages.join("; ")
        ));
    }

    let (schema, builtin_schema) = match &project.schema {
        Some(rel) => (load_schema(&project_path(project_file, rel))?, false),
        None => (app_schema(), true),
    };
    let config = load_tree(&project_path(project_file, &project.config))?;
    let defaults = load_tree(&project_path(project_file, &project.defaults))?;
    debug!(
        project = %project.name,
        fields = schema.len(),
        builtin_schema,
        "project loaded"
    );

    Ok(LoadedProject {
        project,
        schema,
        builtin_schema,
        config,
        defaults,
    })
}
