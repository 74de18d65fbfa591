//! CLI subcommands: init, validate, resolve, shape, waves, check.

use crate::core::app::{AppConfig, AppConfigDefaults, AppConfigDraft};
use crate::core::parser::{self, LoadedProject};
use crate::core::resolve::resolve;
use crate::core::shape::{derive_defaults_shape, derive_final_shape};
use crate::core::types::{MergeOptions, ResolveMode};
use crate::core::{planner, state};
use crate::error::ResolveError;
use crate::logging::init_logging;
use crate::tripwire::{drift, hasher};
use clap::{Subcommand, ValueEnum};
use serde_yaml_ng::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stackdef project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Check the project, its schema, config and defaults without writing anything
    Validate {
        /// Path to stackdef.yaml
        #[arg(short, long, default_value = "stackdef.yaml")]
        file: PathBuf,
    },

    /// Merge config with defaults and print the resolved configuration
    Resolve {
        /// Path to stackdef.yaml
        #[arg(short, long, default_value = "stackdef.yaml")]
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        /// Write the resolved config to the lock file
        #[arg(long)]
        lock: bool,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Print a derived shape of the schema
    Shape {
        /// Path to stackdef.yaml
        #[arg(short, long, default_value = "stackdef.yaml")]
        file: PathBuf,

        /// Which shape to derive
        #[arg(long, value_enum, default_value_t = ShapeKind::Defaults)]
        kind: ShapeKind,
    },

    /// Show deployment waves for the resolved application config
    Waves {
        /// Path to stackdef.yaml
        #[arg(short, long, default_value = "stackdef.yaml")]
        file: PathBuf,
    },

    /// Compare a fresh resolution against the lock file
    Check {
        /// Path to stackdef.yaml
        #[arg(short, long, default_value = "stackdef.yaml")]
        file: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Exit non-zero when the lock is stale (for CI)
        #[arg(long)]
        strict_exit: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShapeKind {
    /// What a defaults file must contain
    Defaults,
    /// What a resolved config is guaranteed to contain
    Final,
}

/// Global logging flags.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: u8,
    pub format: Option<String>,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands, log: &LogOptions) -> Result<(), String> {
    setup_logging(command_file(&cmd), log)?;
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Resolve {
            file,
            format,
            lock,
            state_dir,
        } => cmd_resolve(&file, format, lock.then_some(state_dir.as_path())),
        Commands::Shape { file, kind } => cmd_shape(&file, kind),
        Commands::Waves { file } => cmd_waves(&file),
        Commands::Check {
            file,
            state_dir,
            strict_exit,
        } => cmd_check(&file, &state_dir, strict_exit),
    }
}

fn command_file(cmd: &Commands) -> Option<&Path> {
    match cmd {
        Commands::Init { .. } => None,
        Commands::Validate { file }
        | Commands::Resolve { file, .. }
        | Commands::Shape { file, .. }
        | Commands::Waves { file }
        | Commands::Check { file, .. } => Some(file.as_path()),
    }
}

/// Project logging settings, then `-v` and `--log-format` on top.
fn setup_logging(project_file: Option<&Path>, log: &LogOptions) -> Result<(), String> {
    let base = project_file
        .and_then(|f| parser::parse_project_file(f).ok())
        .map(|p| p.logging)
        .unwrap_or_default();
    let mut config = base.with_verbosity(log.verbose);
    if let Some(format) = &log.format {
        config.format.clone_from(format);
    }
    init_logging(&config)
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let project_path = path.join("stackdef.yaml");
    if project_path.exists() {
        return Err(format!("{} already exists", project_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    let template = r#"version: "1.0"
name: my-application
description: "Managed by stackdef"

config: config.yaml
defaults: defaults.yaml

merge:
  coalesce: presence
  mode: strict
"#;
    let config = serde_yaml_ng::to_string(&AppConfigDraft::example())
        .map_err(|e| format!("serialize error: {}", e))?;
    let mut defaults = AppConfigDefaults::standard();
    if let Ok(account) = std::env::var("CDK_DEFAULT_ACCOUNT") {
        defaults = defaults.with_account(account);
    }
    let defaults = serde_yaml_ng::to_string(&defaults)
        .map_err(|e| format!("serialize error: {}", e))?;

    let files = [
        (project_path, template.to_string()),
        (path.join("config.yaml"), config),
        (path.join("defaults.yaml"), defaults),
    ];
    for (file, content) in &files {
        std::fs::write(file, content)
            .map_err(|e| format!("cannot write {}: {}", file.display(), e))?;
    }

    println!("Initialized stackdef project at {}", path.display());
    for (file, _) in &files {
        println!("  Created: {}", file.display());
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let loaded = parser::load_project(file)?;
    let options = MergeOptions {
        mode: ResolveMode::Strict,
        ..loaded.project.merge.clone()
    };

    match resolve(&loaded.schema, &loaded.config, &loaded.defaults, &options) {
        Ok(_) => {
            println!(
                "OK: {} ({} top-level fields, {} schema)",
                loaded.project.name,
                loaded.schema.len(),
                if loaded.builtin_schema {
                    "built-in"
                } else {
                    "project"
                }
            );
            Ok(())
        }
        Err(ResolveError::Invalid { stage, violations }) => {
            eprintln!("{}:", stage);
            for v in &violations {
                eprintln!("  ERROR: {}", v);
            }
            Err(format!("{} validation error(s)", violations.len()))
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Resolve with the project's own merge options.
fn resolve_project(loaded: &LoadedProject) -> Result<Value, String> {
    resolve(
        &loaded.schema,
        &loaded.config,
        &loaded.defaults,
        &loaded.project.merge,
    )
    .map_err(|e| e.to_string())
}

/// Composite hash over every file the resolution reads.
fn inputs_hash(file: &Path, loaded: &LoadedProject) -> Result<String, String> {
    let project = &loaded.project;
    let mut paths = vec![file.to_path_buf()];
    if let Some(schema) = &project.schema {
        paths.push(parser::project_path(file, schema));
    }
    paths.push(parser::project_path(file, &project.config));
    paths.push(parser::project_path(file, &project.defaults));

    let hashes = paths
        .iter()
        .map(|p| hasher::hash_file(p))
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&str> = hashes.iter().map(String::as_str).collect();
    Ok(hasher::composite_hash(&refs))
}

fn render(value: &Value, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Yaml => {
            serde_yaml_ng::to_string(value).map_err(|e| format!("serialize error: {}", e))
        }
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| format!("serialize error: {}", e)),
    }
}

fn cmd_resolve(file: &Path, format: OutputFormat, lock_dir: Option<&Path>) -> Result<(), String> {
    let loaded = parser::load_project(file)?;
    let resolved = resolve_project(&loaded)?;
    print!("{}", render(&resolved, format)?);

    if let Some(state_dir) = lock_dir {
        let mut lock = state::new_lock(&loaded.project.name, resolved);
        lock.inputs = Some(inputs_hash(file, &loaded)?);
        let path = state::save_lock(state_dir, &lock)?;
        info!(path = %path.display(), fingerprint = %lock.fingerprint, "lock written");
        eprintln!("Locked: {} ({})", path.display(), lock.fingerprint);
    }
    Ok(())
}

fn cmd_shape(file: &Path, kind: ShapeKind) -> Result<(), String> {
    let loaded = parser::load_project(file)?;
    let shape = match kind {
        ShapeKind::Defaults => derive_defaults_shape(&loaded.schema),
        ShapeKind::Final => derive_final_shape(&loaded.schema),
    };
    let yaml = shape.to_yaml().map_err(|e| e.to_string())?;
    print!("{}", yaml);
    Ok(())
}

fn cmd_waves(file: &Path) -> Result<(), String> {
    let loaded = parser::load_project(file)?;
    let resolved = resolve_project(&loaded)?;
    let app: AppConfig = serde_yaml_ng::from_value(resolved).map_err(|e| {
        format!(
            "resolved config is not an application config ({}); waves needs the built-in schema",
            e
        )
    })?;

    let waves = planner::plan_waves(&app);
    println!("Waves: {} ({} waves)", app.app_name, waves.len());
    for wave in &waves {
        println!();
        println!("{}:", wave.label());
        for stage in &wave.stages {
            println!(
                "  {} -> {} [{}]",
                stage.environment, stage.stack_name, stage.record_name
            );
        }
    }

    for (web, backend) in planner::unmatched_backends(&app) {
        warn!(web = %web, backend = %backend, "backendSubdomain matches no backend environment");
        eprintln!(
            "  WARNING: web environment {} points at unknown backend {}",
            web, backend
        );
    }
    Ok(())
}

fn cmd_check(file: &Path, state_dir: &Path, strict_exit: bool) -> Result<(), String> {
    let loaded = parser::load_project(file)?;
    let lock = state::load_lock(state_dir)?.ok_or_else(|| {
        format!(
            "no lock file at {}; run `stackdef resolve --lock` first",
            state::lock_file_path(state_dir).display()
        )
    })?;

    println!("Checking {} (locked {})...", lock.name, lock.generated_at);
    if drift::inputs_changed(&lock, &inputs_hash(file, &loaded)?) {
        println!("  Inputs changed since the lock was written.");
    }

    let fresh = resolve_project(&loaded)?;
    match drift::detect_stale(&lock, &fresh) {
        None => {
            println!("  Up to date.");
            Ok(())
        }
        Some(finding) => {
            println!("  STALE: {}", finding);
            println!("    Expected: {}", finding.expected_fingerprint);
            println!("    Actual:   {}", finding.actual_fingerprint);
            if strict_exit {
                return Err("resolved config is stale".to_string());
            }
            Ok(())
        }
    }
}
