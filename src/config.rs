//! Layered configuration: environment variables override the project
//! `.jello.json` (walked upward from the current directory), which
//! overrides the user-level `$XDG_CONFIG_HOME/jello/config.json`, which
//! overrides built-in defaults. Every field resolves to a concrete value;
//! `Config` is never partial once [`Config::resolve`] returns.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{Backend, FixMode};

const PROJECT_CONFIG_FILENAME: &str = ".jello.json";
const ENV_PREFIX: &str = "JELLO_";
const DEFAULT_PLAN_DIR: &str = ".jello";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Error,
    Warning,
    Info,
    Debug,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiet" => Ok(LogLevel::Quiet),
            "error" => Ok(LogLevel::Error),
            "warning" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// The fully-resolved configuration the Driver runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Option<Backend>,
    pub backend_preference: Vec<Backend>,
    pub fix_mode: FixMode,
    pub emit_plan: bool,
    pub plan_dir: PathBuf,
    pub explain: bool,
    pub dry_run: bool,
    pub search_paths: Vec<PathBuf>,
    pub nm: Option<PathBuf>,
    pub log_level: LogLevel,
    pub silent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: None,
            backend_preference: Backend::default_preference().to_vec(),
            fix_mode: FixMode::Suggest,
            emit_plan: true,
            plan_dir: PathBuf::from(DEFAULT_PLAN_DIR),
            explain: false,
            dry_run: false,
            search_paths: Vec::new(),
            nm: None,
            log_level: LogLevel::Info,
            silent: false,
        }
    }
}

/// The same schema as `Config`, but every field optional, matching what a
/// project/user JSON file may partially specify.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    backend_preference: Option<Vec<String>>,
    #[serde(default)]
    fix_mode: Option<String>,
    #[serde(default)]
    emit_plan: Option<bool>,
    #[serde(default)]
    plan_dir: Option<PathBuf>,
    #[serde(default)]
    explain: Option<bool>,
    #[serde(default)]
    dry_run: Option<bool>,
    #[serde(default)]
    search_paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    nm: Option<PathBuf>,
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    silent: Option<bool>,
}

fn parse_fix_mode(s: &str) -> Option<FixMode> {
    match s {
        "auto" => Some(FixMode::Auto),
        "suggest" => Some(FixMode::Suggest),
        "strict" => Some(FixMode::HardFail),
        _ => None,
    }
}

fn apply_file_config(config: &mut Config, file: FileConfig) {
    if let Some(backend) = file.backend.as_deref().and_then(|s| s.parse().ok()) {
        config.backend = Some(backend);
    }
    if let Some(preference) = file.backend_preference {
        let parsed: Vec<Backend> = preference.iter().filter_map(|s| s.parse().ok()).collect();
        if !parsed.is_empty() {
            config.backend_preference = parsed;
        }
    }
    if let Some(mode) = file.fix_mode.as_deref().and_then(parse_fix_mode) {
        config.fix_mode = mode;
    }
    if let Some(v) = file.emit_plan {
        config.emit_plan = v;
    }
    if let Some(v) = file.plan_dir {
        config.plan_dir = v;
    }
    if let Some(v) = file.explain {
        config.explain = v;
    }
    if let Some(v) = file.dry_run {
        config.dry_run = v;
    }
    if let Some(v) = file.search_paths {
        config.search_paths = v;
    }
    if let Some(v) = file.nm {
        config.nm = Some(v);
    }
    if let Some(level) = file.log_level.as_deref().and_then(|s| s.parse().ok()) {
        config.log_level = level;
    }
    if let Some(v) = file.silent {
        config.silent = v;
    }
}

fn load_file_config(path: &Path) -> Option<FileConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping malformed config file");
            None
        }
    }
}

/// Walk upward from `start` looking for `.jello.json`, stopping at the
/// first filesystem root reached.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_CONFIG_FILENAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "jello")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn apply_env(config: &mut Config) {
    if let Some(backend) = env_var("BACKEND").and_then(|s| s.parse().ok()) {
        config.backend = Some(backend);
    }
    if let Some(preference) = env_var("BACKEND_PREFERENCE") {
        let parsed: Vec<Backend> = preference
            .split([':', ','])
            .filter_map(|s| s.parse().ok())
            .collect();
        if !parsed.is_empty() {
            config.backend_preference = parsed;
        }
    }
    if let Some(mode) = env_var("FIX_MODE").as_deref().and_then(parse_fix_mode) {
        config.fix_mode = mode;
    }
    if let Some(v) = env_var("EMIT_PLAN").as_deref().and_then(parse_bool_env) {
        config.emit_plan = v;
    }
    if let Some(v) = env_var("PLAN_DIR") {
        config.plan_dir = PathBuf::from(v);
    }
    if let Some(v) = env_var("EXPLAIN").as_deref().and_then(parse_bool_env) {
        config.explain = v;
    }
    if let Some(v) = env_var("DRY_RUN").as_deref().and_then(parse_bool_env) {
        config.dry_run = v;
    }
    if let Some(v) = env_var("SEARCH_PATHS") {
        config.search_paths = v.split(':').map(PathBuf::from).collect();
    }
    if let Some(v) = env_var("NM") {
        config.nm = Some(PathBuf::from(v));
    }
    if let Some(level) = env_var("LOG_LEVEL").as_deref().and_then(|s| s.parse().ok()) {
        config.log_level = level;
    }
    if let Some(v) = env_var("SILENT").as_deref().and_then(parse_bool_env) {
        config.silent = v;
    }
}

impl Config {
    /// Resolve the full precedence chain: env → project file → user file →
    /// defaults. `cwd` is the directory to start the upward project-file
    /// search from (normally the process's current directory).
    pub fn resolve(cwd: &Path) -> Config {
        let mut config = Config::default();

        if let Some(user_path) = user_config_path() {
            if let Some(file) = load_file_config(&user_path) {
                apply_file_config(&mut config, file);
            }
        }

        if let Some(project_path) = find_project_config(cwd) {
            if let Some(file) = load_file_config(&project_path) {
                apply_file_config(&mut config, file);
            }
        }

        apply_env(&mut config);
        config
    }
}
