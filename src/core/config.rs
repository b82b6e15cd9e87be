//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::Limits;

/// Name of the per-project configuration directory
pub const PROJECT_DIR: &str = ".bomcalc";

/// bomcalc configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Branch used when `--branch` is not given
    pub default_branch: Option<String>,

    /// Root of the CSV lookup tables
    pub tables_dir: Option<PathBuf>,

    /// Default output format
    pub default_format: Option<String>,

    /// Name-scan substitutions per cell
    pub name_scan_limit: Option<usize>,

    /// Rounds of the display-field substitution pass
    pub substitution_rounds: Option<usize>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/bomcalc/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.bomcalc/config.yaml), relative paths resolve
        //    against the project root
        if let Some(root) = std::env::current_dir().ok().and_then(|cwd| find_project_root(&cwd)) {
            if let Some(mut project) = Self::read(&root.join(PROJECT_DIR).join("config.yaml")) {
                if let Some(dir) = project.tables_dir.take() {
                    project.tables_dir = Some(if dir.is_relative() { root.join(dir) } else { dir });
                }
                config.merge(project);
            }
        }

        // 4. Environment variables
        if let Ok(branch) = std::env::var("BOMCALC_BRANCH") {
            config.default_branch = Some(branch);
        }
        if let Ok(tables) = std::env::var("BOMCALC_TABLES") {
            config.tables_dir = Some(PathBuf::from(tables));
        }

        config
    }

    fn read(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "bomcalc")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.default_branch.is_some() {
            self.default_branch = other.default_branch;
        }
        if other.tables_dir.is_some() {
            self.tables_dir = other.tables_dir;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.name_scan_limit.is_some() {
            self.name_scan_limit = other.name_scan_limit;
        }
        if other.substitution_rounds.is_some() {
            self.substitution_rounds = other.substitution_rounds;
        }
    }

    /// Engine iteration caps, falling back to the built-in defaults
    pub fn limits(&self) -> Limits {
        let defaults = Limits::default();
        Limits {
            name_scan: self.name_scan_limit.unwrap_or(defaults.name_scan),
            substitution_rounds: self.substitution_rounds.unwrap_or(defaults.substitution_rounds),
        }
    }

    /// Branch to calculate for when none is given on the command line
    pub fn branch(&self) -> String {
        self.default_branch.clone().unwrap_or_default()
    }
}

/// Find the project root by walking up from `start` to a directory holding
/// `.bomcalc/`
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.canonicalize().ok()?;
    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}
