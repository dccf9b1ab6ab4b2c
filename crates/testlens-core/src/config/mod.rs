//! Configuration management for testlens.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `testlens.toml` file
//! 3. User config `~/.config/testlens/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Arguments used when no test root matches the file being run.
    pub default_arguments: String,

    /// Ordered test roots. The first root whose path prefixes a file wins.
    pub test_roots: Vec<TestRootConfig>,

    /// File name suffixes that mark a test file (e.g. `.test.ts`).
    pub extensions: Vec<String>,

    /// Directory names skipped while searching for tests.
    pub exclude_dirs: Vec<String>,

    /// Infer the working directory from the nearest project descriptor.
    pub use_project_descriptor: bool,

    /// File name of the project descriptor.
    pub project_descriptor: String,

    /// Runner binary, relative to the workspace root.
    pub runner_path: String,

    /// Debugger attach window in milliseconds.
    pub debug_timeout_ms: u64,

    /// Write an xunit report per run and map it back onto the tree.
    pub track_results_inline: bool,

    /// Result-file poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_arguments: DEFAULT_ARGUMENTS.to_string(),
            test_roots: Vec::new(),
            extensions: DEFAULT_TEST_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            use_project_descriptor: DEFAULT_USE_PROJECT_DESCRIPTOR,
            project_descriptor: DEFAULT_PROJECT_DESCRIPTOR.to_string(),
            runner_path: DEFAULT_RUNNER_PATH.to_string(),
            debug_timeout_ms: DEFAULT_DEBUG_TIMEOUT_MS,
            track_results_inline: DEFAULT_TRACK_RESULTS_INLINE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// A configured test root.
///
/// `root_path` is workspace-relative and may use either separator style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRootConfig {
    /// Workspace-relative path prefix this root governs.
    pub root_path: String,

    /// Arguments replacing `default_arguments` for files under this root.
    pub additional_arguments: String,

    /// Extra environment for the runner process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,

    /// Working directory override, relative to the workspace root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl TestRootConfig {
    /// Creates a root with no arguments, env or cwd.
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }
}

impl Config {
    /// Load configuration for a workspace.
    ///
    /// Searches for config in order:
    /// 1. `<workspace>/testlens.toml` (project local)
    /// 2. `~/.config/testlens/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load(workspace_root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let project_config = workspace_root.as_ref().join(PROJECT_CONFIG_FILE);
        if project_config.exists() {
            return Self::from_file(&project_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE);
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(args) = std::env::var("TESTLENS_DEFAULT_ARGUMENTS") {
            self.default_arguments = args;
        }
        if let Ok(path) = std::env::var("TESTLENS_RUNNER_PATH") {
            self.runner_path = path;
        }
        if let Ok(timeout) = std::env::var("TESTLENS_DEBUG_TIMEOUT_MS") {
            if let Ok(n) = timeout.parse() {
                self.debug_timeout_ms = n;
            }
        }
        if let Ok(track) = std::env::var("TESTLENS_TRACK_RESULTS_INLINE") {
            if let Ok(b) = track.parse() {
                self.track_results_inline = b;
            }
        }
        if let Ok(use_descriptor) = std::env::var("TESTLENS_USE_PROJECT_DESCRIPTOR") {
            if let Ok(b) = use_descriptor.parse() {
                self.use_project_descriptor = b;
            }
        }
    }

    /// Reject settings the rest of the crate cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one test file extension is required".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a file name ends with one of the configured test extensions.
    pub fn is_test_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.extensions.iter().any(|ext| name.ends_with(ext.as_str())))
            .unwrap_or(false)
    }

    /// Globs selecting every test file below a working directory.
    pub fn extension_globs(&self) -> Vec<String> {
        self.extensions.iter().map(|ext| format!("**/*{}", ext)).collect()
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
