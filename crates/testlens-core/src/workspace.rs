//! The workspace context threaded through discovery and runs.

use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError, TestRootConfig, ROOT_FOLDER_LABEL};
use crate::resolver;

/// A workspace root plus the configuration that governs it.
///
/// Obtained once from [`Workspace::init`] and passed to every operation.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Open a workspace, loading its configuration.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config = Config::load(&root)?;
        Ok(Self { root, config })
    }

    /// Use an explicit configuration.
    pub fn with_config(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Workspace-relative, `/`-normalized form of a path.
    pub fn relative(&self, path: &Path) -> String {
        resolver::relative_to_root(&self.root, path)
    }

    /// Test root governing `path`, if any.
    pub fn matching_root(&self, path: &Path) -> Option<&TestRootConfig> {
        resolver::resolve_config(&self.config.test_roots, &self.relative(path))
    }

    /// Test root governing the folder node at `dir`.
    pub fn folder_root(&self, dir: &Path) -> Option<&TestRootConfig> {
        resolver::resolve_folder_config(&self.config.test_roots, &self.root, dir)
    }

    /// Working directory for running the file at `path`.
    pub fn working_directory(&self, path: &Path) -> PathBuf {
        resolver::resolve_working_directory(
            &self.root,
            &self.relative(path),
            self.matching_root(path),
            self.config.use_project_descriptor,
            &self.config.project_descriptor,
        )
    }

    /// Working directory for running every test under the directory `dir`.
    pub fn folder_working_directory(&self, dir: &Path) -> PathBuf {
        resolver::resolve_from_directory(
            &self.root,
            dir,
            self.folder_root(dir),
            self.config.use_project_descriptor,
            &self.config.project_descriptor,
        )
    }

    /// Display label of a working directory: relative to the root, or `<root>`.
    pub fn folder_label(&self, dir: &Path) -> String {
        let relative = self.relative(dir);
        if relative.is_empty() {
            ROOT_FOLDER_LABEL.to_string()
        } else {
            relative
        }
    }
}
