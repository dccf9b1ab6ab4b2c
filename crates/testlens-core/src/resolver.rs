//! Test root and working directory resolution.
//!
//! Stored configuration may use either path separator, so every comparison
//! is made on `/`-normalized strings.

use std::path::{Path, PathBuf};

use crate::config::TestRootConfig;

/// Replace backslashes with forward slashes.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Workspace-relative form of `path`, `/`-normalized.
///
/// Paths outside the workspace are returned normalized but otherwise unchanged.
pub fn relative_to_root(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    normalize_separators(&relative.to_string_lossy())
}

/// Find the test root governing a workspace-relative file path.
///
/// Returns the first root whose normalized `root_path` is a literal prefix of
/// the normalized file path. Overlapping roots are therefore resolved by list
/// order.
pub fn resolve_config<'a>(
    roots: &'a [TestRootConfig],
    relative_file: &str,
) -> Option<&'a TestRootConfig> {
    let file = normalize_separators(relative_file);
    roots
        .iter()
        .find(|root| file.starts_with(normalize_separators(&root.root_path).as_str()))
}

/// Working directory for running `relative_file`.
///
/// A matched root wins (`cwd`, falling back to `root_path`). Otherwise the
/// nearest ancestor of the file holding `descriptor` is used when
/// `use_descriptor` is set, and the workspace root in every other case.
pub fn resolve_working_directory(
    root: &Path,
    relative_file: &str,
    config: Option<&TestRootConfig>,
    use_descriptor: bool,
    descriptor: &str,
) -> PathBuf {
    let start = root
        .join(relative_file)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    resolve_from_directory(root, &start, config, use_descriptor, descriptor)
}

/// Like [`resolve_working_directory`], but the search starts at `dir` itself.
pub fn resolve_from_directory(
    root: &Path,
    dir: &Path,
    config: Option<&TestRootConfig>,
    use_descriptor: bool,
    descriptor: &str,
) -> PathBuf {
    if let Some(config) = config {
        return root_working_directory(root, config);
    }

    if use_descriptor {
        if let Some(found) = find_project_descriptor(dir, root, descriptor) {
            return found;
        }
    }

    root.to_path_buf()
}

/// Working directory a test root runs in: its `cwd`, else its `root_path`.
pub fn root_working_directory(root: &Path, config: &TestRootConfig) -> PathBuf {
    let relative = config.cwd.as_deref().unwrap_or(&config.root_path);
    root.join(normalize_separators(relative))
}

/// Find the test root whose working directory is `dir`.
///
/// Falls back to prefix matching on the workspace-relative `dir`, so a root
/// whose `cwd` lies outside its `root_path` still governs its own folder.
pub fn resolve_folder_config<'a>(
    roots: &'a [TestRootConfig],
    root: &Path,
    dir: &Path,
) -> Option<&'a TestRootConfig> {
    roots
        .iter()
        .find(|config| root_working_directory(root, config) == dir)
        .or_else(|| resolve_config(roots, &relative_to_root(root, dir)))
}

/// Walk from `start` up to `root` (inclusive) looking for `descriptor`.
///
/// Returns the directory containing it. Never ascends past `root`, and gives
/// up immediately when `start` is not inside `root`.
pub fn find_project_descriptor(start: &Path, root: &Path, descriptor: &str) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if !dir.starts_with(root) {
            return None;
        }
        if dir.join(descriptor).is_file() {
            return Some(dir.to_path_buf());
        }
        if dir == root {
            return None;
        }
        dir = dir.parent()?;
    }
}
