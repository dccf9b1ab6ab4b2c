//! Populates the test tree from the workspace.
//!
//! - [`discover_all`] rebuilds folders and suites from a full walk
//! - [`expand_suite`] lazily scans one suite's file for its tests
//! - [`refresh_file`] rebuilds one suite from edited text

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::document::{DocumentSource, TextDocument};
use crate::scanner::{ScanError, Scanner, TestDeclaration};
use crate::tree::{suite_id, NodeKind, TestTree, TreeNode};
use crate::workspace::Workspace;

/// Errors raised while populating the tree.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: ScanError,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown suite: {0}")]
    UnknownNode(String),
}

/// Counts from a full discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub files: usize,
    pub folders: usize,
}

/// Rebuild the tree's folders and suites from scratch.
///
/// Test children are not scanned here; suites resolve them lazily.
pub async fn discover_all(workspace: &Workspace, tree: &mut TestTree) -> DiscoveryStats {
    tree.clear();
    let placeholder = TreeNode::searching(workspace.root());
    let placeholder_id = placeholder.id.clone();
    tree.upsert_root(placeholder);

    let walk = workspace.clone();
    let files = match tokio::task::spawn_blocking(move || find_test_files(&walk)).await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(error = %e, "test file search did not complete");
            Vec::new()
        }
    };
    for file in &files {
        let folder = folder_for(workspace, tree, file);
        tree.upsert_child(&folder, TreeNode::suite(file));
    }

    tree.remove(&placeholder_id);

    let stats = DiscoveryStats {
        files: files.len(),
        folders: tree.roots().count(),
    };
    tracing::info!(files = stats.files, folders = stats.folders, "discovery finished");
    stats
}

/// Every test file in the workspace, sorted by path.
///
/// Only `exclude_dirs` are skipped. Hidden and ignored paths are searched.
pub fn find_test_files(workspace: &Workspace) -> Vec<PathBuf> {
    let config = workspace.config();
    let exclude = config.exclude_dirs.clone();

    let walker = WalkBuilder::new(workspace.root())
        .standard_filters(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !(is_dir && exclude.iter().any(|d| entry.file_name() == d.as_str()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) && config.is_test_file(path) {
                    files.push(path.to_path_buf());
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping unreadable entry"),
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Id of the folder root for `file`, creating the folder if needed.
///
/// Folders are keyed by resolved working directory and found by label.
pub fn folder_for(workspace: &Workspace, tree: &mut TestTree, file: &Path) -> String {
    let dir = workspace.working_directory(file);
    let label = workspace.folder_label(&dir);
    if let Some(existing) = tree.find_root_by_label(&label) {
        return existing.id.clone();
    }
    tree.upsert_root(TreeNode::folder(&dir, label)).id.clone()
}

/// Scan a suite's file and replace its test children.
///
/// Returns the number of tests added.
pub async fn expand_suite(
    tree: &mut TestTree,
    documents: &dyn DocumentSource,
    suite: &str,
) -> Result<usize, DiscoveryError> {
    let path = match tree.find(suite) {
        Some(node) if node.kind == NodeKind::Suite => node.uri.clone(),
        _ => return Err(DiscoveryError::UnknownNode(suite.to_string())),
    };

    let text = documents
        .read_text(&path)
        .await
        .map_err(|source| DiscoveryError::Io {
            path: path.clone(),
            source,
        })?;

    populate_suite(tree, suite, &path, &text).map(|found| found.len())
}

/// Rebuild one file's suite from its current text.
///
/// Creates the suite (and its folder) when the file is new. Sibling suites
/// are untouched. Files that are not test files yield no declarations.
pub fn refresh_file(
    workspace: &Workspace,
    tree: &mut TestTree,
    path: &Path,
    text: &str,
) -> Result<Vec<TestDeclaration>, DiscoveryError> {
    if !workspace.config().is_test_file(path) {
        return Ok(Vec::new());
    }

    let id = suite_id(path);
    if !tree.contains(&id) {
        let folder = folder_for(workspace, tree, path);
        tree.upsert_child(&folder, TreeNode::suite(path));
    }

    populate_suite(tree, &id, path, text)
}

/// Clear-then-rebuild the tests under `suite`.
fn populate_suite(
    tree: &mut TestTree,
    suite: &str,
    path: &Path,
    text: &str,
) -> Result<Vec<TestDeclaration>, DiscoveryError> {
    tree.clear_children(suite);

    let document = TextDocument::new(text);
    let mut tests = Vec::new();
    let declarations = Scanner::for_path(path)
        .scan_with(text, |declaration| {
            let range = document.line_range(declaration.location.line);
            tests.push(TreeNode::test(path, declaration.name.clone(), range));
        })
        .map_err(|source| DiscoveryError::Scan {
            path: path.to_path_buf(),
            source,
        })?;

    for test in tests {
        tree.upsert_child(suite, test);
    }

    tracing::debug!(suite, tests = declarations.len(), "suite populated");
    Ok(declarations)
}
