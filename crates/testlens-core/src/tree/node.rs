//! Node types for the test tree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{SEARCHING_NODE_ID, SEARCHING_NODE_LABEL};
use crate::document::Range;
use crate::resolver::normalize_separators;

/// Role of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// One resolved working directory.
    Folder,
    /// One test file.
    Suite,
    /// One declaration inside a file.
    Test,
}

impl NodeKind {
    /// Tag name used by hosts to tag items.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::Suite => "testSuite",
            NodeKind::Test => "test",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Folder => write!(f, "Folder"),
            Self::Suite => write!(f, "Suite"),
            Self::Test => write!(f, "Test"),
        }
    }
}

/// A node in the test tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub label: String,
    pub kind: NodeKind,
    /// Path backing this node: working directory or test file.
    pub uri: PathBuf,
    /// Declaration line, for test nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    /// Children are produced lazily by scanning the file.
    pub can_resolve_children: bool,
    /// Children in insertion order, keyed by id.
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub children: IndexMap<String, TreeNode>,
}

impl TreeNode {
    /// Folder node for a working directory.
    pub fn folder(dir: &Path, label: impl Into<String>) -> Self {
        Self {
            id: folder_id(dir),
            label: label.into(),
            kind: NodeKind::Folder,
            uri: dir.to_path_buf(),
            range: None,
            can_resolve_children: false,
            children: IndexMap::new(),
        }
    }

    /// Suite node for a test file, labelled with its basename.
    pub fn suite(path: &Path) -> Self {
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            id: suite_id(path),
            label,
            kind: NodeKind::Suite,
            uri: path.to_path_buf(),
            range: None,
            can_resolve_children: true,
            children: IndexMap::new(),
        }
    }

    /// Test node for a declaration in `path`.
    pub fn test(path: &Path, name: impl Into<String>, range: Range) -> Self {
        let name = name.into();
        Self {
            id: test_id(path, &name),
            label: name,
            kind: NodeKind::Test,
            uri: path.to_path_buf(),
            range: Some(range),
            can_resolve_children: false,
            children: IndexMap::new(),
        }
    }

    /// Transient node shown while discovery walks the workspace.
    pub fn searching(root: &Path) -> Self {
        Self {
            id: SEARCHING_NODE_ID.to_string(),
            label: SEARCHING_NODE_LABEL.to_string(),
            kind: NodeKind::Folder,
            uri: root.to_path_buf(),
            range: None,
            can_resolve_children: false,
            children: IndexMap::new(),
        }
    }

    /// Whether this is the transient discovery node rather than a runnable folder.
    pub fn is_placeholder(&self) -> bool {
        self.id == SEARCHING_NODE_ID
    }

    pub fn children(&self) -> impl Iterator<Item = &TreeNode> {
        self.children.values()
    }

    /// Every node below this one, pre-order.
    pub fn descendants(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&TreeNode> = self.children.values().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.values().rev());
        }
        out
    }
}

/// Id of a folder node: its directory, `/`-normalized.
pub fn folder_id(dir: &Path) -> String {
    normalize_separators(&dir.to_string_lossy())
}

/// Id of a suite node: its absolute file path.
pub fn suite_id(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Id of a test node: `<file path>::<test name>`.
pub fn test_id(path: &Path, name: &str) -> String {
    format!("{}::{}", suite_id(path), name)
}
