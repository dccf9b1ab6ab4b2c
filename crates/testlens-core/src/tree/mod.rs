//! In-memory folder → suite → test hierarchy.
//!
//! The store owns no parser or process. Structure changes go through
//! `&mut TestTree`, which serializes them per owner; runs only borrow it.

mod node;

pub use node::{folder_id, suite_id, test_id, NodeKind, TreeNode};

use indexmap::IndexMap;

/// Ordered forest of folder roots.
#[derive(Debug, Clone, Default)]
pub struct TestTree {
    roots: IndexMap<String, TreeNode>,
}

impl TestTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.roots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Root nodes in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> {
        self.roots.values()
    }

    /// Insert or update a root node.
    pub fn upsert_root(&mut self, node: TreeNode) -> &mut TreeNode {
        upsert_into(&mut self.roots, node)
    }

    /// Insert or update a child of `parent_id`.
    ///
    /// Returns `None` when the parent does not exist.
    pub fn upsert_child(&mut self, parent_id: &str, node: TreeNode) -> Option<&mut TreeNode> {
        let parent = self.find_mut(parent_id)?;
        Some(upsert_into(&mut parent.children, node))
    }

    /// Detach a node from the tree and hand it back, children included.
    pub fn remove(&mut self, id: &str) -> Option<TreeNode> {
        remove_from(&mut self.roots, id)
    }

    /// Drop the children of a node. Returns `false` if the node is unknown.
    pub fn clear_children(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(node) => {
                node.children.clear();
                true
            }
            None => false,
        }
    }

    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        find_in(&self.roots, id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut TreeNode> {
        find_in_mut(&mut self.roots, id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// The node whose children hold `id`.
    pub fn parent_of(&self, id: &str) -> Option<&TreeNode> {
        parent_in(&self.roots, id)
    }

    /// Root with the given label (linear scan).
    pub fn find_root_by_label(&self, label: &str) -> Option<&TreeNode> {
        self.roots.values().find(|n| n.label == label)
    }

    /// Child of `parent_id` with the given label (linear scan).
    pub fn find_child_by_label(&self, parent_id: &str, label: &str) -> Option<&TreeNode> {
        self.find(parent_id)?
            .children
            .values()
            .find(|n| n.label == label)
    }

    /// Every node with its depth, pre-order.
    pub fn walk(&self) -> Vec<(usize, &TreeNode)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, &TreeNode)> = self.roots.values().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            stack.extend(node.children.values().rev().map(|c| (depth + 1, c)));
        }
        out
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.walk().len()
    }
}

fn upsert_into(nodes: &mut IndexMap<String, TreeNode>, node: TreeNode) -> &mut TreeNode {
    let id = node.id.clone();
    match nodes.entry(id) {
        indexmap::map::Entry::Occupied(entry) => {
            let existing = entry.into_mut();
            existing.label = node.label;
            existing.kind = node.kind;
            existing.uri = node.uri;
            existing.range = node.range;
            existing.can_resolve_children = node.can_resolve_children;
            if !node.children.is_empty() {
                existing.children = node.children;
            }
            existing
        }
        indexmap::map::Entry::Vacant(entry) => entry.insert(node),
    }
}

fn remove_from(nodes: &mut IndexMap<String, TreeNode>, id: &str) -> Option<TreeNode> {
    if let Some(node) = nodes.shift_remove(id) {
        return Some(node);
    }
    nodes
        .values_mut()
        .find_map(|node| remove_from(&mut node.children, id))
}

fn find_in<'a>(nodes: &'a IndexMap<String, TreeNode>, id: &str) -> Option<&'a TreeNode> {
    if let Some(node) = nodes.get(id) {
        return Some(node);
    }
    nodes.values().find_map(|node| find_in(&node.children, id))
}

fn find_in_mut<'a>(nodes: &'a mut IndexMap<String, TreeNode>, id: &str) -> Option<&'a mut TreeNode> {
    if nodes.contains_key(id) {
        return nodes.get_mut(id);
    }
    nodes
        .values_mut()
        .find_map(|node| find_in_mut(&mut node.children, id))
}

fn parent_in<'a>(nodes: &'a IndexMap<String, TreeNode>, id: &str) -> Option<&'a TreeNode> {
    nodes.values().find_map(|node| {
        if node.children.contains_key(id) {
            Some(node)
        } else {
            parent_in(&node.children, id)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Range;
    use std::path::Path;

    fn sample() -> TestTree {
        let mut tree = TestTree::new();
        let folder = TreeNode::folder(Path::new("/w"), "<root>");
        let folder_id = folder.id.clone();
        tree.upsert_root(folder);

        let file = Path::new("/w/a.test.ts");
        tree.upsert_child(&folder_id, TreeNode::suite(file)).unwrap();
        tree.upsert_child("/w/a.test.ts", TreeNode::test(file, "one", Range::default()))
            .unwrap();
        tree.upsert_child("/w/a.test.ts", TreeNode::test(file, "two", Range::default()))
            .unwrap();
        tree
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut tree = sample();
        let before = tree.len();
        tree.upsert_child("/w/a.test.ts", TreeNode::test(Path::new("/w/a.test.ts"), "one", Range::default()))
            .unwrap();
        assert_eq!(tree.len(), before);

        // Re-upserting the suite keeps its children
        tree.upsert_child("/w", TreeNode::suite(Path::new("/w/a.test.ts"))).unwrap();
        assert_eq!(tree.find("/w/a.test.ts").unwrap().children.len(), 2);
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let tree = sample();
        let labels: Vec<_> = tree
            .find("/w/a.test.ts")
            .unwrap()
            .children()
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(labels, vec!["one", "two"]);
    }

    #[test]
    fn test_upsert_child_unknown_parent() {
        let mut tree = sample();
        assert!(tree
            .upsert_child("missing", TreeNode::suite(Path::new("/w/b.test.ts")))
            .is_none());
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut tree = sample();
        let removed = tree.remove("/w/a.test.ts").unwrap();
        assert_eq!(removed.children.len(), 2);
        assert!(!tree.contains("/w/a.test.ts::one"));
        assert!(tree.remove("/w/a.test.ts").is_none());
    }

    #[test]
    fn test_clear_children() {
        let mut tree = sample();
        assert!(tree.clear_children("/w/a.test.ts"));
        assert!(tree.find("/w/a.test.ts").unwrap().children.is_empty());
        assert!(!tree.clear_children("missing"));
    }

    #[test]
    fn test_lookup_helpers() {
        let tree = sample();
        assert_eq!(tree.find_root_by_label("<root>").unwrap().id, "/w");
        assert_eq!(
            tree.find_child_by_label("/w/a.test.ts", "two").unwrap().id,
            "/w/a.test.ts::two"
        );
        assert_eq!(tree.parent_of("/w/a.test.ts::two").unwrap().id, "/w/a.test.ts");
        assert!(tree.parent_of("/w").is_none());
    }

    #[test]
    fn test_walk_depths() {
        let tree = sample();
        let depths: Vec<_> = tree.walk().iter().map(|(d, n)| (*d, n.kind)).collect();
        assert_eq!(
            depths,
            vec![
                (0, NodeKind::Folder),
                (1, NodeKind::Suite),
                (2, NodeKind::Test),
                (2, NodeKind::Test),
            ]
        );
    }
}
