//! Virtual directory tree nodes
//!
//! A [`TreeNode`] is one folder or file in the tree projected from a flat
//! key listing. Children are keyed by their full key, so two children can
//! never collide even when labels differ only in case.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::{keys, DirectoryMapping};

/// One node of the virtual directory tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    label: String,
    full_key: String,
    is_folder: bool,
    depth: usize,
    children: BTreeMap<String, TreeNode>,
    mapping: Arc<DirectoryMapping>,
}

impl TreeNode {
    /// Root node for a mapping; label and key are both the storage prefix
    pub fn root(mapping: Arc<DirectoryMapping>, root_key: impl Into<String>) -> Self {
        let root_key = root_key.into();
        Self {
            label: root_key.clone(),
            full_key: root_key,
            is_folder: true,
            depth: 0,
            children: BTreeMap::new(),
            mapping,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn full_key(&self) -> &str {
        &self.full_key
    }

    pub fn is_folder(&self) -> bool {
        self.is_folder
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    pub fn mapping(&self) -> &DirectoryMapping {
        &self.mapping
    }

    pub fn shared_mapping(&self) -> Arc<DirectoryMapping> {
        Arc::clone(&self.mapping)
    }

    pub fn children(&self) -> impl Iterator<Item = &TreeNode> {
        self.children.values()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Direct child by full key
    pub fn child(&self, full_key: &str) -> Option<&TreeNode> {
        self.children.get(full_key)
    }

    /// Direct child by label
    pub fn child_by_label(&self, label: &str) -> Option<&TreeNode> {
        self.children.get(&keys::join(&self.full_key, label))
    }

    /// Base file name taken from the full key
    pub fn filename(&self) -> &str {
        keys::filename(&self.full_key)
    }

    /// Label shown in a folder tree: roots show their mapping's entry
    pub fn display_label(&self) -> &str {
        if self.is_root() {
            &self.mapping.entry
        } else {
            &self.label
        }
    }

    /// Locate a node in this subtree by walking its key segment by segment
    pub fn find(&self, full_key: &str) -> Option<&TreeNode> {
        let target = full_key.trim_end_matches('/');
        if target == self.full_key.trim_end_matches('/') {
            return Some(self);
        }
        let relative = relative_to(&self.full_key, target)?;
        let mut node = self;
        for segment in keys::segments(relative) {
            node = node.children.get(&keys::join(&node.full_key, segment))?;
        }
        Some(node)
    }

    /// Every node below this one, pre-order
    pub fn descendants(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&TreeNode> = self.children.values().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.values().rev());
        }
        out
    }

    /// Full keys of every file node in the subtree
    pub fn leaf_keys(&self) -> BTreeSet<String> {
        self.descendants()
            .into_iter()
            .filter(|n| !n.is_folder)
            .map(|n| n.full_key.clone())
            .collect()
    }

    /// Full keys of every folder node below this one
    pub fn folder_keys(&self) -> BTreeSet<String> {
        self.descendants()
            .into_iter()
            .filter(|n| n.is_folder)
            .map(|n| n.full_key.clone())
            .collect()
    }

    /// Indented dump of the subtree, one node per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in std::iter::once(self).chain(self.descendants()) {
            let indent = "  ".repeat(node.depth.saturating_sub(self.depth));
            let kind = if node.is_folder { "/" } else { "" };
            let _ = writeln!(out, "{}{}{}", indent, node.display_label(), kind);
        }
        out
    }

    pub(crate) fn children_mut(&mut self) -> &mut BTreeMap<String, TreeNode> {
        &mut self.children
    }

    /// Existing child for `label`, or a newly created one of the given kind.
    ///
    /// An existing node keeps its original kind.
    pub(crate) fn child_or_insert(&mut self, label: &str, is_folder: bool) -> &mut TreeNode {
        let key = keys::join(&self.full_key, label);
        let depth = self.depth + 1;
        let mapping = &self.mapping;
        self.children.entry(key).or_insert_with_key(|key| {
            tracing::trace!(key = %key, folder = is_folder, "Creating tree node");
            TreeNode {
                label: label.to_string(),
                full_key: key.clone(),
                is_folder,
                depth,
                children: BTreeMap::new(),
                mapping: Arc::clone(mapping),
            }
        })
    }
}

/// Portion of `key` below `root_key`, or `None` when the key lies elsewhere
pub(crate) fn relative_to<'a>(root_key: &str, key: &'a str) -> Option<&'a str> {
    if root_key.is_empty() {
        return Some(key);
    }
    let root = root_key.trim_end_matches('/');
    if key == root {
        return Some("");
    }
    key.strip_prefix(root)?.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> TreeNode {
        let mapping = Arc::new(DirectoryMapping::new(1, 1, "/personal", "/bucket/alice", true));
        TreeNode::root(mapping, "alice/")
    }

    #[test]
    fn test_child_keys_do_not_double_slash() {
        let mut root = root();
        let sub = root.child_or_insert("sub", true);
        assert_eq!(sub.full_key(), "alice/sub");
        assert_eq!(sub.depth(), 1);
        let file = sub.child_or_insert("b.txt", false);
        assert_eq!(file.full_key(), "alice/sub/b.txt");
        assert_eq!(file.depth(), 2);
        assert_eq!(file.mapping().entry, "/personal");
    }

    #[test]
    fn test_child_or_insert_reuses_existing() {
        let mut root = root();
        root.child_or_insert("sub", true);
        root.child_or_insert("sub", false);
        assert_eq!(root.child_count(), 1);
        assert!(root.child_by_label("sub").unwrap().is_folder());
    }

    #[test]
    fn test_display_label() {
        let mut root = root();
        assert_eq!(root.display_label(), "/personal");
        let sub = root.child_or_insert("sub", true);
        assert_eq!(sub.display_label(), "sub");
    }

    #[test]
    fn test_find() {
        let mut root = root();
        root.child_or_insert("sub", true).child_or_insert("b.txt", false);
        assert_eq!(root.find("alice/sub/b.txt").unwrap().label(), "b.txt");
        assert_eq!(root.find("alice/sub/").unwrap().label(), "sub");
        assert!(root.find("alice/").unwrap().is_root());
        assert!(root.find("alice/nope").is_none());
        assert!(root.find("bob/sub").is_none());
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("alice/", "alice/sub/b.txt"), Some("sub/b.txt"));
        assert_eq!(relative_to("alice/", "alice"), Some(""));
        assert_eq!(relative_to("alice/", "alicex/b.txt"), None);
        assert_eq!(relative_to("", "b.txt"), Some("b.txt"));
    }

    #[test]
    fn test_render() {
        let mut root = root();
        root.child_or_insert("sub", true).child_or_insert("b.txt", false);
        let rendered = root.render();
        assert_eq!(rendered, "/personal/\n  sub/\n    b.txt\n");
    }
}
