//! Flat key listing to virtual directory tree projection
//!
//! The projector turns the keys returned by a prefix listing into a tree
//! rooted at the mapping's storage prefix, then keeps that tree in step
//! with single-object inserts and removals so the backing store does not
//! need to be listed again after every upload, rename or delete.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::tree::relative_to;
use crate::{keys, DirectoryMapping, Error, Result, TreeNode};

/// Builds and maintains one tree per directory mapping
#[derive(Debug, Clone)]
pub struct TreeProjector {
    bucket: String,
}

impl TreeProjector {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Empty root node for a mapping
    pub fn root_for(&self, mapping: Arc<DirectoryMapping>) -> Result<TreeNode> {
        let root_key = mapping.root_key(&self.bucket)?;
        Ok(TreeNode::root(mapping, root_key))
    }

    /// Build a mapping's tree from the raw keys of a listing under its target.
    ///
    /// Keys outside the mapping's storage prefix are skipped. A key ending
    /// in `/` is a directory marker and yields a folder node; any other key
    /// yields a file node for its last segment and folders for the rest.
    pub fn build_from_listing<I, K>(&self, mapping: Arc<DirectoryMapping>, raw_keys: I) -> Result<TreeNode>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut root = self.root_for(mapping)?;
        let mut placed = 0usize;
        for raw_key in raw_keys {
            let raw_key = raw_key.as_ref();
            match place(&mut root, raw_key) {
                Ok(true) => placed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = raw_key, error = %e, "Skipping key outside mapping"),
            }
        }
        debug!(
            mapping_id = root.mapping().id,
            root = root.full_key(),
            placed,
            "Built tree from listing"
        );
        Ok(root)
    }

    /// Add a single object after an upload or rename.
    ///
    /// Only missing trailing segments are created; the common ancestor
    /// subtree is reused.
    pub fn insert(&self, root: &mut TreeNode, raw_key: &str) -> Result<()> {
        place(root, raw_key).map(|_| ())
    }

    /// Remove the node whose full key is `full_key` and return it.
    ///
    /// The key is resolved by walking from the root one segment at a time.
    /// When any segment is missing the tree is left untouched and a
    /// [`Error::TreeConsistency`] is returned.
    pub fn remove(&self, root: &mut TreeNode, full_key: &str) -> Result<TreeNode> {
        let key = full_key.trim_end_matches('/');
        let relative = relative_to(root.full_key(), key).ok_or_else(|| {
            Error::tree(format!("{} is not under root {}", full_key, root.full_key()))
        })?;
        let segments = keys::segments(relative);
        let Some((last, ancestors)) = segments.split_last() else {
            return Err(Error::tree(format!("refusing to remove root {}", root.full_key())));
        };

        let mut parent = root;
        for segment in ancestors {
            let child_key = keys::join(parent.full_key(), segment);
            parent = parent
                .children_mut()
                .get_mut(&child_key)
                .ok_or_else(|| Error::tree(format!("{} has no folder {}", full_key, child_key)))?;
        }

        let child_key = keys::join(parent.full_key(), last);
        parent
            .children_mut()
            .remove(&child_key)
            .ok_or_else(|| Error::tree(format!("{} not found in tree", child_key)))
    }

    /// Direct children of `node` that are folders (`true`) or files (`false`)
    pub fn list_children(node: &TreeNode, want_folders: bool) -> Vec<&TreeNode> {
        node.children()
            .filter(|child| child.is_folder() == want_folders)
            .collect()
    }
}

/// Walk `raw_key` below `root`, creating missing nodes.
///
/// Returns `Ok(false)` when the key names the root itself.
fn place(root: &mut TreeNode, raw_key: &str) -> Result<bool> {
    let relative = relative_to(root.full_key(), raw_key).ok_or_else(|| {
        Error::tree(format!("{} is not under root {}", raw_key, root.full_key()))
    })?;
    let marks_folder = relative.ends_with('/');
    let segments = keys::segments(relative);
    if segments.is_empty() {
        return Ok(false);
    }

    let last = segments.len() - 1;
    let mut node = root;
    for (i, segment) in segments.into_iter().enumerate() {
        let is_folder = i < last || marks_folder;
        node = node.child_or_insert(segment, is_folder);
    }
    Ok(true)
}
