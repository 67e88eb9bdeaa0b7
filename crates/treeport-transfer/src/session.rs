//! Browser session over one user's directory mappings
//!
//! A session owns the projected forest (one tree per mapping) and the flat
//! key index, and routes every user action through the configured
//! transport. Tree and index are kept behind one async mutex so that a
//! user action and a refresh never interleave; different sessions share
//! nothing but the transport.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use treeport_core::{
    keys, DirectoryMapping, MappingProvider, ObjectKeyIndex, RemoteObject, TransferMode, TreeNode,
    TreeProjector,
};

use crate::transport::{ObjectLister, ObjectStream, TempUpload, TransferTransport, UploadProgress};
use crate::{Error, Result};

/// Entry of a folder listing as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub mapping_id: u64,
    pub label: String,
    pub key: String,
    pub is_folder: bool,
    /// Known size for files, `None` for folders
    pub size_bytes: Option<u64>,
}

/// A mapping whose listing failed during a build or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingFailure {
    pub mapping_id: u64,
    pub error: String,
}

/// Outcome of building the forest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Mappings that got a root node
    pub mappings: usize,
    /// Objects placed in the key index
    pub objects: usize,
    pub failures: Vec<ListingFailure>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
struct Forest {
    roots: BTreeMap<u64, TreeNode>,
    index: ObjectKeyIndex,
    consistency_errors: u64,
}

impl Forest {
    /// Record a tree update that failed after the backend already changed
    fn note_inconsistency(&mut self, operation: &str, err: &treeport_core::Error) {
        self.consistency_errors += 1;
        error!(
            operation,
            error = %err,
            total = self.consistency_errors,
            "Tree out of step with backing store"
        );
    }
}

/// One user's browsing session
pub struct BrowserSession {
    id: Uuid,
    user_id: u64,
    projector: TreeProjector,
    mappings: Vec<Arc<DirectoryMapping>>,
    transport: Arc<dyn TransferTransport>,
    lister: Arc<dyn ObjectLister>,
    forest: Mutex<Forest>,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("bucket", &self.projector.bucket())
            .field("mappings", &self.mappings.len())
            .field("mode", &self.transport.mode())
            .finish()
    }
}

impl BrowserSession {
    /// Open a session for `user_id` and build its forest.
    ///
    /// Listing failures do not fail the session: the affected mappings get
    /// an empty root and are reported in the returned [`BuildReport`].
    pub async fn open(
        user_id: u64,
        provider: &dyn MappingProvider,
        projector: TreeProjector,
        transport: Arc<dyn TransferTransport>,
        lister: Arc<dyn ObjectLister>,
    ) -> (Self, BuildReport) {
        let session = Self {
            id: Uuid::new_v4(),
            user_id,
            projector,
            mappings: provider.mappings_for(user_id),
            transport,
            lister,
            forest: Mutex::new(Forest::default()),
        };
        info!(
            session_id = %session.id,
            user_id,
            mappings = session.mappings.len(),
            mode = %session.transport.mode(),
            "Opened browser session"
        );
        let report = session.refresh().await;
        (session, report)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn mode(&self) -> TransferMode {
        self.transport.mode()
    }

    pub fn mappings(&self) -> &[Arc<DirectoryMapping>] {
        &self.mappings
    }

    /// Tree updates that failed after a successful transport operation
    pub async fn consistency_errors(&self) -> u64 {
        self.forest.lock().await.consistency_errors
    }

    /// Re-list every mapping and replace the forest
    pub async fn refresh(&self) -> BuildReport {
        let mut forest = self.forest.lock().await;
        let mut roots = BTreeMap::new();
        let mut index = ObjectKeyIndex::new();
        let mut report = BuildReport::default();

        for mapping in &self.mappings {
            let listed = match mapping.root_key(self.projector.bucket()) {
                Ok(root_key) => self.lister.list(&root_key).await,
                Err(e) => Err(e.into()),
            };

            let root = match listed {
                Ok(objects) => {
                    let root = self
                        .projector
                        .build_from_listing(Arc::clone(mapping), objects.iter().map(|o| o.key.as_str()));
                    index.extend(objects);
                    root
                }
                Err(e) => {
                    error!(mapping_id = mapping.id, error = %e, "Listing mapping failed");
                    report.failures.push(ListingFailure {
                        mapping_id: mapping.id,
                        error: e.to_string(),
                    });
                    self.projector.root_for(Arc::clone(mapping))
                }
            };

            match root {
                Ok(root) => {
                    roots.insert(mapping.id, root);
                }
                Err(e) => {
                    // Only reachable for a target outside the bucket, already reported
                    debug!(mapping_id = mapping.id, error = %e, "No root for mapping");
                }
            }
        }

        report.mappings = roots.len();
        report.objects = index.len();
        forest.roots = roots;
        forest.index = index;

        info!(
            session_id = %self.id,
            mappings = report.mappings,
            objects = report.objects,
            failures = report.failures.len(),
            "Forest built"
        );
        report
    }

    /// One entry per mapping root, labelled with the mapping's entry
    pub async fn roots(&self) -> Vec<EntryView> {
        let forest = self.forest.lock().await;
        forest
            .roots
            .values()
            .map(|root| EntryView {
                mapping_id: root.mapping().id,
                label: root.display_label().to_string(),
                key: root.full_key().to_string(),
                is_folder: true,
                size_bytes: None,
            })
            .collect()
    }

    /// Full key of a mapping's root node
    pub async fn root_key(&self, mapping_id: u64) -> Result<String> {
        let forest = self.forest.lock().await;
        let root = forest
            .roots
            .get(&mapping_id)
            .ok_or(treeport_core::Error::UnknownMapping(mapping_id))?;
        Ok(root.full_key().to_string())
    }

    /// Sub-folders of the folder `folder_key`
    pub async fn folders(&self, mapping_id: u64, folder_key: &str) -> Result<Vec<EntryView>> {
        self.entries(mapping_id, folder_key, true).await
    }

    /// Files directly inside the folder `folder_key`
    pub async fn files(&self, mapping_id: u64, folder_key: &str) -> Result<Vec<EntryView>> {
        self.entries(mapping_id, folder_key, false).await
    }

    async fn entries(&self, mapping_id: u64, folder_key: &str, want_folders: bool) -> Result<Vec<EntryView>> {
        let forest = self.forest.lock().await;
        let folder = find_folder(&forest, mapping_id, folder_key)?;
        Ok(TreeProjector::list_children(folder, want_folders)
            .into_iter()
            .map(|node| EntryView {
                mapping_id,
                label: node.label().to_string(),
                key: node.full_key().to_string(),
                is_folder: node.is_folder(),
                size_bytes: if node.is_folder() {
                    None
                } else {
                    forest.index.size_of(node.full_key())
                },
            })
            .collect())
    }

    /// Indented rendering of every mapping's tree
    pub async fn render(&self) -> String {
        let forest = self.forest.lock().await;
        forest.roots.values().map(TreeNode::render).collect()
    }

    /// Open a stream over the file `key`
    pub async fn download(&self, mapping_id: u64, key: &str) -> Result<ObjectStream> {
        let forest = self.forest.lock().await;
        let node = find_file(&forest, mapping_id, key)?;
        let size = forest.index.size_of(node.full_key()).unwrap_or(0);
        self.transport.open_read_stream(node, size).await
    }

    /// Zip archive of the files `keys`, each entry named by its full key
    pub async fn zip(&self, mapping_id: u64, keys: &[String]) -> Result<Vec<u8>> {
        let forest = self.forest.lock().await;
        let mut nodes = Vec::with_capacity(keys.len());
        let mut sizes = Vec::with_capacity(keys.len());
        for key in keys {
            let node = find_file(&forest, mapping_id, key)?;
            sizes.push(forest.index.size_of(node.full_key()).unwrap_or(0));
            nodes.push(node);
        }
        self.transport.zip_objects(&nodes, &sizes).await
    }

    /// Upload `temp` into the folder `folder_key` and return the new key.
    ///
    /// An existing object with the same key is only replaced when
    /// `overwrite` is set.
    pub async fn upload(
        &self,
        mapping_id: u64,
        folder_key: &str,
        temp: &TempUpload,
        overwrite: bool,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<String> {
        self.require_writable(mapping_id, "upload")?;
        let size = temp.size().await?;

        let mut forest = self.forest.lock().await;
        let folder = find_folder(&forest, mapping_id, folder_key)?;
        let key = keys::upload_key(folder.full_key(), temp.file_name())?;
        reject_folder_key(&forest, mapping_id, &key)?;
        if !overwrite && forest.index.contains(&key) {
            return Err(Error::AlreadyExists(key));
        }

        let new_key = self.transport.upload(folder, temp, progress).await?;

        forest.index.insert(RemoteObject::new(new_key.clone(), size));
        let forest = &mut *forest;
        if let Some(root) = forest.roots.get_mut(&mapping_id) {
            if let Err(e) = self.projector.insert(root, &new_key) {
                forest.note_inconsistency("upload", &e);
            }
        }

        info!(session_id = %self.id, key = %new_key, bytes = size, "Upload complete");
        Ok(new_key)
    }

    /// Delete the file `key`
    pub async fn delete(&self, mapping_id: u64, key: &str) -> Result<()> {
        self.require_writable(mapping_id, "delete")?;

        let mut forest = self.forest.lock().await;
        let node = find_file(&forest, mapping_id, key)?;
        let full_key = node.full_key().to_string();
        self.transport.delete(node).await?;

        forest.index.remove(&full_key);
        let forest = &mut *forest;
        if let Some(root) = forest.roots.get_mut(&mapping_id) {
            if let Err(e) = self.projector.remove(root, &full_key) {
                forest.note_inconsistency("delete", &e);
            }
        }

        info!(session_id = %self.id, key = %full_key, "Delete complete");
        Ok(())
    }

    /// Rename the file `key` to `new_name` and return the new key
    pub async fn rename(&self, mapping_id: u64, key: &str, new_name: &str) -> Result<String> {
        self.require_writable(mapping_id, "rename")?;

        let mut forest = self.forest.lock().await;
        let node = find_file(&forest, mapping_id, key)?;
        let old_key = node.full_key().to_string();
        reject_folder_key(&forest, mapping_id, &keys::renamed_key(&old_key, new_name)?)?;
        let new_key = self.transport.rename(node, new_name).await?;

        let size = forest.index.remove(&old_key).map_or(0, |o| o.size_bytes);
        forest.index.insert(RemoteObject::new(new_key.clone(), size));
        let forest = &mut *forest;
        if let Some(root) = forest.roots.get_mut(&mapping_id) {
            let updated = self
                .projector
                .remove(root, &old_key)
                .and_then(|_| self.projector.insert(root, &new_key));
            if let Err(e) = updated {
                forest.note_inconsistency("rename", &e);
            }
        }

        info!(session_id = %self.id, from = %old_key, to = %new_key, "Rename complete");
        Ok(new_key)
    }

    /// Reject mutations on read-only mappings
    ///
    /// NIST 800-53: AC-3 (Access Enforcement)
    fn require_writable(&self, mapping_id: u64, operation: &str) -> Result<()> {
        let mapping = self
            .mappings
            .iter()
            .find(|m| m.id == mapping_id)
            .ok_or(treeport_core::Error::UnknownMapping(mapping_id))?;
        if !mapping.writable {
            warn!(
                session_id = %self.id,
                user_id = self.user_id,
                mapping_id,
                operation,
                "Write attempted on read-only mapping"
            );
            return Err(Error::PermissionDenied(format!(
                "{} is read-only",
                mapping.entry
            )));
        }
        Ok(())
    }
}

fn find_node<'a>(forest: &'a Forest, mapping_id: u64, key: &str) -> Result<&'a TreeNode> {
    let root = forest
        .roots
        .get(&mapping_id)
        .ok_or(treeport_core::Error::UnknownMapping(mapping_id))?;
    root.find(key)
        .ok_or_else(|| Error::NotFound(key.to_string()))
}

/// A file may not take the key of an existing folder
fn reject_folder_key(forest: &Forest, mapping_id: u64, key: &str) -> Result<()> {
    match find_node(forest, mapping_id, key) {
        Ok(node) if node.is_folder() => Err(Error::AlreadyExists(key.to_string())),
        _ => Ok(()),
    }
}

fn find_folder<'a>(forest: &'a Forest, mapping_id: u64, key: &str) -> Result<&'a TreeNode> {
    let node = find_node(forest, mapping_id, key)?;
    if !node.is_folder() {
        return Err(treeport_core::Error::InvalidPath(format!("{} is not a folder", key)).into());
    }
    Ok(node)
}

fn find_file<'a>(forest: &'a Forest, mapping_id: u64, key: &str) -> Result<&'a TreeNode> {
    let node = find_node(forest, mapping_id, key)?;
    if node.is_folder() {
        return Err(treeport_core::Error::InvalidPath(format!("{} is a folder", key)).into());
    }
    Ok(node)
}
