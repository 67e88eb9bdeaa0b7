//! Transport contract shared by the S3 and SFTP adapters
//!
//! The browser never talks to a backend directly. It resolves a tree node,
//! then hands the node to a [`TransferTransport`]; the transport maps the
//! node's key to a backend path, performs the operation and emits the audit
//! events for it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;
use treeport_core::{RemoteObject, TransferMode, TreeNode};

use crate::audit::{AuditLogger, Direction};
use crate::{archive, Result};

/// Byte stream returned by [`TransferTransport::open_read_stream`]
pub type ObjectStream = Pin<Box<dyn AsyncRead + Send>>;

/// Local file staged for upload together with the name it should get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempUpload {
    path: PathBuf,
    file_name: String,
}

impl TempUpload {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
        }
    }

    /// Staged upload named after the local file itself
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?.to_string();
        Some(Self { path, file_name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Current size of the staged file
    pub async fn size(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }
}

/// Receives progress notifications while an upload is running
pub trait UploadProgress: Send + Sync {
    /// Called after each completed part with running totals
    fn on_part(&self, parts_done: usize, bytes_done: u64, total_bytes: u64);
}

impl<F> UploadProgress for F
where
    F: Fn(usize, u64, u64) + Send + Sync,
{
    fn on_part(&self, parts_done: usize, bytes_done: u64, total_bytes: u64) {
        self(parts_done, bytes_done, total_bytes)
    }
}

/// Prefix listing of the backing store
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Every object whose key starts with `prefix`, markers included
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>>;
}

/// File operations against one backend
///
/// Implementations must be safe to share between sessions. Every method
/// resolves the backend path from the node's full key and its mapping.
#[async_trait]
pub trait TransferTransport: Send + Sync {
    /// Backend this transport talks to
    fn mode(&self) -> TransferMode;

    /// Open a readable stream over the object behind `node`.
    ///
    /// `expected_size` comes from the key index and is only compared with
    /// the bytes actually read when the stream is closed.
    async fn open_read_stream(&self, node: &TreeNode, expected_size: u64) -> Result<ObjectStream>;

    /// Delete the object behind `node`; deleting a missing object succeeds
    async fn delete(&self, node: &TreeNode) -> Result<()>;

    /// Upload `temp` into the folder `parent` and return the new full key
    async fn upload(
        &self,
        parent: &TreeNode,
        temp: &TempUpload,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<String>;

    /// Give the object behind `node` a new last segment and return the new
    /// full key
    async fn rename(&self, node: &TreeNode, new_name: &str) -> Result<String>;

    /// Zip archive holding every node, each entry named by its full key.
    ///
    /// `sizes[i]` is the expected size of `nodes[i]`. The first failing
    /// read aborts the whole archive.
    async fn zip_objects(&self, nodes: &[&TreeNode], sizes: &[u64]) -> Result<Vec<u8>> {
        archive::zip_objects(self, nodes, sizes).await
    }
}

/// Reader that counts bytes and records the CLOSE audit event when dropped
pub struct AuditedReader {
    inner: ObjectStream,
    audit: AuditLogger,
    path: String,
    expected: u64,
    bytes: u64,
}

impl AuditedReader {
    pub fn new(inner: ObjectStream, audit: AuditLogger, path: impl Into<String>, expected: u64) -> Self {
        Self {
            inner,
            audit,
            path: path.into(),
            expected,
            bytes: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }
}

impl AsyncRead for AuditedReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(this.inner.as_mut().poll_read(cx, buf))?;
        this.bytes += (buf.filled().len() - before) as u64;
        Poll::Ready(Ok(()))
    }
}

impl Drop for AuditedReader {
    fn drop(&mut self) {
        if self.bytes != self.expected {
            debug!(
                path = %self.path,
                expected = self.expected,
                read = self.bytes,
                "Stream closed before expected size"
            );
        }
        self.audit.close(self.path.clone(), Direction::Out, self.bytes);
    }
}
