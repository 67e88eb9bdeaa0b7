//! SFTP transport
//!
//! Used when the bucket is fronted by an SFTP server whose virtual folders
//! match the directory mappings. A node's key is translated into the
//! server path by swapping the mapping's target for its entry; the channel
//! underneath is abstracted so the translation and audit logic can be
//! exercised without a server.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};
use treeport_core::{keys, DirectoryMapping, TransferMode, TreeNode};

use crate::audit::{AuditLogger, Direction, MODE_READ, MODE_WRITE};
use crate::transport::{AuditedReader, ObjectStream, TempUpload, TransferTransport, UploadProgress};
use crate::{Error, Result};

/// Remote file primitives the SFTP transport needs
#[async_trait]
pub trait SftpChannel: Send + Sync {
    /// Open a remote file for reading
    async fn open_read(&self, path: &str) -> Result<ObjectStream>;

    /// Remove a remote file
    async fn remove(&self, path: &str) -> Result<()>;

    /// Copy a local file to `remote`, replacing it; returns bytes written
    async fn put_file(&self, local: &Path, remote: &str) -> Result<u64>;

    /// Rename a remote file
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Check whether a remote path exists
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Translate an object key into the SFTP server path for `mapping`.
///
/// The key may carry the bucket or not: with target `/bucket/alice` and
/// entry `/personal`, both `bucket/alice/sub/f.txt` and `alice/sub/f.txt`
/// become `/personal/sub/f.txt`.
pub fn sftp_path(mapping: &DirectoryMapping, key: &str, bucket: &str) -> Result<String> {
    let entry = mapping.entry.trim_end_matches('/');
    let with_bucket = mapping.target.trim_matches('/');
    let relative = mapping.storage_prefix(bucket)?;
    let key = key.trim_start_matches('/');

    let rest = strip_dir(key, with_bucket)
        .or_else(|| strip_dir(key, &relative))
        .ok_or_else(|| {
            treeport_core::Error::InvalidPath(format!(
                "{} is outside mapping target {}",
                key, mapping.target
            ))
        })?;

    Ok(match (entry.is_empty(), rest.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => entry.to_string(),
        _ => format!("{}/{}", entry, rest),
    })
}

/// `key` below `dir` with no surrounding slashes, if it is below it
fn strip_dir<'a>(key: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(key.trim_end_matches('/'));
    }
    let rest = key.strip_prefix(dir)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('/').map(|r| r.trim_end_matches('/'))
}

/// Transport over an SFTP channel
pub struct SftpTransport<C: SftpChannel> {
    channel: C,
    bucket: String,
    audit: AuditLogger,
}

impl<C: SftpChannel> SftpTransport<C> {
    pub fn new(channel: C, bucket: impl Into<String>, audit: AuditLogger) -> Self {
        Self {
            channel,
            bucket: bucket.into(),
            audit,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    fn path_of(&self, mapping: &DirectoryMapping, key: &str) -> Result<String> {
        sftp_path(mapping, key, &self.bucket)
    }
}

#[async_trait]
impl<C: SftpChannel> TransferTransport for SftpTransport<C> {
    fn mode(&self) -> TransferMode {
        TransferMode::Sftp
    }

    async fn open_read_stream(&self, node: &TreeNode, expected_size: u64) -> Result<ObjectStream> {
        let path = self.path_of(node.mapping(), node.full_key())?;
        let inner = self.channel.open_read(&path).await?;
        self.audit.open(path.clone(), MODE_READ);

        debug!(path = %path, expected_size, "Opened remote file");
        Ok(Box::pin(AuditedReader::new(
            inner,
            self.audit.clone(),
            path,
            expected_size,
        )))
    }

    async fn delete(&self, node: &TreeNode) -> Result<()> {
        let path = self.path_of(node.mapping(), node.full_key())?;
        match self.channel.remove(&path).await {
            Ok(()) => {}
            Err(Error::NotFound(_)) => debug!(path = %path, "Remote file already gone"),
            Err(e) => return Err(e),
        }

        self.audit.delete(path.clone());
        info!(path = %path, "Deleted remote file");
        Ok(())
    }

    async fn upload(
        &self,
        parent: &TreeNode,
        temp: &TempUpload,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<String> {
        let key = keys::upload_key(parent.full_key(), temp.file_name())?;
        let path = self.path_of(parent.mapping(), &key)?;
        self.audit.open(path.clone(), MODE_WRITE);

        let bytes = self.channel.put_file(temp.path(), &path).await?;
        if let Some(progress) = progress {
            progress.on_part(1, bytes, bytes);
        }

        self.audit.close(path.clone(), Direction::In, bytes);
        info!(path = %path, bytes, "Uploaded remote file");
        Ok(key)
    }

    async fn rename(&self, node: &TreeNode, new_name: &str) -> Result<String> {
        let new_key = keys::renamed_key(node.full_key(), new_name)?;
        let from = self.path_of(node.mapping(), node.full_key())?;
        let to = self.path_of(node.mapping(), &new_key)?;

        if self.channel.exists(&to).await? {
            return Err(Error::AlreadyExists(to));
        }
        self.channel.rename(&from, &to).await?;

        self.audit.rename(from.clone(), to.clone());
        info!(from = %from, to = %to, "Renamed remote file");
        Ok(new_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> DirectoryMapping {
        DirectoryMapping::new(1, 10, "/personal", "/bucket/alice", true)
    }

    #[test]
    fn test_path_with_and_without_bucket() {
        assert_eq!(
            sftp_path(&alice(), "bucket/alice/sub/file.txt", "bucket").unwrap(),
            "/personal/sub/file.txt"
        );
        assert_eq!(
            sftp_path(&alice(), "alice/sub/file.txt", "bucket").unwrap(),
            "/personal/sub/file.txt"
        );
    }

    #[test]
    fn test_path_of_root() {
        assert_eq!(sftp_path(&alice(), "alice/", "bucket").unwrap(), "/personal");
    }

    #[test]
    fn test_path_outside_target() {
        assert!(sftp_path(&alice(), "bob/file.txt", "bucket").is_err());
        assert!(sftp_path(&alice(), "alicex/file.txt", "bucket").is_err());
    }

    #[test]
    fn test_path_for_bucket_root_mapping() {
        let mapping = DirectoryMapping::new(2, 10, "/all", "/bucket", false);
        assert_eq!(sftp_path(&mapping, "dir/f.txt", "bucket").unwrap(), "/all/dir/f.txt");

        let slash = DirectoryMapping::new(3, 10, "/", "/bucket/alice", false);
        assert_eq!(sftp_path(&slash, "alice/f.txt", "bucket").unwrap(), "/f.txt");
        assert_eq!(sftp_path(&slash, "alice/", "bucket").unwrap(), "/");
    }
}
