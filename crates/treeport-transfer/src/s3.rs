//! Object-store transport
//!
//! Talks to the bucket through [`object_store`]. Reads stream the object
//! body, uploads go through a multipart writer with bounded part
//! concurrency, and renames are a copy followed by a delete since the
//! store has no native rename.

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, WriteMultipart};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, error, info, warn};
use treeport_core::{keys, PortalConfig, RemoteObject, TransferMode, TreeNode, UploadConfig};

use crate::audit::{AuditLogger, Direction, MODE_READ, MODE_WRITE};
use crate::transport::{
    AuditedReader, ObjectLister, ObjectStream, TempUpload, TransferTransport, UploadProgress,
};
use crate::{Error, Result};

/// Read size while feeding the multipart writer
const UPLOAD_READ_SIZE: usize = 64 * 1024;

/// Store path for a raw object key.
///
/// `Path::from` percent-encodes characters such as `#` and `%`, which would
/// store the object under a different key than the one the tree holds.
fn object_path(key: &str) -> Result<ObjectPath> {
    ObjectPath::parse(key).map_err(|e| {
        treeport_core::Error::InvalidPath(format!("{}: {}", key, e)).into()
    })
}

/// Transport backed by an object store bucket
#[derive(Debug, Clone)]
pub struct S3Transport {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    upload: UploadConfig,
    audit: AuditLogger,
}

impl S3Transport {
    /// Transport over an existing store
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        upload: UploadConfig,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            upload,
            audit,
        }
    }

    /// Build the S3 client from configuration.
    ///
    /// Credentials come from the environment (`AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY`, instance metadata).
    pub fn from_config(config: &PortalConfig, audit: AuditLogger) -> Result<Self> {
        use object_store::aws::AmazonS3Builder;

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);

            // MinIO and other local endpoints
            if endpoint.starts_with("http://") {
                builder = builder.with_allow_http(true);
            }

            builder = builder.with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| Error::transport(format!("Failed to create S3 store: {}", e)))?;

        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 transport ready"
        );

        Ok(Self::with_store(
            Arc::new(store),
            config.bucket.clone(),
            config.upload.clone(),
            audit,
        ))
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Path recorded in OPEN and CLOSE audit lines
    fn audit_path(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    /// Feed the staged file into `writer`, reporting each completed part.
    ///
    /// Returns the number of bytes written.
    async fn stream_parts(
        &self,
        temp: &TempUpload,
        writer: &mut WriteMultipart,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<u64> {
        let total = temp.size().await?;
        let part_size = self.upload.min_part_size.max(1) as u64;
        let mut file = tokio::fs::File::open(temp.path()).await?;
        let mut buf = vec![0u8; UPLOAD_READ_SIZE];
        let mut sent = 0u64;
        let mut parts = 0usize;

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.wait_for_capacity(self.upload.max_concurrent_parts).await?;
            writer.write(&buf[..n]);
            sent += n as u64;

            let completed = (sent / part_size) as usize;
            if completed > parts {
                parts = completed;
                if let Some(progress) = progress {
                    progress.on_part(parts, sent, total);
                }
            }
        }

        // Trailing partial part
        if sent % part_size != 0 || sent == 0 {
            if let Some(progress) = progress {
                progress.on_part(parts + 1, sent, total);
            }
        }

        Ok(sent)
    }
}

#[async_trait]
impl ObjectLister for S3Transport {
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let trimmed = prefix.trim_matches('/');
        let path = object_path(trimmed)?;
        let location = if trimmed.is_empty() { None } else { Some(&path) };

        let objects: Vec<RemoteObject> = self
            .store
            .list(location)
            .map_ok(|meta| RemoteObject::new(meta.location.as_ref(), meta.size as u64))
            .try_collect()
            .await
            .map_err(|e| Error::Listing(format!("Failed to list {}: {}", prefix, e)))?;

        debug!(prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }
}

#[async_trait]
impl TransferTransport for S3Transport {
    fn mode(&self) -> TransferMode {
        TransferMode::S3
    }

    async fn open_read_stream(&self, node: &TreeNode, expected_size: u64) -> Result<ObjectStream> {
        let result = self.store.get(&object_path(node.full_key())?).await?;
        let audit_path = self.audit_path(node.full_key());
        self.audit.open(audit_path.clone(), MODE_READ);

        let body = result.into_stream().map_err(std::io::Error::other);
        let reader: ObjectStream = Box::pin(StreamReader::new(body));

        debug!(key = node.full_key(), expected_size, "Opened object stream");
        Ok(Box::pin(AuditedReader::new(
            reader,
            self.audit.clone(),
            audit_path,
            expected_size,
        )))
    }

    async fn delete(&self, node: &TreeNode) -> Result<()> {
        match self.store.delete(&object_path(node.full_key())?).await {
            Ok(()) => {}
            Err(object_store::Error::NotFound { .. }) => {
                debug!(key = node.full_key(), "Object already gone");
            }
            Err(e) => return Err(e.into()),
        }

        self.audit.delete(node.full_key());
        info!(key = node.full_key(), "Deleted object");
        Ok(())
    }

    async fn upload(
        &self,
        parent: &TreeNode,
        temp: &TempUpload,
        progress: Option<&dyn UploadProgress>,
    ) -> Result<String> {
        let key = keys::upload_key(parent.full_key(), temp.file_name())?;
        let upload = self.store.put_multipart(&object_path(&key)?).await?;
        let audit_path = self.audit_path(&key);
        self.audit.open(audit_path.clone(), MODE_WRITE);
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.upload.min_part_size);

        let sent = match self.stream_parts(temp, &mut writer, progress).await {
            Ok(sent) => sent,
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    warn!(key = %key, error = %abort, "Failed to abort multipart upload");
                }
                return Err(e);
            }
        };
        writer.finish().await?;

        self.audit.close(audit_path, Direction::In, sent);
        info!(key = %key, bytes = sent, "Uploaded object");

        if let Err(e) = tokio::fs::remove_file(temp.path()).await {
            error!(path = ?temp.path(), error = %e, "Failed to delete staged upload");
        }

        Ok(key)
    }

    async fn rename(&self, node: &TreeNode, new_name: &str) -> Result<String> {
        let new_key = keys::renamed_key(node.full_key(), new_name)?;
        let from = object_path(node.full_key())?;
        let to = object_path(&new_key)?;

        match self.store.head(&to).await {
            Ok(_) => return Err(Error::AlreadyExists(new_key)),
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        self.store.copy(&from, &to).await?;
        self.store.delete(&from).await?;

        self.audit.rename(node.full_key(), new_key.clone());
        info!(from = node.full_key(), to = %new_key, "Renamed object");
        Ok(new_key)
    }
}
