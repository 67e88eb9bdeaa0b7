use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Binding of a user-facing virtual path to a backing-store path
///
/// NIST 800-53: AC-3 (Access Enforcement)
/// Implementation: `writable` gates every mutating transfer operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMapping {
    pub id: u64,
    pub user_id: u64,
    /// Virtual mount path shown to the end user, e.g. `/personal`
    pub entry: String,
    /// Absolute backing-store path including the bucket, e.g. `/bucket/alice`
    pub target: String,
    #[serde(default)]
    pub writable: bool,
}

impl DirectoryMapping {
    pub fn new(
        id: u64,
        user_id: u64,
        entry: impl Into<String>,
        target: impl Into<String>,
        writable: bool,
    ) -> Self {
        Self {
            id,
            user_id,
            entry: entry.into(),
            target: target.into(),
            writable,
        }
    }

    /// Target with the bucket removed and no surrounding slashes (`alice`).
    ///
    /// This is the relative root every listed key is expected to start with.
    pub fn storage_prefix(&self, bucket: &str) -> Result<String> {
        let trimmed = self.target.trim_start_matches('/');
        let rest = trimmed
            .strip_prefix(bucket)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| {
                Error::InvalidPath(format!(
                    "target {} of mapping {} is not inside bucket {}",
                    self.target, self.id, bucket
                ))
            })?;
        Ok(rest.trim_matches('/').to_string())
    }

    /// Full key of the mapping's root node and the listing prefix (`alice/`)
    pub fn root_key(&self, bucket: &str) -> Result<String> {
        let prefix = self.storage_prefix(bucket)?;
        if prefix.is_empty() {
            Ok(prefix)
        } else {
            Ok(format!("{}/", prefix))
        }
    }

    /// Target with only the leading `/<bucket>` removed (`/alice`)
    pub fn relative_path(&self, bucket: &str) -> String {
        let marker = format!("/{}", bucket);
        match self.target.strip_prefix(&marker) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.to_string(),
            _ => self.target.clone(),
        }
    }
}

/// Metadata mirror of one object in the backing store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub key: String,
    pub size_bytes: u64,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            size_bytes,
        }
    }

    /// Zero-length directory markers end with `/`
    pub fn is_folder(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// Which transport performs file operations for a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Direct object-store access
    #[default]
    S3,
    /// SFTP server fronting the same bucket
    Sftp,
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferMode::S3 => write!(f, "S3"),
            TransferMode::Sftp => write!(f, "SFTP"),
        }
    }
}
