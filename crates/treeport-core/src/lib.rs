//! # Treeport Core
//!
//! In-memory projection of a flat object-store namespace into a virtual
//! directory tree, one tree per directory mapping.
//!
//! ## Features
//!
//! - Directory mappings binding a user-facing entry to a bucket target
//! - Flat key index mirroring the backing-store listing
//! - Lazily built folder/file tree with incremental insert and remove
//! - Key arithmetic for uploads and renames
//! - TOML configuration passed explicitly to every component

pub mod config;
pub mod error;
pub mod index;
pub mod keys;
pub mod mappings;
pub mod projector;
pub mod tree;
pub mod types;

pub use config::{
    AuditConfig, LogFormat, LoggingConfig, PortalConfig, SftpConfig, UploadConfig,
};
pub use error::{Error, Result};
pub use index::ObjectKeyIndex;
pub use mappings::{MappingProvider, StaticMappings};
pub use projector::TreeProjector;
pub use tree::TreeNode;
pub use types::{DirectoryMapping, RemoteObject, TransferMode};
