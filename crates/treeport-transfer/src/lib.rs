//! # Treeport Transfer
//!
//! File operations on projected trees, carried out over an object store or
//! an SFTP server fronting the same bucket.
//!
//! ## Features
//!
//! - One transport contract for streaming reads, deletes, uploads and renames
//! - Multipart S3 uploads with bounded part concurrency
//! - SFTP path translation from mapping targets to virtual folders
//! - In-memory zip export of several files
//! - Audit lines for every open, close, delete and rename
//! - Per-user browser sessions keeping tree and index in step with the store

pub mod archive;
pub mod audit;
pub mod backend;
pub mod client;
pub mod error;
pub mod s3;
pub mod session;
pub mod sftp;
pub mod transport;

pub use audit::{AuditEvent, AuditLogger, AuditSink, Direction, MemoryAuditSink, TracingAuditSink};
pub use backend::Backend;
pub use client::SftpConnection;
pub use error::{Error, Result};
pub use s3::S3Transport;
pub use session::{BrowserSession, BuildReport, EntryView, ListingFailure};
pub use sftp::{sftp_path, SftpChannel, SftpTransport};
pub use transport::{
    AuditedReader, ObjectLister, ObjectStream, TempUpload, TransferTransport, UploadProgress,
};
