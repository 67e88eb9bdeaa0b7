//! Error types for transfer operations
//!
//! NIST 800-53: SI-11 (Error Handling)
//! Implementation: Transport failures are reported to the caller for a
//! user-initiated retry; nothing in this crate retries on its own

use thiserror::Error;

/// Result type alias for transfer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transfer error types
#[derive(Error, Debug)]
pub enum Error {
    /// Listing the backing store failed
    ///
    /// The affected mapping's tree is left empty.
    #[error("Listing failed: {0}")]
    Listing(String),

    /// A fetch, delete, upload or rename failed at the transport
    #[error("Transfer failed: {0}")]
    Transport(String),

    /// The object does not exist in the backing store
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The mapping does not allow writes
    ///
    /// NIST 800-53: AC-3 (Access Enforcement)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An upload would replace an existing object without consent
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// SSH connection or authentication failure
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Building the zip archive failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tree or configuration error from the core crate
    #[error(transparent)]
    Core(#[from] treeport_core::Error),
}

impl Error {
    /// Check if the error should surface as a user notification
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Error::Core(treeport_core::Error::TreeConsistency(_)))
    }

    /// Short notification text for the browser, without backend detail
    pub fn user_message(&self) -> String {
        match self {
            Error::Listing(_) => "Could not list files".to_string(),
            Error::Transport(_) | Error::Io(_) => "Transfer failed".to_string(),
            Error::NotFound(_) => "File no longer exists".to_string(),
            Error::PermissionDenied(_) => "Permission denied".to_string(),
            Error::AlreadyExists(_) => "A file with this name already exists".to_string(),
            Error::Ssh(_) => "Could not reach the file server".to_string(),
            Error::Archive(_) => "Could not build the zip archive".to_string(),
            Error::Core(e) if e.is_client_error() => e.to_string(),
            Error::Core(_) => "Internal error".to_string(),
        }
    }

    /// Create transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Error::Transport(context.into())
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Error::NotFound(path),
            object_store::Error::AlreadyExists { path, .. } => Error::AlreadyExists(path),
            other => Error::Transport(other.to_string()),
        }
    }
}

impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        Error::Ssh(err.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for Error {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        use russh_sftp::client::error::Error as SftpError;
        use russh_sftp::protocol::StatusCode;

        match err {
            SftpError::Status(status) if matches!(status.status_code, StatusCode::NoSuchFile) => {
                Error::NotFound(status.error_message)
            }
            SftpError::Status(status) if matches!(status.status_code, StatusCode::PermissionDenied) => {
                Error::PermissionDenied(status.error_message)
            }
            other => Error::Transport(other.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_errors_are_not_user_visible() {
        let err = Error::from(treeport_core::Error::tree("stale"));
        assert!(!err.is_user_visible());
        assert!(Error::transport("boom").is_user_visible());
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = Error::transport("s3://bucket/alice/secret.txt: 503 SlowDown");
        assert_eq!(err.user_message(), "Transfer failed");

        let err = Error::from(treeport_core::Error::invalid_name("a/b must not contain path separators"));
        assert!(err.user_message().contains("a/b"));
    }

    #[test]
    fn test_object_store_not_found_maps() {
        let err = Error::from(object_store::Error::NotFound {
            path: "alice/a.txt".to_string(),
            source: "missing".into(),
        });
        assert!(matches!(err, Error::NotFound(p) if p == "alice/a.txt"));
    }
}
