//! Error types for the tree projector and its data model
//!
//! NIST 800-53: SI-11 (Error Handling)
//! Implementation: Errors carry enough context to diagnose a stale or
//! inconsistent tree without exposing backing-store credentials

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    /// The tree could not resolve a key during insert or remove.
    ///
    /// The tree is left untouched when this is returned. Callers that
    /// already completed the matching backing-store operation should log
    /// and count it rather than fail the whole operation.
    #[error("Tree consistency error: {0}")]
    TreeConsistency(String),

    /// A file name supplied for upload or rename is not a single path segment
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// A key or path does not belong to the expected mapping
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// No directory mapping with this id is visible to the session
    #[error("Unknown directory mapping: {0}")]
    UnknownMapping(u64),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if error was caused by caller input rather than tree state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_) | Error::InvalidPath(_) | Error::UnknownMapping(_)
        )
    }

    /// Create a tree consistency error with context
    pub fn tree(context: impl Into<String>) -> Self {
        Error::TreeConsistency(context.into())
    }

    /// Create an invalid name error with context
    pub fn invalid_name(context: impl Into<String>) -> Self {
        Error::InvalidName(context.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_client_error() {
        assert!(Error::InvalidName("a/b".into()).is_client_error());
        assert!(Error::InvalidPath("x".into()).is_client_error());
        assert!(Error::UnknownMapping(7).is_client_error());
        assert!(!Error::tree("missing").is_client_error());
        assert!(!Error::Config("bucket".into()).is_client_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::tree("alice/x.txt not found").to_string(),
            "Tree consistency error: alice/x.txt not found"
        );
        assert_eq!(Error::UnknownMapping(3).to_string(), "Unknown directory mapping: 3");
    }
}
