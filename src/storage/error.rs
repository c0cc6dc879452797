//! Storage layer error types
//!
//! Every failure the repository, status and sync layers can report is
//! defined here with `thiserror`. Callers branch on the classification
//! helpers rather than on individual variants.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::InvalidNameError;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// a path is absent from the working tree or from a commit's tree
    #[error("not found: {0}")]
    NotFound(String),

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// a repository already exists where one was about to be created
    #[error("repository already exists: {0}")]
    AlreadyExists(PathBuf),

    /// the working tree matches the last commit
    #[error("nothing to commit, working tree clean")]
    NothingToCommit,

    /// the remote blob store could not be reached or refused the request
    #[error("remote storage unavailable for {key}: {reason}")]
    RemoteUnavailable { key: String, reason: String },

    /// invalid site id or repository path
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// data integrity check failed
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: String, reason: String },

    /// I/O error from the virtual filesystem
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// the filesystem backend cannot host a repository
    #[error("filesystem backend has no real path for {0}")]
    Unsupported(PathBuf),

    /// repo is not initialized
    #[error("repository not initialized: {0}")]
    NotInitialized(PathBuf),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) | StorageError::CommitNotFound(_) => true,
            StorageError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            StorageError::Git(e) => e.code() == git2::ErrorCode::NotFound,
            _ => false,
        }
    }

    /// check if this error means "nothing happened" rather than "something is wrong"
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            StorageError::NothingToCommit | StorageError::AlreadyExists(_)
        ) || self.is_not_found()
    }

    /// check if the remote store was at fault
    pub fn is_remote(&self) -> bool {
        matches!(self, StorageError::RemoteUnavailable { .. })
    }

    /// convert a VFS error for `path`, mapping missing files to `NotFound`
    pub(crate) fn from_io(path: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_string())
        } else {
            StorageError::Io(err)
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = StorageError::NotFound("public/a.md".to_string());
        assert!(not_found.is_not_found());
        assert!(not_found.is_soft());
        assert!(!not_found.is_remote());

        let clean = StorageError::NothingToCommit;
        assert!(!clean.is_not_found());
        assert!(clean.is_soft());

        let remote = StorageError::RemoteUnavailable {
            key: "alice/blog/public/pages.json".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(remote.is_remote());
        assert!(!remote.is_soft());
    }

    #[test]
    fn test_io_not_found_mapping() {
        let err = StorageError::from_io("public/a.md", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, StorageError::NotFound(ref p) if p == "public/a.md"));

        let err = StorageError::from_io("public/a.md", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, StorageError::Io(_)));
        assert!(!err.is_not_found());
    }
}
