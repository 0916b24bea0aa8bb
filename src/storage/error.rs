//! Version store error types
//!
//! Everything the versioned store can fail with. The catalog layer maps
//! these onto its own errors through the classification helpers below.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{ContentKey, InvalidNameError, Namespace};

/// the main error type for version store operations
#[derive(Debug, Error)]
pub enum VersionStoreError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// the named branch or tag does not exist
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// a branch or tag with this name already exists
    #[error("reference already exists: {0}")]
    ReferenceAlreadyExists(String),

    /// the branch moved away from the hash the commit was built against
    #[error("reference {reference} has moved: expected {expected}, found {actual}")]
    Conflict {
        reference: String,
        expected: String,
        actual: String,
    },

    #[error("namespace already exists: {0}")]
    NamespaceAlreadyExists(Namespace),

    #[error("namespace not found: {0}")]
    NamespaceNotFound(Namespace),

    /// the namespace still contains entries
    #[error("namespace {namespace} is not empty: {entries} entries")]
    NamespaceNotEmpty { namespace: Namespace, entries: usize },

    /// commits can only land on branches
    #[error("reference {0} is not a branch")]
    NotABranch(String),

    /// a put would store content under a key that is already a namespace
    #[error("key {0} is already used by a namespace")]
    KeyIsNamespace(ContentKey),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// data integrity check failed
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: PathBuf, reason: String },

    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// repo is not initialized
    #[error("repository not initialized: {0}")]
    NotInitialized(PathBuf),

    /// the store could not be reached at all
    #[error("transport error: {0}")]
    Transport(String),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl VersionStoreError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VersionStoreError::ReferenceNotFound(_) | VersionStoreError::NamespaceNotFound(_)
        )
    }

    pub fn is_reference_not_found(&self) -> bool {
        matches!(self, VersionStoreError::ReferenceNotFound(_))
    }

    /// check if this error is a stale-hash conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, VersionStoreError::Conflict { .. })
    }

    /// check if the store itself failed rather than rejecting the request
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            VersionStoreError::Git(_)
                | VersionStoreError::Io(_)
                | VersionStoreError::NotInitialized(_)
                | VersionStoreError::Transport(_)
        )
    }
}

/// result type alias for version store operations
pub type StoreResult<T> = Result<T, VersionStoreError>;
