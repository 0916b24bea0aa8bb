//! Catalog error types
//!
//! Store errors never leave the catalog as-is: the client catches them and
//! re-raises one of these with the operation, reference and key in the
//! message.

use std::path::PathBuf;

use thiserror::Error;

use super::schema::SchemaError;
use crate::model::{InvalidNameError, SchemaTableName};
use crate::storage::VersionStoreError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    #[error("schema already exists: {0}")]
    SchemaAlreadyExists(String),

    #[error("table not found: {0}")]
    TableNotFound(SchemaTableName),

    #[error("table already exists: {0}")]
    TableAlreadyExists(SchemaTableName),

    /// the catalog could not read or resolve what it needed
    #[error("{message}")]
    LookupFailure {
        message: String,
        #[source]
        source: Option<VersionStoreError>,
    },

    /// a write was rejected or could not be confirmed
    #[error("{message}")]
    CommitFailure {
        message: String,
        #[source]
        source: Option<VersionStoreError>,
    },

    #[error("mutation requires a plain branch reference, not a hash-pinned or tag reference (reference: {0})")]
    ImmutableReference(String),

    /// a caller broke an API contract; not retried
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("reference {0} is not a branch")]
    NotABranch(String),

    /// the store could not be reached; the outcome of a write is unknown
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: VersionStoreError,
    },

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("metadata file {path}: {source}")]
    MetadataIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata format: {0}")]
    MetadataFormat(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn lookup(message: impl Into<String>, source: VersionStoreError) -> Self {
        CatalogError::LookupFailure {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn commit(message: impl Into<String>, source: VersionStoreError) -> Self {
        CatalogError::CommitFailure {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn transport(message: impl Into<String>, source: VersionStoreError) -> Self {
        CatalogError::Transport {
            message: message.into(),
            source,
        }
    }

    /// check if this error indicates the schema or table doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::SchemaNotFound(_) | CatalogError::TableNotFound(_))
    }

    pub fn is_commit_failure(&self) -> bool {
        matches!(self, CatalogError::CommitFailure { .. })
    }
}

/// result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
