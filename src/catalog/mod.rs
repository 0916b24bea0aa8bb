//! Versioned table catalog.
//!
//! Tables and namespaces are entries in a [`VersionStore`](crate::storage::VersionStore);
//! every change is a commit on a branch. A [`CatalogFactory`] owns one
//! [`VersionedCatalogClient`], which in turn owns the [`ReferenceHandle`]
//! all reads and writes go through, and hands out a [`VersionedCatalog`]
//! per request.
//!
//! ```text
//!  CatalogFactory ──create(identity)──► VersionedCatalog
//!        │                                    │
//!        ▼                                    ▼
//!  VersionedCatalogClient ◄──────── TableOperations (metadata files)
//!        │
//!        ├── ReferenceHandle (branch/tag + commit lock)
//!        └── VersionStore (commits, CAS on the branch tip)
//! ```

mod client;
mod error;
mod factory;
mod metadata;
mod operations;
mod reference;
mod retry;
mod schema;
mod types;
mod versioned;

pub use client::VersionedCatalogClient;
pub use error::{CatalogError, CatalogResult};
pub use factory::{CatalogFactory, Identity};
pub use metadata::{parse_version, read_metadata, Snapshot, TableMetadata, FORMAT_VERSION};
pub use operations::{TableOperations, TablePointers, VersionedTableOperationsProvider};
pub use reference::ReferenceHandle;
pub use retry::{
    is_retryable_commit_error, is_terminal_commit_error, CommitAbort, RetryPolicy,
    MAX_COMMIT_ATTEMPTS,
};
pub use schema::{Schema, SchemaBuilder, SchemaError};
pub use types::{DataType, NestedField};
pub use versioned::{Table, VersionedCatalog, ENGINE_VERSION_PROPERTY};
