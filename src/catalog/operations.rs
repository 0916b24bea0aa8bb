//! Table operations: reading and advancing one table's metadata.
//!
//! A table commit has two halves. The new metadata file is written first,
//! then the table's pointer in the versioned store is moved to it. The
//! pointer move goes through [`TablePointers`], which the catalog client
//! implements.

use std::sync::Arc;

use log::{debug, warn};

use super::client::VersionedCatalogClient;
use super::error::{CatalogError, CatalogResult};
use super::factory::Identity;
use super::metadata::{self, TableMetadata};
use crate::model::{IcebergTable, SchemaTableName};

/// Where table pointers are read from and committed to.
pub trait TablePointers: Send + Sync {
    /// Catch up with writers elsewhere before reading.
    fn refresh_pointers(&self) -> CatalogResult<()>;

    fn load_pointer(&self, name: &SchemaTableName) -> CatalogResult<Option<IcebergTable>>;

    /// Point `name` at the metadata file at `metadata_location`, provided it
    /// still points at `previous_location`.
    fn commit_pointer(
        &self,
        name: &SchemaTableName,
        metadata: &TableMetadata,
        previous_location: Option<&str>,
        metadata_location: &str,
        author: &str,
    ) -> CatalogResult<()>;
}

impl TablePointers for VersionedCatalogClient {
    fn refresh_pointers(&self) -> CatalogResult<()> {
        self.refresh_reference().map(|_| ())
    }

    fn load_pointer(&self, name: &SchemaTableName) -> CatalogResult<Option<IcebergTable>> {
        self.load_table(name)
    }

    fn commit_pointer(
        &self,
        name: &SchemaTableName,
        metadata: &TableMetadata,
        previous_location: Option<&str>,
        metadata_location: &str,
        author: &str,
    ) -> CatalogResult<()> {
        self.replace_table(metadata, name, previous_location, metadata_location, author)
    }
}

/// Operations on one table on behalf of one user.
pub struct TableOperations {
    pointers: Arc<dyn TablePointers>,
    name: SchemaTableName,
    author: String,
    current: Option<TableMetadata>,
    current_location: Option<String>,
}

impl TableOperations {
    pub fn new(pointers: Arc<dyn TablePointers>, name: SchemaTableName, author: impl Into<String>) -> Self {
        Self {
            pointers,
            name,
            author: author.into(),
            current: None,
            current_location: None,
        }
    }

    pub fn name(&self) -> &SchemaTableName {
        &self.name
    }

    /// Metadata as of the last refresh or commit.
    pub fn current(&self) -> Option<&TableMetadata> {
        self.current.as_ref()
    }

    pub fn current_metadata_location(&self) -> Option<&str> {
        self.current_location.as_deref()
    }

    /// Move to the latest state of the reference, then reload the pointer
    /// and the metadata file it names.
    ///
    /// `None` when the table does not exist.
    pub fn refresh(&mut self) -> CatalogResult<Option<&TableMetadata>> {
        self.pointers.refresh_pointers()?;
        match self.pointers.load_pointer(&self.name)? {
            Some(pointer) => {
                let metadata = metadata::read_metadata(&pointer.metadata_location)?;
                debug!("{} is at {}", self.name, pointer.metadata_location);
                self.current = Some(metadata);
                self.current_location = Some(pointer.metadata_location);
            }
            None => {
                self.current = None;
                self.current_location = None;
            }
        }
        Ok(self.current.as_ref())
    }

    /// Replace `base` with `metadata`. `base` must be what this instance
    /// last saw; pass `None` to create the table.
    ///
    /// Returns the location of the new metadata file.
    pub fn commit(&mut self, base: Option<&TableMetadata>, metadata: &TableMetadata) -> CatalogResult<String> {
        if base != self.current.as_ref() {
            return Err(CatalogError::CommitFailure {
                message: format!("Cannot commit {}: metadata is not the current version", self.name),
                source: None,
            });
        }

        let pointer_location = self.pointers.load_pointer(&self.name)?.map(|p| p.metadata_location);
        if pointer_location != self.current_location {
            return Err(CatalogError::CommitFailure {
                message: format!(
                    "Cannot commit {}: it was changed concurrently (now at {}), refresh and retry",
                    self.name,
                    pointer_location.as_deref().unwrap_or("<dropped>")
                ),
                source: None,
            });
        }

        let version = self
            .current_location
            .as_deref()
            .and_then(metadata::parse_version)
            .map_or(0, |v| v + 1);
        let location = metadata.metadata_file_location(version);
        metadata::write_metadata(&location, metadata)?;

        if let Err(e) = self.pointers.commit_pointer(
            &self.name,
            metadata,
            self.current_location.as_deref(),
            &location,
            &self.author,
        ) {
            // after a transport failure the pointer may have moved anyway
            if !matches!(e, CatalogError::Transport { .. }) {
                if let Err(cleanup) = metadata::delete_metadata(&location) {
                    warn!("failed to remove unused metadata file {}: {}", location, cleanup);
                }
            }
            return Err(e);
        }

        self.current = Some(metadata.clone());
        self.current_location = Some(location.clone());
        Ok(location)
    }
}

/// Hands out [`TableOperations`] whose commits go through the shared
/// client, authored by the calling identity.
#[derive(Clone)]
pub struct VersionedTableOperationsProvider {
    client: Arc<VersionedCatalogClient>,
}

impl VersionedTableOperationsProvider {
    pub fn new(client: Arc<VersionedCatalogClient>) -> Self {
        Self { client }
    }

    pub fn create_table_operations(&self, identity: &Identity, name: SchemaTableName) -> TableOperations {
        TableOperations::new(self.client.clone(), name, identity.user.clone())
    }
}
