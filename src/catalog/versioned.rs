//! The catalog one request works through.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use super::client::VersionedCatalogClient;
use super::error::{CatalogError, CatalogResult};
use super::factory::Identity;
use super::metadata::{self, TableMetadata};
use super::operations::{TableOperations, VersionedTableOperationsProvider};
use super::schema::Schema;
use crate::model::{Namespace, Reference, SchemaTableName};

/// Table property recording the engine version that created a table.
pub const ENGINE_VERSION_PROPERTY: &str = "engine.version";

/// A loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: SchemaTableName,
    pub metadata_location: String,
    pub metadata: TableMetadata,
}

/// Catalog for one identity. Cheap to create; all state that matters lives
/// in the shared client.
pub struct VersionedCatalog {
    client: Arc<VersionedCatalogClient>,
    provider: VersionedTableOperationsProvider,
    identity: Identity,
    warehouse: String,
    node_version: String,
    unique_table_location: bool,
}

impl VersionedCatalog {
    pub fn new(
        client: Arc<VersionedCatalogClient>,
        provider: VersionedTableOperationsProvider,
        identity: Identity,
        warehouse: String,
        node_version: String,
        unique_table_location: bool,
    ) -> Self {
        Self {
            client,
            provider,
            identity,
            warehouse,
            node_version,
            unique_table_location,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn client(&self) -> &Arc<VersionedCatalogClient> {
        &self.client
    }

    /// The reference reads and writes currently go to.
    pub fn current_reference(&self) -> CatalogResult<Reference> {
        Ok(self.client.reference()?.reference())
    }

    // namespaces

    pub fn list_namespaces(&self) -> CatalogResult<Vec<String>> {
        Ok(self
            .client
            .list_namespaces()?
            .iter()
            .map(Namespace::name)
            .collect())
    }

    /// Namespaces cannot carry properties.
    pub fn create_namespace(&self, name: &str, properties: &BTreeMap<String, String>) -> CatalogResult<()> {
        if !properties.is_empty() {
            return Err(CatalogError::NotSupported(
                "namespace properties are not stored".to_string(),
            ));
        }
        self.client.create_namespace(&Namespace::parse(name)?)
    }

    pub fn drop_namespace(&self, name: &str) -> CatalogResult<()> {
        self.client.drop_namespace(&Namespace::parse(name)?)
    }

    pub fn load_namespace_metadata(&self, name: &str) -> CatalogResult<BTreeMap<String, String>> {
        self.client.load_namespace_metadata(&Namespace::parse(name)?)
    }

    pub fn rename_namespace(&self, from: &str, to: &str) -> CatalogResult<()> {
        Err(CatalogError::NotSupported(format!(
            "cannot rename namespace {} to {}",
            from, to
        )))
    }

    // tables

    pub fn list_tables(&self, namespace: Option<&str>) -> CatalogResult<Vec<SchemaTableName>> {
        let namespace = namespace.map(Namespace::parse).transpose()?;
        self.client.list_tables(namespace.as_ref())
    }

    /// Reads at the latest state of the reference.
    pub fn load_table(&self, name: &SchemaTableName) -> CatalogResult<Table> {
        self.client.refresh_reference()?;
        let pointer = self
            .client
            .load_table(name)?
            .ok_or_else(|| CatalogError::TableNotFound(name.clone()))?;
        let metadata = metadata::read_metadata(&pointer.metadata_location)?;
        Ok(Table {
            name: name.clone(),
            metadata_location: pointer.metadata_location,
            metadata,
        })
    }

    /// Create a table with `schema`, writing its first metadata file under
    /// `location` (or the default location) and committing the pointer.
    pub fn create_table(
        &self,
        name: &SchemaTableName,
        schema: Schema,
        location: Option<String>,
        mut properties: BTreeMap<String, String>,
    ) -> CatalogResult<Table> {
        schema.validate()?;
        self.client.refresh_reference()?;
        self.client
            .load_namespace_metadata(&Namespace::parse(&name.schema)?)?;
        if self.client.load_table(name)?.is_some() {
            return Err(CatalogError::TableAlreadyExists(name.clone()));
        }

        let location = location.unwrap_or_else(|| self.default_table_location(name));
        properties
            .entry(ENGINE_VERSION_PROPERTY.to_string())
            .or_insert_with(|| self.node_version.clone());
        let metadata = TableMetadata::new(location, schema, properties);

        let mut ops = self.new_table_operations(name);
        let metadata_location = ops.commit(None, &metadata)?;
        info!("{} created table {} at {}", self.identity.user, name, metadata.location);

        Ok(Table {
            name: name.clone(),
            metadata_location,
            metadata,
        })
    }

    /// Fails with `TableNotFound` when there is nothing to drop.
    pub fn drop_table(&self, name: &SchemaTableName) -> CatalogResult<()> {
        if self.client.drop_table(name, &self.identity.user)? {
            Ok(())
        } else {
            Err(CatalogError::TableNotFound(name.clone()))
        }
    }

    pub fn rename_table(&self, from: &SchemaTableName, to: &SchemaTableName) -> CatalogResult<()> {
        self.client.rename_table(from, to, &self.identity.user)
    }

    pub fn new_table_operations(&self, name: &SchemaTableName) -> TableOperations {
        self.provider.create_table_operations(&self.identity, name.clone())
    }

    pub fn create_view(&self, name: &SchemaTableName, _sql: &str) -> CatalogResult<()> {
        Err(CatalogError::NotSupported(format!("views ({})", name)))
    }

    /// `{warehouse}/{schema}.db/{table}`, with a random suffix on the table
    /// directory when unique locations are on.
    pub fn default_table_location(&self, name: &SchemaTableName) -> String {
        let mut table_dir = name.table.clone();
        if self.unique_table_location {
            table_dir.push('-');
            table_dir.push_str(&ulid::Ulid::new().to_string().to_lowercase());
        }
        format!("{}/{}.db/{}", self.warehouse, name.schema, table_dir)
    }
}
