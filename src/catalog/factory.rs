//! Catalog factory: wires one shared client into per-request catalogs.

use std::sync::Arc;

use log::info;

use super::client::VersionedCatalogClient;
use super::error::{CatalogError, CatalogResult};
use super::operations::VersionedTableOperationsProvider;
use super::versioned::VersionedCatalog;
use crate::config::CatalogConfig;
use crate::storage::GitVersionStore;

/// The user a catalog acts for. Commits are authored by `user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
}

impl Identity {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

/// Creates catalogs bound to one client and one set of settings.
#[derive(Clone)]
pub struct CatalogFactory {
    client: Arc<VersionedCatalogClient>,
    provider: VersionedTableOperationsProvider,
    warehouse: String,
    node_version: String,
    unique_table_location: bool,
}

impl CatalogFactory {
    /// Settings are read from the client's configuration once, here.
    pub fn new(client: Arc<VersionedCatalogClient>) -> Self {
        let config = client.config();
        let warehouse = config.warehouse_root().to_string();
        let node_version = config.node_version.clone();
        let unique_table_location = config.unique_table_location;
        Self {
            provider: VersionedTableOperationsProvider::new(client.clone()),
            client,
            warehouse,
            node_version,
            unique_table_location,
        }
    }

    /// Open (or create) the Git store the configuration points at and
    /// build a factory over it.
    pub fn from_config(config: CatalogConfig) -> CatalogResult<Self> {
        let path = config.repository_path();
        let store = GitVersionStore::open_or_init(&path).map_err(|e| {
            CatalogError::transport(format!("Cannot open version store at {}", path.display()), e)
        })?;
        info!("catalog store at {}, warehouse {}", path.display(), config.warehouse);

        let client = VersionedCatalogClient::new(Arc::new(store), config);
        Ok(Self::new(Arc::new(client)))
    }

    /// A catalog for one request. Does no I/O.
    pub fn create(&self, identity: Identity) -> VersionedCatalog {
        VersionedCatalog::new(
            self.client.clone(),
            self.provider.clone(),
            identity,
            self.warehouse.clone(),
            self.node_version.clone(),
            self.unique_table_location,
        )
    }

    pub fn client(&self) -> &Arc<VersionedCatalogClient> {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_initializes_store() {
        let dir = TempDir::new().unwrap();
        let uri = format!("file://{}", dir.path().join("repo").display());
        let factory = CatalogFactory::from_config(CatalogConfig::new(uri, "/w/")).unwrap();

        assert!(dir.path().join("repo/.git").exists());
        assert_eq!(factory.client().reference().unwrap().name(), "main");
    }

    #[test]
    fn test_catalogs_share_the_client() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig::new(dir.path().to_string_lossy(), "/w")
            .with_unique_table_location(true)
            .with_node_version("9.9");
        let factory = CatalogFactory::from_config(config).unwrap();

        let alice = factory.create(Identity::new("alice"));
        let bob = factory.create(Identity::new("bob"));
        alice.create_namespace("s", &Default::default()).unwrap();
        assert_eq!(bob.list_namespaces().unwrap(), vec!["s".to_string()]);

        assert_eq!(alice.identity().user, "alice");
        assert!(std::ptr::eq(
            alice.client().reference().unwrap(),
            bob.client().reference().unwrap()
        ));
    }

    #[test]
    fn test_settings_are_copied_at_construction() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig::new(dir.path().to_string_lossy(), "/w/")
            .with_unique_table_location(true)
            .with_node_version("9.9");
        let factory = CatalogFactory::from_config(config).unwrap();

        assert_eq!(factory.warehouse, "/w");
        assert_eq!(factory.node_version, "9.9");
        assert!(factory.unique_table_location);
    }
}
