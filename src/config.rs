//! Catalog configuration.
//!
//! Settings can come from a JSON file, from a flat property map using the
//! connector property names (`iceberg.nessie.uri` and friends), or be set
//! directly with the builder methods.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const URI_PROPERTY: &str = "iceberg.nessie.uri";
pub const REF_PROPERTY: &str = "iceberg.nessie.ref";
pub const WAREHOUSE_PROPERTY: &str = "iceberg.nessie.warehouse";
pub const UNIQUE_TABLE_LOCATION_PROPERTY: &str = "iceberg.unique-table-location";

/// Configuration shared by every catalog created from one factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Location of the versioned store. A plain path or a `file://` URI.
    pub uri: String,

    /// Reference to work on. `None` means the store's default branch.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Root directory under which table data and metadata are placed.
    pub warehouse: String,

    /// Append a random suffix to every default table location.
    #[serde(default)]
    pub unique_table_location: bool,

    /// Version string of the engine, recorded on tables it creates.
    #[serde(default = "default_node_version")]
    pub node_version: String,
}

fn default_node_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl CatalogConfig {
    pub fn new(uri: impl Into<String>, warehouse: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            reference: None,
            warehouse: warehouse.into(),
            unique_table_location: false,
            node_version: default_node_version(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_unique_table_location(mut self, unique: bool) -> Self {
        self.unique_table_location = unique;
        self
    }

    pub fn with_node_version(mut self, version: impl Into<String>) -> Self {
        self.node_version = version.into();
        self
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Build from connector-style properties. Unknown keys are ignored.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| properties.get(key).map(|v| v.trim().to_string());

        let unique_table_location = match get(UNIQUE_TABLE_LOCATION_PROPERTY) {
            None => false,
            Some(value) => value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                key: UNIQUE_TABLE_LOCATION_PROPERTY.to_string(),
                value,
            })?,
        };

        let config = Self {
            uri: get(URI_PROPERTY).unwrap_or_default(),
            reference: get(REF_PROPERTY).filter(|r| !r.is_empty()),
            warehouse: get(WAREHOUSE_PROPERTY).unwrap_or_default(),
            unique_table_location,
            node_version: default_node_version(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.trim().is_empty() {
            return Err(ConfigError::Missing(URI_PROPERTY));
        }
        if self.warehouse.trim().is_empty() {
            return Err(ConfigError::Missing(WAREHOUSE_PROPERTY));
        }
        if matches!(&self.reference, Some(r) if r.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: REF_PROPERTY.to_string(),
                value: String::new(),
            });
        }
        Ok(())
    }

    /// Filesystem path of the store named by `uri`.
    pub fn repository_path(&self) -> PathBuf {
        PathBuf::from(self.uri.strip_prefix("file://").unwrap_or(&self.uri))
    }

    /// Warehouse root without a trailing slash.
    pub fn warehouse_root(&self) -> &str {
        let trimmed = self.warehouse.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required property: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}
