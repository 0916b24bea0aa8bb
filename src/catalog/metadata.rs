//! Table metadata files.
//!
//! The store only keeps a pointer per table; the full description of a
//! table lives in a JSON file under `{location}/metadata/`. Every change
//! writes a new file and moves the pointer to it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::{CatalogError, CatalogResult};
use super::schema::Schema;

pub const FORMAT_VERSION: u8 = 2;

/// Metadata file names look like `00003-<id>.metadata.json`.
const METADATA_SUFFIX: &str = ".metadata.json";

/// A table snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub snapshot_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<i64>,
    pub sequence_number: i64,
    pub timestamp_ms: i64,
    pub schema_id: i32,
    #[serde(default)]
    pub summary: BTreeMap<String, String>,
}

/// The content of one metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableMetadata {
    pub format_version: u8,
    pub table_uuid: String,
    pub location: String,
    pub last_sequence_number: i64,
    pub last_updated_ms: i64,
    pub last_column_id: i32,
    pub schemas: Vec<Schema>,
    pub current_schema_id: i32,
    pub default_spec_id: i32,
    pub default_sort_order_id: i32,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_snapshot_id: Option<i64>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

impl TableMetadata {
    /// Metadata for a brand new table: one schema, no snapshots.
    pub fn new(location: impl Into<String>, schema: Schema, properties: BTreeMap<String, String>) -> Self {
        let schema_id = schema.schema_id;
        Self {
            format_version: FORMAT_VERSION,
            table_uuid: ulid::Ulid::new().to_string().to_lowercase(),
            location: location.into(),
            last_sequence_number: 0,
            last_updated_ms: Utc::now().timestamp_millis(),
            last_column_id: schema.highest_field_id(),
            schemas: vec![schema],
            current_schema_id: schema_id,
            default_spec_id: 0,
            default_sort_order_id: 0,
            properties,
            current_snapshot_id: None,
            snapshots: Vec::new(),
        }
    }

    pub fn current_schema(&self) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.schema_id == self.current_schema_id)
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let id = self.current_snapshot_id?;
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }

    /// Append a snapshot and make it current.
    pub fn with_snapshot(mut self, summary: BTreeMap<String, String>) -> Self {
        let now = Utc::now().timestamp_millis();
        let snapshot_id = (ulid::Ulid::new().random() as u64 & i64::MAX as u64) as i64;
        self.last_sequence_number += 1;
        self.snapshots.push(Snapshot {
            snapshot_id,
            parent_snapshot_id: self.current_snapshot_id,
            sequence_number: self.last_sequence_number,
            timestamp_ms: now,
            schema_id: self.current_schema_id,
            summary,
        });
        self.current_snapshot_id = Some(snapshot_id);
        self.last_updated_ms = now;
        self
    }

    /// Add a schema and make it current. Its id is assigned here.
    pub fn with_schema(mut self, mut schema: Schema) -> Self {
        schema.schema_id = self.schemas.iter().map(|s| s.schema_id).max().unwrap_or(-1) + 1;
        self.last_column_id = self.last_column_id.max(schema.highest_field_id());
        self.current_schema_id = schema.schema_id;
        self.schemas.push(schema);
        self.last_updated_ms = Utc::now().timestamp_millis();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self.last_updated_ms = Utc::now().timestamp_millis();
        self
    }

    /// Where the metadata file for `version` of this table goes.
    pub fn metadata_file_location(&self, version: u32) -> String {
        format!(
            "{}/metadata/{:05}-{}{}",
            self.location.trim_end_matches('/'),
            version,
            ulid::Ulid::new().to_string().to_lowercase(),
            METADATA_SUFFIX
        )
    }
}

/// The version number encoded in a metadata file name.
pub fn parse_version(metadata_location: &str) -> Option<u32> {
    let file = metadata_location.rsplit('/').next()?;
    let stem = file.strip_suffix(METADATA_SUFFIX)?;
    let (version, _) = stem.split_once('-')?;
    version.parse().ok()
}

fn local_path(location: &str) -> PathBuf {
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

fn io_error(path: &Path, source: std::io::Error) -> CatalogError {
    CatalogError::MetadataIo {
        path: path.to_path_buf(),
        source,
    }
}

pub fn read_metadata(location: &str) -> CatalogResult<TableMetadata> {
    let path = local_path(location);
    let bytes = fs::read(&path).map_err(|e| io_error(&path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write a new metadata file. Existing files are never overwritten.
pub fn write_metadata(location: &str, metadata: &TableMetadata) -> CatalogResult<()> {
    let path = local_path(location);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let bytes = serde_json::to_vec_pretty(metadata)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| io_error(&path, e))?;
    std::io::Write::write_all(&mut file, &bytes).map_err(|e| io_error(&path, e))
}

pub fn delete_metadata(location: &str) -> CatalogResult<()> {
    let path = local_path(location);
    fs::remove_file(&path).map_err(|e| io_error(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::SchemaBuilder;
    use crate::catalog::types::DataType;

    fn sample() -> TableMetadata {
        let schema = SchemaBuilder::new()
            .add_required_column("id", DataType::Long)
            .add_column("name", DataType::String)
            .build()
            .unwrap();
        TableMetadata::new("/w/s.db/t", schema, BTreeMap::new())
    }

    #[test]
    fn test_new_table_has_no_snapshot() {
        let metadata = sample();
        assert_eq!(metadata.current_snapshot_id, None);
        assert_eq!(metadata.last_column_id, 2);
        assert_eq!(metadata.current_schema().unwrap().fields.len(), 2);
    }

    #[test]
    fn test_snapshots_chain() {
        let metadata = sample().with_snapshot(BTreeMap::new());
        let first = metadata.current_snapshot_id.unwrap();
        assert!(first >= 0);

        let metadata = metadata.with_snapshot(BTreeMap::new());
        let second = metadata.current_snapshot().unwrap();
        assert_eq!(second.parent_snapshot_id, Some(first));
        assert_eq!(second.sequence_number, 2);
    }

    #[test]
    fn test_schema_evolution() {
        let metadata = sample();
        let wider = SchemaBuilder::new()
            .add_required_column("id", DataType::Long)
            .add_column("name", DataType::String)
            .add_column("email", DataType::String)
            .build()
            .unwrap();
        let metadata = metadata.with_schema(wider);
        assert_eq!(metadata.current_schema_id, 1);
        assert_eq!(metadata.schemas.len(), 2);
        assert_eq!(metadata.last_column_id, 3);
    }

    #[test]
    fn test_metadata_file_names() {
        let metadata = sample();
        let location = metadata.metadata_file_location(3);
        assert!(location.starts_with("/w/s.db/t/metadata/00003-"));
        assert!(location.ends_with(".metadata.json"));
        assert_eq!(parse_version(&location), Some(3));
        assert_eq!(parse_version("/w/t/metadata/garbage.json"), None);
    }

    #[test]
    fn test_write_read_delete() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let metadata = TableMetadata::new(format!("{}/t", root), sample().schemas[0].clone(), BTreeMap::new());
        let location = metadata.metadata_file_location(0);

        write_metadata(&location, &metadata).unwrap();
        assert_eq!(read_metadata(&location).unwrap(), metadata);

        // never overwrite
        assert!(matches!(
            write_metadata(&location, &metadata),
            Err(CatalogError::MetadataIo { .. })
        ));

        delete_metadata(&location).unwrap();
        assert!(read_metadata(&location).is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["format-version"], 2);
        assert_eq!(json["current-schema-id"], 0);
        assert!(json.get("current-snapshot-id").is_none());
    }
}
