//! gitcat - a Git-backed versioned table catalog
//!
//! Tables and namespaces live as entries in a Git repository: every
//! catalog change is a commit on a branch, and a branch can be read at any
//! of its past hashes. Writers commit optimistically against the hash they
//! last saw and retry structural changes when the branch has moved.
//!
//! # Example
//!
//! ```no_run
//! use gitcat::catalog::{CatalogFactory, Identity, SchemaBuilder, DataType};
//! use gitcat::config::CatalogConfig;
//! use gitcat::model::SchemaTableName;
//!
//! let config = CatalogConfig::new("./catalog-repo", "./warehouse");
//! let factory = CatalogFactory::from_config(config).unwrap();
//! let catalog = factory.create(Identity::new("alice"));
//!
//! catalog.create_namespace("tpch", &Default::default()).unwrap();
//! let schema = SchemaBuilder::new().add_required_column("id", DataType::Long).build().unwrap();
//! catalog
//!     .create_table(&SchemaTableName::new("tpch", "orders"), schema, None, Default::default())
//!     .unwrap();
//! ```

pub mod catalog;
pub mod config;
pub mod model;
pub mod shell;
pub mod sql;
pub mod storage;
