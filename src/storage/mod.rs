//! versioned storage layer for gitcat
//!
//! The catalog talks to a [`VersionStore`]: named references over a
//! key-value space of tables and namespaces, with optimistic multi-key
//! commits. [`GitVersionStore`] implements it on a Git repository; the
//! catalog layer above never touches git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GitVersionStore                         │
//! │  (VersionStore: references, entries, namespaces, commits)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │    blob     │       │    refs     │
//!  │  (keys)     │       │  (content)  │       │ (branches)  │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        │  (history)  │
//!                        └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use gitcat::model::{CommitMeta, Namespace, Operation};
//! use gitcat::storage::{GitVersionStore, VersionStore};
//!
//! let store = GitVersionStore::open_or_init("./catalog")?;
//! store.create_namespace("main", &Namespace::parse("sales")?)?;
//!
//! let main = store.default_branch()?;
//! let main = store.commit(&main, &[Operation::put(key, content)], &CommitMeta::new("alice", "add t"))?;
//! ```

mod blob;
mod commit;
mod error;
mod refs;
mod repository;
mod store;
mod tree;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use commit::CommitInfo;
pub use error::{StoreResult, VersionStoreError};
pub use repository::GitVersionStore;
pub use store::VersionStore;
pub use types::{GitSignature, RefName};
