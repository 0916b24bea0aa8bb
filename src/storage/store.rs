//! The interface the catalog uses to talk to a versioned store.

use crate::model::{Branch, CommitMeta, Content, ContentKey, Entry, Namespace, Operation, Reference};
use crate::storage::error::StoreResult;

/// A versioned key-value store of catalog content.
///
/// Reads are made against a resolved [`Reference`]. Writes are made against
/// a [`Branch`] whose hash is the state the writer last saw; if the branch
/// has moved since, the write fails with a conflict and nothing is applied.
pub trait VersionStore: Send + Sync {
    /// The branch the store serves when no reference is named.
    fn default_branch(&self) -> StoreResult<Branch>;

    /// Resolve a branch or tag by name to its current hash.
    fn get_reference(&self, name: &str) -> StoreResult<Reference>;

    /// Every entry visible at `reference`, tables and namespaces alike.
    fn get_entries(&self, reference: &Reference) -> StoreResult<Vec<Entry>>;

    fn get_content(&self, reference: &Reference, key: &ContentKey) -> StoreResult<Option<Content>>;

    fn get_namespaces(&self, ref_name: &str) -> StoreResult<Vec<Namespace>>;

    /// Fails with `NamespaceNotFound` when absent.
    fn get_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<Namespace>;

    /// Create a namespace on the tip of a branch.
    fn create_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<Namespace>;

    /// Delete an empty namespace on the tip of a branch.
    fn delete_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<()>;

    /// Apply `operations` atomically on top of `branch`.
    ///
    /// Returns the branch at its new hash.
    fn commit(&self, branch: &Branch, operations: &[Operation], meta: &CommitMeta) -> StoreResult<Branch>;
}
