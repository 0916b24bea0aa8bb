//! Catalog client over a versioned store.
//!
//! The client owns one [`ReferenceHandle`] and turns catalog requests into
//! reads at that reference or commits against it. Store errors are caught
//! here and re-raised as [`CatalogError`]s naming the operation, the
//! reference and the key involved.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use once_cell::sync::OnceCell;

use super::error::{CatalogError, CatalogResult};
use super::metadata::TableMetadata;
use super::reference::ReferenceHandle;
use super::retry::{CommitAbort, RetryPolicy};
use crate::config::CatalogConfig;
use crate::model::{
    CommitMeta, Content, ContentKey, ContentType, IcebergTable, Namespace, Operation, Reference,
    SchemaTableName,
};
use crate::storage::{VersionStore, VersionStoreError};

/// A catalog client shared by every catalog a factory hands out.
pub struct VersionedCatalogClient {
    store: Arc<dyn VersionStore>,
    config: CatalogConfig,
    reference: OnceCell<ReferenceHandle>,
    retry: RetryPolicy,
}

impl VersionedCatalogClient {
    /// The reference is resolved lazily, on first use.
    pub fn new(store: Arc<dyn VersionStore>, config: CatalogConfig) -> Self {
        Self {
            store,
            config,
            reference: OnceCell::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use an already loaded handle, e.g. one pinned to a hash.
    pub fn with_reference(mut self, handle: ReferenceHandle) -> Self {
        self.reference = OnceCell::with_value(handle);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The handle every operation of this client goes through.
    pub fn reference(&self) -> CatalogResult<&ReferenceHandle> {
        self.reference.get_or_try_init(|| {
            ReferenceHandle::load(self.store.as_ref(), self.config.reference.as_deref(), None)
        })
    }

    pub fn refresh_reference(&self) -> CatalogResult<bool> {
        self.reference()?.refresh(self.store.as_ref())
    }

    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Tables visible at the current reference, optionally only those
    /// directly inside `namespace`.
    pub fn list_tables(&self, namespace: Option<&Namespace>) -> CatalogResult<Vec<SchemaTableName>> {
        let handle = self.reference()?;
        let reference = handle.reference();
        let entries = self.store.get_entries(&reference).map_err(|e| {
            read_error(
                format!("Cannot list tables: ref '{}' is no longer valid", reference.name()),
                e,
            )
        })?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.content_type == ContentType::IcebergTable)
            .filter(|entry| namespace.map_or(true, |ns| entry.key.namespace() == *ns))
            .map(|entry| entry.key.to_table_name())
            .collect())
    }

    /// The pointer stored for `name`, or `None` when there is none to load.
    pub fn load_table(&self, name: &SchemaTableName) -> CatalogResult<Option<IcebergTable>> {
        let key = ContentKey::from_table(name)?;
        let reference = self.reference()?.reference();
        match self.store.get_content(&reference, &key) {
            Ok(content) => Ok(content.and_then(Content::into_table)),
            Err(e) if e.is_not_found() => {
                debug!("{} not loadable at {}: {}", name, reference, e);
                Ok(None)
            }
            Err(e) => Err(read_error(format!("Cannot load table '{}'", name), e)),
        }
    }

    pub fn list_namespaces(&self) -> CatalogResult<Vec<Namespace>> {
        let name = self.reference()?.name();
        self.store.get_namespaces(&name).map_err(|e| {
            read_error("Cannot list Namespaces: ref is no longer valid", e)
        })
    }

    pub fn create_namespace(&self, namespace: &Namespace) -> CatalogResult<()> {
        let handle = self.reference()?;
        handle.check_mutable()?;

        let _guard = handle.lock_commits();
        self.store
            .create_namespace(&handle.name(), namespace)
            .map_err(|e| namespace_error("create", namespace, e))?;
        handle.refresh(self.store.as_ref())?;
        Ok(())
    }

    pub fn drop_namespace(&self, namespace: &Namespace) -> CatalogResult<()> {
        let handle = self.reference()?;
        handle.check_mutable()?;

        let _guard = handle.lock_commits();
        self.store
            .delete_namespace(&handle.name(), namespace)
            .map_err(|e| namespace_error("drop", namespace, e))?;
        handle.refresh(self.store.as_ref())?;
        Ok(())
    }

    /// Namespaces carry no properties; this only checks that it exists.
    pub fn load_namespace_metadata(&self, namespace: &Namespace) -> CatalogResult<BTreeMap<String, String>> {
        let name = self.reference()?.name();
        self.store
            .get_namespace(&name, namespace)
            .map_err(|e| namespace_error("load", namespace, e))?;
        Ok(BTreeMap::new())
    }

    /// Remove the pointer for `name`.
    ///
    /// Returns `false` without committing when there is no such table.
    pub fn drop_table(&self, name: &SchemaTableName, author: &str) -> CatalogResult<bool> {
        let handle = self.reference()?;
        handle.check_mutable()?;

        let _guard = handle.lock_commits();
        if self.load_table(name)?.is_none() {
            debug!("drop of missing table {} is a no-op", name);
            return Ok(false);
        }

        let key = ContentKey::from_table(name)?;
        let meta = CommitMeta::new(author, format!("Iceberg delete table {}", name));

        let delete = || -> CatalogResult<Vec<Operation>> {
            Ok(vec![Operation::delete(key.clone())])
        };
        self.commit_with_retry(handle, &meta, delete).map_err(|abort| match abort {
            CommitAbort::Catalog(e) => e,
            CommitAbort::Store(e) if e.is_conflict() => CatalogError::commit(
                format!(
                    "Cannot drop table '{}': failed after retry (update ref '{}' and retry)",
                    name,
                    handle.name()
                ),
                e,
            ),
            CommitAbort::Store(e) if e.is_not_found() => CatalogError::commit(
                format!("Cannot drop table '{}': ref '{}' no longer exists", name, handle.name()),
                e,
            ),
            CommitAbort::Store(e) => {
                CatalogError::commit(format!("Cannot drop table '{}': unknown error", name), e)
            }
        })?;

        info!("dropped table {} on {}", name, handle.reference());
        Ok(true)
    }

    /// Move the pointer of `from` to `to`, unchanged, in one commit.
    pub fn rename_table(&self, from: &SchemaTableName, to: &SchemaTableName, author: &str) -> CatalogResult<()> {
        let handle = self.reference()?;
        handle.check_mutable()?;

        let _guard = handle.lock_commits();
        let from_key = ContentKey::from_table(from)?;
        let to_key = ContentKey::from_table(to)?;
        let meta = CommitMeta::new(
            author,
            format!("Iceberg rename table from '{}' to '{}'", from, to),
        );

        // read both sides at the hash each attempt commits against, so a
        // retry carries whatever `from` points at now
        let rename = || -> CatalogResult<Vec<Operation>> {
            let existing = self
                .load_table(from)?
                .ok_or_else(|| CatalogError::TableNotFound(from.clone()))?;
            if self.load_table(to)?.is_some() {
                return Err(CatalogError::LookupFailure {
                    message: format!("Table '{}' already exists", to.table),
                    source: None,
                });
            }
            Ok(vec![
                Operation::put(to_key.clone(), Content::IcebergTable(existing)),
                Operation::delete(from_key.clone()),
            ])
        };

        self.commit_with_retry(handle, &meta, rename).map_err(|abort| match abort {
            CommitAbort::Catalog(e) => e,
            CommitAbort::Store(VersionStoreError::NamespaceNotFound(_)) => {
                CatalogError::SchemaNotFound(to.schema.clone())
            }
            CommitAbort::Store(e) if e.is_not_found() => CatalogError::commit(
                format!(
                    "Cannot rename table '{}' to '{}': ref '{}' no longer exists",
                    from.table,
                    to.table,
                    handle.name()
                ),
                e,
            ),
            CommitAbort::Store(e) if e.is_transport() => CatalogError::transport(
                format!("Cannot rename table '{}' to '{}'", from, to),
                e,
            ),
            CommitAbort::Store(e) => CatalogError::commit(
                format!(
                    "Cannot rename table '{}' to '{}': ref '{}' is not up to date",
                    from.table,
                    to.table,
                    handle.name()
                ),
                e,
            ),
        })?;

        info!("renamed table {} to {} on {}", from, to, handle.reference());
        Ok(())
    }

    /// Point `name` at `metadata_location` in a single commit against the
    /// hash the handle holds. Not retried: a conflict means the metadata was
    /// built from a state that is no longer current.
    pub fn commit_table(
        &self,
        metadata: &TableMetadata,
        name: &SchemaTableName,
        metadata_location: &str,
        author: &str,
    ) -> CatalogResult<()> {
        self.commit_table_pointer(metadata, name, None, metadata_location, author)
    }

    /// Like [`commit_table`](Self::commit_table), but only if `name` still
    /// points at `previous_location` (`None`: the table must not exist yet).
    /// The check runs under the commit lock, so of two writers that started
    /// from the same pointer only the first one lands.
    pub fn replace_table(
        &self,
        metadata: &TableMetadata,
        name: &SchemaTableName,
        previous_location: Option<&str>,
        metadata_location: &str,
        author: &str,
    ) -> CatalogResult<()> {
        self.commit_table_pointer(metadata, name, Some(previous_location), metadata_location, author)
    }

    fn commit_table_pointer(
        &self,
        metadata: &TableMetadata,
        name: &SchemaTableName,
        expected: Option<Option<&str>>,
        metadata_location: &str,
        author: &str,
    ) -> CatalogResult<()> {
        let handle = self.reference()?;
        handle.check_mutable()?;

        let key = ContentKey::from_table(name)?;
        let snapshot_id = metadata.current_snapshot().map_or(-1, |s| s.snapshot_id);
        let mut table = IcebergTable::new(
            metadata_location,
            snapshot_id,
            metadata.current_schema_id,
            metadata.default_spec_id,
            metadata.default_sort_order_id,
        );

        let _guard = handle.lock_commits();
        let existing = self.load_table(name)?;
        if let Some(expected) = expected {
            let current = existing.as_ref().map(|t| t.metadata_location.as_str());
            if current != expected {
                return Err(CatalogError::CommitFailure {
                    message: format!(
                        "Cannot commit {}: it was changed concurrently (now at {}), refresh and retry",
                        name,
                        current.unwrap_or("<dropped>")
                    ),
                    source: None,
                });
            }
        }
        if let Some(existing) = existing {
            table = table.with_id(existing.id);
        }

        let branch = handle.as_branch()?;
        let meta = CommitMeta::new(author, format!("Iceberg add table {}", name));
        let operations = [Operation::put(key, Content::IcebergTable(table))];
        let committed = self
            .store
            .commit(&branch, &operations, &meta)
            .map_err(|e| match e {
                e if e.is_conflict() => CatalogError::commit(
                    format!(
                        "Cannot commit: ref hash is out of date. Update the ref '{}' and try again",
                        branch.name()
                    ),
                    e,
                ),
                e if e.is_reference_not_found() => CatalogError::commit(
                    format!("Cannot commit: ref '{}' no longer exists", branch.name()),
                    e,
                ),
                VersionStoreError::NamespaceNotFound(_) => {
                    CatalogError::SchemaNotFound(name.schema.clone())
                }
                VersionStoreError::NotABranch(n) => CatalogError::NotABranch(n),
                e if e.is_transport() => {
                    CatalogError::transport(format!("Cannot commit table '{}'", name), e)
                }
                e => CatalogError::commit(format!("Cannot commit table '{}': unknown error", name), e),
            })?;

        handle.update(Reference::Branch(committed))?;
        info!("committed table {} at {} on {}", name, metadata_location, handle.reference());
        Ok(())
    }

    /// Commit against the handle's branch, refreshing on conflicts.
    /// `operations` is called once per attempt, after any refresh, so it
    /// sees the state the attempt commits against. Callers hold the commit
    /// lock.
    fn commit_with_retry(
        &self,
        handle: &ReferenceHandle,
        meta: &CommitMeta,
        mut operations: impl FnMut() -> CatalogResult<Vec<Operation>>,
    ) -> Result<(), CommitAbort> {
        self.retry.run(
            |attempt| {
                let branch = handle.as_branch()?;
                let ops = operations()?;
                debug!("commit attempt {} on {}", attempt, Reference::Branch(branch.clone()));
                let committed = self.store.commit(&branch, &ops, meta)?;
                handle.update(Reference::Branch(committed))?;
                Ok(())
            },
            || handle.refresh(self.store.as_ref()).map(|_| ()),
        )
    }
}

/// Map a failed read: transport problems keep their own class, everything
/// else is a lookup failure.
fn read_error(message: impl Into<String>, e: VersionStoreError) -> CatalogError {
    if e.is_transport() {
        CatalogError::transport(message, e)
    } else {
        CatalogError::lookup(message, e)
    }
}

fn namespace_error(op: &str, namespace: &Namespace, e: VersionStoreError) -> CatalogError {
    match e {
        VersionStoreError::NamespaceAlreadyExists(_) => {
            CatalogError::SchemaAlreadyExists(namespace.name())
        }
        VersionStoreError::NamespaceNotFound(_) => CatalogError::SchemaNotFound(namespace.name()),
        e @ VersionStoreError::NamespaceNotEmpty { .. } => CatalogError::lookup(
            format!("Namespace '{}' is not empty. One or more tables exist", namespace),
            e,
        ),
        VersionStoreError::NotABranch(name) => CatalogError::NotABranch(name),
        e if e.is_reference_not_found() => CatalogError::lookup(
            format!("Cannot {} Namespace '{}': ref is no longer valid", op, namespace),
            e,
        ),
        e if e.is_conflict() => CatalogError::commit(
            format!("Cannot {} Namespace '{}': ref moved concurrently", op, namespace),
            e,
        ),
        e => read_error(format!("Cannot {} Namespace '{}'", op, namespace), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::retry::MAX_COMMIT_ATTEMPTS;
    use crate::catalog::schema::SchemaBuilder;
    use crate::catalog::types::DataType;
    use crate::model::Hash;
    use crate::storage::testing::{advance_branch, ScriptedStore};
    use crate::storage::GitVersionStore;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitVersionStore) {
        let dir = TempDir::new().unwrap();
        let store = GitVersionStore::init(dir.path()).unwrap();
        (dir, store)
    }

    fn client_over(store: Arc<dyn VersionStore>) -> VersionedCatalogClient {
        VersionedCatalogClient::new(store, CatalogConfig::new("unused", "/tmp/warehouse"))
    }

    fn metadata() -> TableMetadata {
        let schema = SchemaBuilder::new().add_column("id", DataType::Long).build().unwrap();
        TableMetadata::new("/tmp/warehouse/s.db/t", schema, BTreeMap::new())
    }

    fn name(schema: &str, table: &str) -> SchemaTableName {
        SchemaTableName::new(schema, table)
    }

    fn ns(name: &str) -> Namespace {
        Namespace::parse(name).unwrap()
    }

    /// A namespace `s` holding table `s.t`.
    fn with_table(store: &GitVersionStore) {
        let client = client_over(Arc::new(store.clone()));
        client.create_namespace(&ns("s")).unwrap();
        client
            .commit_table(&metadata(), &name("s", "t"), "/m/00000-a.metadata.json", "alice")
            .unwrap();
    }

    fn main_hash(store: &GitVersionStore) -> Hash {
        store.default_branch().unwrap().hash().clone()
    }

    #[test]
    fn test_reference_is_created_once() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store.clone()));

        let first = client.reference().unwrap() as *const ReferenceHandle;
        let second = client.reference().unwrap() as *const ReferenceHandle;
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_configured_reference() {
        let (_dir, store) = setup();
        let client = VersionedCatalogClient::new(
            Arc::new(store),
            CatalogConfig::new("unused", "/w").with_reference("nope"),
        );
        assert!(matches!(client.list_tables(None), Err(CatalogError::LookupFailure { .. })));
    }

    #[test]
    fn test_load_absent_table_is_none() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store.clone()));

        assert_eq!(client.load_table(&name("s", "missing")).unwrap(), None);
        client.create_namespace(&ns("s")).unwrap();
        assert_eq!(client.load_table(&name("s", "missing")).unwrap(), None);
        // a namespace is not a table
        assert_eq!(client.load_table(&name("s", "s")).unwrap(), None);
    }

    #[test]
    fn test_load_table_after_branch_deleted_is_none() {
        let (_dir, store) = setup();
        let main = Reference::Branch(store.default_branch().unwrap());
        store.create_branch("dev", &main).unwrap();

        let client = VersionedCatalogClient::new(
            Arc::new(store.clone()),
            CatalogConfig::new("unused", "/w").with_reference("dev"),
        );
        client.reference().unwrap();
        store.delete_branch("dev").unwrap();

        assert_eq!(client.load_table(&name("s", "t")).unwrap(), None);
    }

    #[test]
    fn test_commit_then_load() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store.clone()));

        let table = client.load_table(&name("s", "t")).unwrap().unwrap();
        assert_eq!(table.snapshot_id, -1);
        assert_eq!(table.metadata_location, "/m/00000-a.metadata.json");

        let next = metadata().with_snapshot(BTreeMap::new());
        let snapshot_id = next.current_snapshot_id.unwrap();
        client
            .commit_table(&next, &name("s", "t"), "/m/00001-b.metadata.json", "bob")
            .unwrap();

        let updated = client.load_table(&name("s", "t")).unwrap().unwrap();
        assert_eq!(updated.snapshot_id, snapshot_id);
        assert_eq!(updated.metadata_location, "/m/00001-b.metadata.json");
        assert_eq!(updated.id, table.id);
    }

    #[test]
    fn test_commit_table_advances_handle() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store.clone()));
        client.create_namespace(&ns("s")).unwrap();

        let before = client.reference().unwrap().hash();
        client
            .commit_table(&metadata(), &name("s", "t"), "/m/00000-a.metadata.json", "alice")
            .unwrap();
        let after = client.reference().unwrap().hash();
        assert_ne!(before, after);
        assert_eq!(after, main_hash(&store));
    }

    #[test]
    fn test_commit_table_stale_hash_is_not_retried() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store.clone()));
        client.create_namespace(&ns("s")).unwrap();

        advance_branch(&store, "main", 1);
        let err = client
            .commit_table(&metadata(), &name("s", "t"), "/m/00000-a.metadata.json", "alice")
            .unwrap_err();
        match err {
            CatalogError::CommitFailure { message, .. } => {
                assert!(message.contains("out of date"), "{}", message)
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(client_over(Arc::new(store)).load_table(&name("s", "t")).unwrap(), None);
    }

    #[test]
    fn test_commit_table_missing_schema() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store));
        assert!(matches!(
            client.commit_table(&metadata(), &name("nope", "t"), "/m/x", "alice"),
            Err(CatalogError::SchemaNotFound(s)) if s == "nope"
        ));
    }

    #[test]
    fn test_list_tables_filters() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store.clone()));
        client.create_namespace(&ns("s.inner")).unwrap();
        client.create_namespace(&ns("u")).unwrap();
        client
            .commit_table(&metadata(), &name("s.inner", "deep"), "/m/x", "alice")
            .unwrap();
        client.commit_table(&metadata(), &name("u", "v"), "/m/y", "alice").unwrap();

        let mut all = client.list_tables(None).unwrap();
        all.sort();
        assert_eq!(all, vec![name("s", "t"), name("s.inner", "deep"), name("u", "v")]);

        assert_eq!(client.list_tables(Some(&ns("s"))).unwrap(), vec![name("s", "t")]);
        assert!(client.list_tables(Some(&ns("missing"))).unwrap().is_empty());
    }

    #[test]
    fn test_drop_missing_table_is_noop() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store.clone()));
        client.create_namespace(&ns("s")).unwrap();

        let before = main_hash(&store);
        assert!(!client.drop_table(&name("s", "gone"), "alice").unwrap());
        assert_eq!(main_hash(&store), before);
    }

    #[test]
    fn test_drop_table() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store.clone()));

        assert!(client.drop_table(&name("s", "t"), "alice").unwrap());
        assert_eq!(client.load_table(&name("s", "t")).unwrap(), None);
        assert_eq!(client.reference().unwrap().hash(), main_hash(&store));

        let commits = store.history("main", Some(1)).unwrap();
        assert_eq!(commits[0].message, "Iceberg delete table s.t");
        assert_eq!(commits[0].author_name, "alice");
    }

    #[test]
    fn test_rename_table() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store.clone()));
        let original = client.load_table(&name("s", "t")).unwrap().unwrap();

        client.rename_table(&name("s", "t"), &name("s", "u"), "alice").unwrap();
        assert_eq!(client.load_table(&name("s", "t")).unwrap(), None);
        assert_eq!(client.load_table(&name("s", "u")).unwrap(), Some(original));
    }

    #[test]
    fn test_rename_onto_existing_changes_nothing() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store.clone()));
        client.commit_table(&metadata(), &name("s", "u"), "/m/u", "alice").unwrap();

        let before = main_hash(&store);
        let err = client.rename_table(&name("s", "t"), &name("s", "u"), "alice").unwrap_err();
        assert!(matches!(err, CatalogError::LookupFailure { .. }));
        assert_eq!(main_hash(&store), before);
        assert!(client.load_table(&name("s", "t")).unwrap().is_some());
    }

    #[test]
    fn test_rename_missing_source() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store));
        assert!(matches!(
            client.rename_table(&name("s", "t"), &name("s", "u"), "alice"),
            Err(CatalogError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_rename_into_missing_schema() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store));
        assert!(matches!(
            client.rename_table(&name("s", "t"), &name("nope", "t"), "alice"),
            Err(CatalogError::SchemaNotFound(s)) if s == "nope"
        ));
    }

    #[test]
    fn test_drop_retries_after_concurrent_advance() {
        let (_dir, store) = setup();
        with_table(&store);

        let scripted = Arc::new(ScriptedStore::new(store.clone()).before_commit(|inner, attempt| {
            if attempt == 1 {
                advance_branch(inner, "main", 1);
            }
        }));
        let client = client_over(scripted.clone());

        assert!(client.drop_table(&name("s", "t"), "alice").unwrap());
        assert_eq!(scripted.commit_attempts(), 2);

        // the drop landed on top of the concurrent commit
        let fresh = client_over(Arc::new(store.clone()));
        assert_eq!(fresh.load_table(&name("s", "t")).unwrap(), None);
        assert!(fresh.list_namespaces().unwrap().contains(&ns("other1")));
    }

    #[test]
    fn test_rename_retry_moves_the_latest_pointer() {
        let (_dir, store) = setup();
        with_table(&store);

        // another writer updates s.t between the first read and the commit
        let scripted = Arc::new(ScriptedStore::new(store.clone()).before_commit(|inner, attempt| {
            if attempt == 1 {
                client_over(Arc::new(inner.clone()))
                    .commit_table(&metadata(), &name("s", "t"), "/m/00001-b.metadata.json", "bob")
                    .unwrap();
            }
        }));
        let client = client_over(scripted.clone());

        client.rename_table(&name("s", "t"), &name("s", "u"), "alice").unwrap();
        assert_eq!(scripted.commit_attempts(), 2);

        let fresh = client_over(Arc::new(store.clone()));
        assert_eq!(fresh.load_table(&name("s", "t")).unwrap(), None);
        let moved = fresh.load_table(&name("s", "u")).unwrap().unwrap();
        assert_eq!(moved.metadata_location, "/m/00001-b.metadata.json");
    }

    #[test]
    fn test_rename_of_concurrently_dropped_table() {
        let (_dir, store) = setup();
        with_table(&store);

        let scripted = Arc::new(ScriptedStore::new(store.clone()).before_commit(|inner, attempt| {
            if attempt == 1 {
                client_over(Arc::new(inner.clone()))
                    .drop_table(&name("s", "t"), "bob")
                    .unwrap();
            }
        }));
        let client = client_over(scripted.clone());

        assert!(matches!(
            client.rename_table(&name("s", "t"), &name("s", "u"), "alice"),
            Err(CatalogError::TableNotFound(_))
        ));
        assert_eq!(scripted.commit_attempts(), 1);
        assert_eq!(client_over(Arc::new(store)).load_table(&name("s", "u")).unwrap(), None);
    }

    #[test]
    fn test_replace_table_checks_previous_location() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store.clone()));

        let before = main_hash(&store);
        let err = client
            .replace_table(&metadata(), &name("s", "t"), Some("/m/stale"), "/m/00001-c.metadata.json", "bob")
            .unwrap_err();
        assert!(err.is_commit_failure());
        assert!(client
            .replace_table(&metadata(), &name("s", "t"), None, "/m/00001-c.metadata.json", "bob")
            .unwrap_err()
            .is_commit_failure());
        assert_eq!(main_hash(&store), before);

        client
            .replace_table(
                &metadata(),
                &name("s", "t"),
                Some("/m/00000-a.metadata.json"),
                "/m/00001-c.metadata.json",
                "bob",
            )
            .unwrap();
        let table = client.load_table(&name("s", "t")).unwrap().unwrap();
        assert_eq!(table.metadata_location, "/m/00001-c.metadata.json");
    }

    #[test]
    fn test_retry_policy_bounds_attempts() {
        let (_dir, store) = setup();
        with_table(&store);

        let scripted = Arc::new(ScriptedStore::always_conflicting(store));
        let client = client_over(scripted.clone()).with_retry_policy(RetryPolicy::new(2));
        assert!(client.drop_table(&name("s", "t"), "alice").unwrap_err().is_commit_failure());
        assert_eq!(scripted.commit_attempts(), 2);
    }

    #[test]
    fn test_always_conflicting_gives_up_after_max_attempts() {
        let (_dir, store) = setup();
        with_table(&store);

        let scripted = Arc::new(ScriptedStore::always_conflicting(store.clone()));
        let client = client_over(scripted.clone());

        let err = client.drop_table(&name("s", "t"), "alice").unwrap_err();
        match err {
            CatalogError::CommitFailure { message, .. } => {
                assert!(message.contains("failed after retry"), "{}", message)
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(scripted.commit_attempts(), MAX_COMMIT_ATTEMPTS);
        assert!(client.load_table(&name("s", "t")).unwrap().is_some());
    }

    #[test]
    fn test_rename_conflict_message() {
        let (_dir, store) = setup();
        with_table(&store);

        let scripted = Arc::new(ScriptedStore::always_conflicting(store.clone()));
        let client = client_over(scripted.clone());
        let err = client.rename_table(&name("s", "t"), &name("s", "u"), "alice").unwrap_err();
        match err {
            CatalogError::CommitFailure { message, .. } => {
                assert!(message.contains("is not up to date"), "{}", message)
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(scripted.commit_attempts(), MAX_COMMIT_ATTEMPTS);
    }

    #[test]
    fn test_drop_after_branch_deleted_stops_immediately() {
        let (_dir, store) = setup();
        let main = Reference::Branch(store.default_branch().unwrap());
        store.create_branch("dev", &main).unwrap();

        let config = CatalogConfig::new("unused", "/w").with_reference("dev");
        let dev = VersionedCatalogClient::new(Arc::new(store.clone()), config.clone());
        dev.create_namespace(&ns("s")).unwrap();
        dev.commit_table(&metadata(), &name("s", "t"), "/m/x", "alice").unwrap();

        let scripted = Arc::new(ScriptedStore::new(store.clone()).before_commit(|inner, _| {
            inner.delete_branch("dev").unwrap();
        }));
        let client = VersionedCatalogClient::new(scripted.clone(), config);

        let err = client.drop_table(&name("s", "t"), "alice").unwrap_err();
        match err {
            CatalogError::CommitFailure { message, .. } => {
                assert!(message.contains("no longer exists"), "{}", message)
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(scripted.commit_attempts(), 1);
    }

    #[test]
    fn test_pinned_reference_rejects_writes() {
        let (_dir, store) = setup();
        let hash = main_hash(&store);
        let handle = ReferenceHandle::load(&store, Some("main"), Some(&hash)).unwrap();
        let client = client_over(Arc::new(store.clone())).with_reference(handle);

        for result in [
            client.create_namespace(&ns("s")),
            client.drop_namespace(&ns("s")),
            client.rename_table(&name("s", "t"), &name("s", "u"), "a"),
            client.commit_table(&metadata(), &name("s", "t"), "/m/x", "a"),
        ] {
            assert!(matches!(result, Err(CatalogError::ImmutableReference(_))));
        }
        assert!(matches!(
            client.drop_table(&name("s", "t"), "a"),
            Err(CatalogError::ImmutableReference(_))
        ));
        assert_eq!(main_hash(&store), hash);
    }

    #[test]
    fn test_namespace_round_trip() {
        let (_dir, store) = setup();
        let client = client_over(Arc::new(store.clone()));

        client.create_namespace(&ns("s")).unwrap();
        assert_eq!(client.reference().unwrap().hash(), main_hash(&store));
        assert_eq!(client.list_namespaces().unwrap(), vec![ns("s")]);
        assert!(client.load_namespace_metadata(&ns("s")).unwrap().is_empty());
        assert!(matches!(
            client.create_namespace(&ns("s")),
            Err(CatalogError::SchemaAlreadyExists(_))
        ));

        client.drop_namespace(&ns("s")).unwrap();
        assert!(client.list_namespaces().unwrap().is_empty());
        assert!(matches!(client.drop_namespace(&ns("s")), Err(CatalogError::SchemaNotFound(_))));
        assert!(matches!(
            client.load_namespace_metadata(&ns("s")),
            Err(CatalogError::SchemaNotFound(_))
        ));
    }

    #[test]
    fn test_drop_non_empty_namespace() {
        let (_dir, store) = setup();
        with_table(&store);
        let client = client_over(Arc::new(store));

        match client.drop_namespace(&ns("s")).unwrap_err() {
            CatalogError::LookupFailure { message, .. } => assert!(message.contains("not empty")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(client.list_namespaces().unwrap().contains(&ns("s")));
        assert!(client.load_table(&name("s", "t")).unwrap().is_some());
    }

    #[test]
    fn test_writes_on_tag_are_rejected() {
        let (_dir, store) = setup();
        let main = Reference::Branch(store.default_branch().unwrap());
        store.create_tag("v1", &main).unwrap();

        let client = VersionedCatalogClient::new(
            Arc::new(store),
            CatalogConfig::new("unused", "/w").with_reference("v1"),
        );
        assert!(matches!(
            client.create_namespace(&ns("s")),
            Err(CatalogError::ImmutableReference(_))
        ));
        assert!(client.list_namespaces().unwrap().is_empty());
    }
}
