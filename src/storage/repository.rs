//! Git-backed version store.
//!
//! This is the central component of the storage layer. It wraps
//! `git2::Repository` behind a mutex and implements [`VersionStore`] on top
//! of refs, commits and content trees.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{ErrorCode, Repository, RepositoryInitOptions};
use log::{debug, info};
use parking_lot::Mutex;

use crate::model::{
    Branch, CommitMeta, Content, ContentKey, ContentType, Entry, Namespace, Operation, Reference,
    Tag,
};
use crate::storage::blob;
use crate::storage::commit::{self, CommitBuilder, CommitInfo, CommitMessage};
use crate::storage::error::{StoreResult, VersionStoreError};
use crate::storage::refs::RefManager;
use crate::storage::store::VersionStore;
use crate::storage::tree::ContentTree;
use crate::storage::types::{CommitId, EntryPath, GitSignature, RefName};

/// The Git version store.
///
/// Clone this to share across threads - it uses Arc internally.
/// `git2::Repository` is `Send` but not `Sync`, so every access goes through
/// one mutex.
#[derive(Clone)]
pub struct GitVersionStore {
    inner: Arc<GitVersionStoreInner>,
}

struct GitVersionStoreInner {
    repo: Mutex<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitVersionStore {
    fn from_repo(repo: Repository, path: &Path) -> Self {
        Self {
            inner: Arc::new(GitVersionStoreInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                signature: GitSignature::gitcat(),
            }),
        }
    }

    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)
            .map_err(|_| VersionStoreError::NotInitialized(path.to_path_buf()))?;
        debug!("opened version store at {}", path.display());
        Ok(Self::from_repo(repo, path))
    }

    /// Initialize a new repository with an empty `main` branch.
    pub fn init(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(RefName::MAIN);
        let repo = Repository::init_opts(path, &opts)?;

        let store = Self::from_repo(repo, path);
        store.with_repo(|repo| {
            commit::create_initial_commit(repo, &store.inner.signature)?;
            Ok(())
        })?;

        info!("initialized version store at {}", path.display());
        Ok(store)
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Repository) -> StoreResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== Administration ====================

    /// Create a branch at the hash of `from`.
    pub fn create_branch(&self, name: &str, from: &Reference) -> StoreResult<Branch> {
        let ref_name = RefName::new(name)?;
        self.with_repo(|repo| {
            let target = commit_of(repo, from)?;
            RefManager::create_branch(repo, &ref_name, target)?;
            info!("created branch {} at {}", name, target.short());
            Ok(Branch::new(name, target.to_hash()))
        })
    }

    /// Create a tag at the hash of `from`.
    pub fn create_tag(&self, name: &str, from: &Reference) -> StoreResult<Tag> {
        let ref_name = RefName::new(name)?;
        self.with_repo(|repo| {
            let target = commit_of(repo, from)?;
            RefManager::create_tag(repo, &ref_name, target)?;
            info!("created tag {} at {}", name, target.short());
            Ok(Tag::new(name, target.to_hash()))
        })
    }

    /// Delete a branch.
    pub fn delete_branch(&self, name: &str) -> StoreResult<()> {
        let ref_name = RefName::new(name)?;
        self.with_repo(|repo| RefManager::delete_branch(repo, &ref_name))
    }

    /// List branch names.
    pub fn list_branches(&self) -> StoreResult<Vec<String>> {
        self.with_repo(|repo| {
            let names = RefManager::list_branches(repo)?;
            Ok(names.into_iter().map(|n| n.as_str().to_string()).collect())
        })
    }

    /// Commit history of a reference, newest first.
    pub fn history(&self, ref_name: &str, limit: Option<usize>) -> StoreResult<Vec<CommitInfo>> {
        self.with_repo(|repo| {
            let reference = RefManager::resolve(repo, ref_name)?;
            let start = commit_of(repo, &reference)?;
            let iter = commit::history(repo, start)?;
            match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            }
        })
    }

    /// Resolve a named ref to a branch at its tip, rejecting tags.
    fn branch_for_write(repo: &Repository, ref_name: &str) -> StoreResult<(RefName, CommitId)> {
        match RefManager::resolve(repo, ref_name)? {
            Reference::Branch(_) => {
                let name = RefName::new(ref_name)?;
                let tip = RefManager::branch_tip(repo, &name)?;
                Ok((name, tip))
            }
            Reference::Tag(_) => Err(VersionStoreError::NotABranch(ref_name.to_string())),
        }
    }

    /// Commit a rewritten tree on top of `parent` and move the branch.
    fn commit_tree(
        &self,
        repo: &Repository,
        branch: &RefName,
        parent: CommitId,
        tree: &ContentTree,
        builder: impl FnOnce(CommitBuilder<'_>) -> CommitBuilder<'_>,
    ) -> StoreResult<CommitId> {
        let tree_id = tree.write(repo)?;
        let new_commit = builder(CommitBuilder::new(repo).tree(tree_id).parent(parent)).commit()?;
        RefManager::update_branch_if_unchanged(repo, branch, parent, new_commit)?;
        Ok(new_commit)
    }
}

/// The commit a resolved reference points at.
///
/// Reading at a reference first checks the name still exists, then reads at
/// the hash the caller holds, which may be older than the current tip.
fn commit_of(repo: &Repository, reference: &Reference) -> StoreResult<CommitId> {
    RefManager::resolve(repo, reference.name())?;

    let missing = || {
        VersionStoreError::ReferenceNotFound(format!("{}@{}", reference.name(), reference.hash()))
    };
    let id = CommitId::from_hash(reference.hash()).map_err(|_| missing())?;
    match repo.find_commit(id.raw()) {
        Ok(_) => Ok(id),
        Err(e) if e.code() == ErrorCode::NotFound => Err(missing()),
        Err(e) => Err(e.into()),
    }
}

fn snapshot(repo: &Repository, reference: &Reference) -> StoreResult<ContentTree> {
    let id = commit_of(repo, reference)?;
    commit::tree_at_commit(repo, id)
}

/// Apply one operation to a tree being prepared for commit.
fn apply(repo: &Repository, tree: &mut ContentTree, operation: &Operation) -> StoreResult<()> {
    match operation {
        Operation::Put { key, content } => {
            let as_namespace = EntryPath::NamespaceMarker(Namespace::of(key.elements().to_vec())?);
            match content {
                Content::IcebergTable(_) => {
                    let namespace = key.namespace();
                    if !namespace.is_empty()
                        && !tree.contains(&EntryPath::NamespaceMarker(namespace.clone()))
                    {
                        return Err(VersionStoreError::NamespaceNotFound(namespace));
                    }
                    if tree.contains(&as_namespace) {
                        return Err(VersionStoreError::KeyIsNamespace(key.clone()));
                    }
                    let blob_id = blob::write_blob(repo, content)?;
                    tree.insert(&EntryPath::Content(key.clone()), blob_id);
                }
                Content::Namespace(ns) if ns.elements() == key.elements() => {
                    let blob_id = blob::write_blob(repo, content)?;
                    tree.insert(&as_namespace, blob_id);
                }
                Content::Namespace(ns) => {
                    return Err(VersionStoreError::Internal(format!(
                        "namespace {} cannot be stored under key {}",
                        ns, key
                    )));
                }
            }
        }
        Operation::Delete { key } => {
            // deleting a missing key is a no-op
            tree.remove(&EntryPath::Content(key.clone()));
        }
    }
    Ok(())
}

impl VersionStore for GitVersionStore {
    fn default_branch(&self) -> StoreResult<Branch> {
        self.with_repo(RefManager::default_branch)
    }

    fn get_reference(&self, name: &str) -> StoreResult<Reference> {
        debug!("get reference {}", name);
        self.with_repo(|repo| RefManager::resolve(repo, name))
    }

    fn get_entries(&self, reference: &Reference) -> StoreResult<Vec<Entry>> {
        debug!("get entries at {}", reference);
        self.with_repo(|repo| {
            let tree = snapshot(repo, reference)?;
            tree.entries()
                .map(|(path, _)| -> StoreResult<Entry> {
                    Ok(match path {
                        EntryPath::Content(key) => Entry {
                            key,
                            content_type: ContentType::IcebergTable,
                        },
                        EntryPath::NamespaceMarker(ns) => Entry {
                            key: ContentKey::new(ns.elements().to_vec())?,
                            content_type: ContentType::Namespace,
                        },
                    })
                })
                .collect()
        })
    }

    fn get_content(&self, reference: &Reference, key: &ContentKey) -> StoreResult<Option<Content>> {
        debug!("get content {} at {}", key, reference);
        self.with_repo(|repo| {
            let tree = snapshot(repo, reference)?;
            let candidates = [
                EntryPath::Content(key.clone()),
                EntryPath::NamespaceMarker(Namespace::of(key.elements().to_vec())?),
            ];
            for path in &candidates {
                if let Some(blob_id) = tree.get(path) {
                    return blob::read_content(repo, blob_id, path).map(Some);
                }
            }
            Ok(None)
        })
    }

    fn get_namespaces(&self, ref_name: &str) -> StoreResult<Vec<Namespace>> {
        debug!("get namespaces on {}", ref_name);
        self.with_repo(|repo| {
            let reference = RefManager::resolve(repo, ref_name)?;
            let tree = snapshot(repo, &reference)?;
            Ok(tree
                .entries()
                .filter_map(|(path, _)| match path {
                    EntryPath::NamespaceMarker(ns) => Some(ns),
                    EntryPath::Content(_) => None,
                })
                .collect())
        })
    }

    fn get_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<Namespace> {
        debug!("get namespace {} on {}", namespace, ref_name);
        self.with_repo(|repo| {
            let reference = RefManager::resolve(repo, ref_name)?;
            let tree = snapshot(repo, &reference)?;
            if tree.contains(&EntryPath::NamespaceMarker(namespace.clone())) {
                Ok(namespace.clone())
            } else {
                Err(VersionStoreError::NamespaceNotFound(namespace.clone()))
            }
        })
    }

    fn create_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<Namespace> {
        debug!("create namespace {} on {}", namespace, ref_name);
        self.with_repo(|repo| {
            let (branch, tip) = Self::branch_for_write(repo, ref_name)?;
            let mut tree = commit::tree_at_commit(repo, tip)?;

            let marker = EntryPath::NamespaceMarker(namespace.clone());
            let as_key = EntryPath::Content(ContentKey::new(namespace.elements().to_vec())?);
            if tree.contains(&marker) || tree.contains(&as_key) {
                return Err(VersionStoreError::NamespaceAlreadyExists(namespace.clone()));
            }

            let blob_id = blob::write_blob(repo, &Content::Namespace(namespace.clone()))?;
            tree.insert(&marker, blob_id);

            let new_commit = self.commit_tree(repo, &branch, tip, &tree, |b| {
                b.message(CommitMessage::create_namespace(namespace))
                    .signature(self.inner.signature.clone())
            })?;
            info!("created namespace {} on {} at {}", namespace, branch, new_commit.short());
            Ok(namespace.clone())
        })
    }

    fn delete_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<()> {
        debug!("delete namespace {} on {}", namespace, ref_name);
        self.with_repo(|repo| {
            let (branch, tip) = Self::branch_for_write(repo, ref_name)?;
            let mut tree = commit::tree_at_commit(repo, tip)?;

            let marker = EntryPath::NamespaceMarker(namespace.clone());
            if !tree.contains(&marker) {
                return Err(VersionStoreError::NamespaceNotFound(namespace.clone()));
            }
            let entries = tree.count_below(namespace);
            if entries > 0 {
                return Err(VersionStoreError::NamespaceNotEmpty {
                    namespace: namespace.clone(),
                    entries,
                });
            }

            tree.remove(&marker);
            let new_commit = self.commit_tree(repo, &branch, tip, &tree, |b| {
                b.message(CommitMessage::delete_namespace(namespace))
                    .signature(self.inner.signature.clone())
            })?;
            info!("dropped namespace {} on {} at {}", namespace, branch, new_commit.short());
            Ok(())
        })
    }

    fn commit(&self, branch: &Branch, operations: &[Operation], meta: &CommitMeta) -> StoreResult<Branch> {
        debug!(
            "commit {} operations on {}@{}",
            operations.len(),
            branch.name(),
            branch.hash().short()
        );
        self.with_repo(|repo| {
            let (name, tip) = Self::branch_for_write(repo, branch.name())?;
            if tip.to_hash() != *branch.hash() {
                return Err(VersionStoreError::Conflict {
                    reference: name.to_string(),
                    expected: branch.hash().to_string(),
                    actual: tip.to_string(),
                });
            }

            let mut tree = commit::tree_at_commit(repo, tip)?;
            for operation in operations {
                apply(repo, &mut tree, operation)?;
            }

            let new_commit = self.commit_tree(repo, &name, tip, &tree, |b| b.meta(meta))?;
            Ok(Branch::new(name.as_str(), new_commit.to_hash()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IcebergTable;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitVersionStore) {
        let dir = TempDir::new().unwrap();
        let store = GitVersionStore::init(dir.path()).unwrap();
        (dir, store)
    }

    fn key(schema: &str, table: &str) -> ContentKey {
        ContentKey::of(&Namespace::parse(schema).unwrap(), table).unwrap()
    }

    fn table_put(schema: &str, table: &str, snapshot_id: i64) -> Operation {
        Operation::put(
            key(schema, table),
            Content::IcebergTable(IcebergTable::new("loc", snapshot_id, 0, 0, 0)),
        )
    }

    fn meta() -> CommitMeta {
        CommitMeta::new("tester", "test commit")
    }

    #[test]
    fn test_init_and_open() {
        let dir = TempDir::new().unwrap();

        let store = GitVersionStore::init(dir.path()).unwrap();
        let main1 = store.default_branch().unwrap();
        assert_eq!(main1.name(), "main");

        drop(store);
        let store = GitVersionStore::open(dir.path()).unwrap();
        assert_eq!(store.default_branch().unwrap(), main1);
    }

    #[test]
    fn test_open_or_init() {
        let dir = TempDir::new().unwrap();

        // First call inits
        let store1 = GitVersionStore::open_or_init(dir.path()).unwrap();
        let head1 = store1.default_branch().unwrap();

        // Second call opens
        drop(store1);
        let store2 = GitVersionStore::open_or_init(dir.path()).unwrap();
        assert_eq!(store2.default_branch().unwrap(), head1);
    }

    #[test]
    fn test_open_missing_repository() {
        let dir = TempDir::new().unwrap();
        let result = GitVersionStore::open(dir.path().join("absent"));
        assert!(matches!(result, Err(VersionStoreError::NotInitialized(_))));
    }

    #[test]
    fn test_namespace_lifecycle() {
        let (_dir, store) = setup();
        let ns = Namespace::parse("sales").unwrap();

        store.create_namespace("main", &ns).unwrap();
        assert_eq!(store.get_namespaces("main").unwrap(), vec![ns.clone()]);
        assert_eq!(store.get_namespace("main", &ns).unwrap(), ns);

        let again = store.create_namespace("main", &ns);
        assert!(matches!(again, Err(VersionStoreError::NamespaceAlreadyExists(_))));

        store.delete_namespace("main", &ns).unwrap();
        assert!(store.get_namespaces("main").unwrap().is_empty());

        let missing = store.delete_namespace("main", &ns);
        assert!(matches!(missing, Err(VersionStoreError::NamespaceNotFound(_))));
    }

    #[test]
    fn test_delete_non_empty_namespace() {
        let (_dir, store) = setup();
        let ns = Namespace::parse("s").unwrap();
        store.create_namespace("main", &ns).unwrap();

        let main = store.default_branch().unwrap();
        store.commit(&main, &[table_put("s", "t", 1)], &meta()).unwrap();

        let result = store.delete_namespace("main", &ns);
        assert!(matches!(
            result,
            Err(VersionStoreError::NamespaceNotEmpty { entries: 1, .. })
        ));
        assert!(store.get_namespace("main", &ns).is_ok());
    }

    #[test]
    fn test_commit_and_read_content() {
        let (_dir, store) = setup();
        store.create_namespace("main", &Namespace::parse("s").unwrap()).unwrap();

        let main = store.default_branch().unwrap();
        let advanced = store.commit(&main, &[table_put("s", "t", 42)], &meta()).unwrap();
        assert_ne!(advanced.hash(), main.hash());

        let reference = Reference::Branch(advanced.clone());
        let content = store.get_content(&reference, &key("s", "t")).unwrap().unwrap();
        assert_eq!(content.into_table().unwrap().snapshot_id, 42);

        // reading at the older hash still sees the old state
        let before = Reference::Branch(main);
        assert!(store.get_content(&before, &key("s", "t")).unwrap().is_none());

        let entries = store.get_entries(&reference).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .any(|e| e.key == key("s", "t") && e.content_type == ContentType::IcebergTable));

        let history = store.history("main", None).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].author_name, "tester");
    }

    #[test]
    fn test_commit_against_stale_hash_conflicts() {
        let (_dir, store) = setup();
        store.create_namespace("main", &Namespace::parse("s").unwrap()).unwrap();

        let main = store.default_branch().unwrap();
        store.commit(&main, &[table_put("s", "a", 1)], &meta()).unwrap();

        let result = store.commit(&main, &[table_put("s", "b", 1)], &meta());
        assert!(matches!(result, Err(VersionStoreError::Conflict { .. })));

        let tip = Reference::Branch(store.default_branch().unwrap());
        assert!(store.get_content(&tip, &key("s", "b")).unwrap().is_none());
    }

    #[test]
    fn test_put_requires_namespace() {
        let (_dir, store) = setup();
        let main = store.default_branch().unwrap();

        let result = store.commit(&main, &[table_put("nope", "t", 1)], &meta());
        assert!(matches!(result, Err(VersionStoreError::NamespaceNotFound(_))));
        assert_eq!(store.default_branch().unwrap(), main);
    }

    #[test]
    fn test_commit_on_missing_branch_or_tag() {
        let (_dir, store) = setup();
        let main = store.default_branch().unwrap();

        let gone = Branch::new("gone", main.hash().clone());
        let result = store.commit(&gone, &[], &meta());
        assert!(matches!(result, Err(VersionStoreError::ReferenceNotFound(_))));

        store.create_tag("v1", &Reference::Branch(main.clone())).unwrap();
        let as_branch = Branch::new("v1", main.hash().clone());
        let result = store.commit(&as_branch, &[], &meta());
        assert!(matches!(result, Err(VersionStoreError::NotABranch(_))));
    }

    #[test]
    fn test_reads_after_branch_deleted() {
        let (_dir, store) = setup();
        let main = Reference::Branch(store.default_branch().unwrap());
        let dev = store.create_branch("dev", &main).unwrap();

        store.delete_branch("dev").unwrap();
        let result = store.get_entries(&Reference::Branch(dev));
        assert!(matches!(result, Err(VersionStoreError::ReferenceNotFound(_))));
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let (_dir, store) = setup();
        store.create_namespace("main", &Namespace::parse("s").unwrap()).unwrap();
        let main = store.default_branch().unwrap();

        let advanced = store
            .commit(&main, &[Operation::delete(key("s", "absent"))], &meta())
            .unwrap();
        let entries = store.get_entries(&Reference::Branch(advanced)).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_branches_are_isolated() {
        let (_dir, store) = setup();
        store.create_namespace("main", &Namespace::parse("s").unwrap()).unwrap();
        let main = Reference::Branch(store.default_branch().unwrap());
        let dev = store.create_branch("dev", &main).unwrap();

        store.commit(&dev, &[table_put("s", "t", 1)], &meta()).unwrap();

        let main_now = store.get_reference("main").unwrap();
        assert!(store.get_content(&main_now, &key("s", "t")).unwrap().is_none());
        let dev_now = store.get_reference("dev").unwrap();
        assert!(store.get_content(&dev_now, &key("s", "t")).unwrap().is_some());
        assert_eq!(store.list_branches().unwrap().len(), 2);
    }
}
