//! Test doubles around the Git store for exercising conflicts and races.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::model::{Branch, CommitMeta, Content, ContentKey, Entry, Namespace, Operation, Reference};
use crate::storage::{GitVersionStore, StoreResult, VersionStore, VersionStoreError};

type Hook = Box<dyn FnMut(&GitVersionStore, usize) + Send>;

/// Delegates to a real store, counting commit attempts and optionally
/// running a hook (or failing outright) before each one.
pub(crate) struct ScriptedStore {
    inner: GitVersionStore,
    attempts: AtomicUsize,
    before_commit: Mutex<Option<Hook>>,
    always_conflict: bool,
}

impl ScriptedStore {
    pub fn new(inner: GitVersionStore) -> Self {
        Self {
            inner,
            attempts: AtomicUsize::new(0),
            before_commit: Mutex::new(None),
            always_conflict: false,
        }
    }

    /// Every commit is rejected as if the branch had moved.
    pub fn always_conflicting(inner: GitVersionStore) -> Self {
        Self {
            always_conflict: true,
            ..Self::new(inner)
        }
    }

    /// Run `hook` with the attempt number (starting at 1) before each commit.
    pub fn before_commit(self, hook: impl FnMut(&GitVersionStore, usize) + Send + 'static) -> Self {
        *self.before_commit.lock() = Some(Box::new(hook));
        self
    }

    pub fn commit_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Move `branch` forward with an unrelated commit, as another writer would.
pub(crate) fn advance_branch(store: &GitVersionStore, branch: &str, n: usize) {
    let ns = Namespace::parse(&format!("other{}", n)).unwrap();
    store.create_namespace(branch, &ns).unwrap();
}

impl VersionStore for ScriptedStore {
    fn default_branch(&self) -> StoreResult<Branch> {
        self.inner.default_branch()
    }

    fn get_reference(&self, name: &str) -> StoreResult<Reference> {
        self.inner.get_reference(name)
    }

    fn get_entries(&self, reference: &Reference) -> StoreResult<Vec<Entry>> {
        self.inner.get_entries(reference)
    }

    fn get_content(&self, reference: &Reference, key: &ContentKey) -> StoreResult<Option<Content>> {
        self.inner.get_content(reference, key)
    }

    fn get_namespaces(&self, ref_name: &str) -> StoreResult<Vec<Namespace>> {
        self.inner.get_namespaces(ref_name)
    }

    fn get_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<Namespace> {
        self.inner.get_namespace(ref_name, namespace)
    }

    fn create_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<Namespace> {
        self.inner.create_namespace(ref_name, namespace)
    }

    fn delete_namespace(&self, ref_name: &str, namespace: &Namespace) -> StoreResult<()> {
        self.inner.delete_namespace(ref_name, namespace)
    }

    fn commit(&self, branch: &Branch, operations: &[Operation], meta: &CommitMeta) -> StoreResult<Branch> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.before_commit.lock().as_mut() {
            hook(&self.inner, attempt);
        }
        if self.always_conflict {
            return Err(VersionStoreError::Conflict {
                reference: branch.name().to_string(),
                expected: branch.hash().to_string(),
                actual: "0000000".to_string(),
            });
        }
        self.inner.commit(branch, operations, meta)
    }
}
