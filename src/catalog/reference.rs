//! The reference a catalog client reads and writes through.

use std::fmt;

use log::debug;
use parking_lot::{Mutex, MutexGuard, RwLock};

use super::error::{CatalogError, CatalogResult};
use crate::model::{Branch, Hash, Reference};
use crate::storage::VersionStore;

/// Holds one branch or tag and moves it as the client observes or makes
/// commits.
///
/// A handle is mutable when it holds a branch and was not pinned to an
/// explicit hash; only mutable handles can be refreshed or advanced.
pub struct ReferenceHandle {
    reference: RwLock<Reference>,
    mutable: bool,
    /// held across refresh + commit by every writer sharing this handle
    commit_lock: Mutex<()>,
}

impl ReferenceHandle {
    pub fn new(reference: Reference, hash_pinned: bool) -> Self {
        let mutable = reference.is_branch() && !hash_pinned;
        Self {
            reference: RwLock::new(reference),
            mutable,
            commit_lock: Mutex::new(()),
        }
    }

    /// Resolve `requested` (or the default branch) against the store.
    ///
    /// An explicit `hash` pins the handle to that hash whatever the kind of
    /// reference.
    pub fn load(
        store: &dyn VersionStore,
        requested: Option<&str>,
        hash: Option<&Hash>,
    ) -> CatalogResult<Self> {
        let reference = match requested {
            None => store.default_branch().map(Reference::from).map_err(|e| {
                if e.is_transport() {
                    CatalogError::transport("Cannot resolve the default branch", e)
                } else {
                    CatalogError::lookup(format!("No default branch available: {}", e), e)
                }
            })?,
            Some(name) => store.get_reference(name).map_err(|e| {
                if e.is_transport() {
                    CatalogError::transport(format!("Cannot resolve reference '{}'", name), e)
                } else {
                    CatalogError::lookup(format!("Reference '{}' does not exist", name), e)
                }
            })?,
        };

        let handle = match hash {
            Some(hash) => Self::new(reference.with_hash(hash.clone()), true),
            None => Self::new(reference, false),
        };
        debug!("using {} (mutable: {})", handle.reference(), handle.mutable);
        Ok(handle)
    }

    /// Re-resolve the reference by name. Immutable handles never change.
    ///
    /// Returns whether the held reference moved.
    pub fn refresh(&self, store: &dyn VersionStore) -> CatalogResult<bool> {
        if !self.mutable {
            return Ok(false);
        }

        let name = self.name();
        let fresh = store.get_reference(&name).map_err(|e| {
            CatalogError::lookup(format!("Failed to refresh reference '{}': {}", name, e), e)
        })?;

        let mut current = self.reference.write();
        if *current == fresh {
            return Ok(false);
        }
        debug!("refreshed {} -> {}", *current, fresh);
        *current = fresh;
        Ok(true)
    }

    /// Replace the held reference, typically with the branch a commit
    /// returned.
    pub fn update(&self, reference: Reference) -> CatalogResult<()> {
        if !self.mutable {
            return Err(CatalogError::Precondition(format!(
                "cannot move immutable reference {} to {}",
                self.reference(),
                reference
            )));
        }
        *self.reference.write() = reference;
        Ok(())
    }

    pub fn as_branch(&self) -> CatalogResult<Branch> {
        match &*self.reference.read() {
            Reference::Branch(branch) => Ok(branch.clone()),
            Reference::Tag(tag) => Err(CatalogError::NotABranch(tag.name().to_string())),
        }
    }

    pub fn check_mutable(&self) -> CatalogResult<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(CatalogError::ImmutableReference(self.reference().to_string()))
        }
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// A copy of the current reference.
    pub fn reference(&self) -> Reference {
        self.reference.read().clone()
    }

    pub fn name(&self) -> String {
        self.reference.read().name().to_string()
    }

    pub fn hash(&self) -> Hash {
        self.reference.read().hash().clone()
    }

    /// Serialize writers sharing this handle.
    pub fn lock_commits(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock()
    }
}

impl fmt::Debug for ReferenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceHandle")
            .field("reference", &*self.reference.read())
            .field("mutable", &self.mutable)
            .finish()
    }
}
