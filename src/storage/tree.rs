//! tree operations for content entries.
//!
//! in Git, a tree is a directory. Here the commit tree mirrors the key
//! space: each namespace element is a directory, each table pointer a
//! `.json` blob, each namespace a `.namespace.json` marker blob.
//!
//! Nested trees are fiddly to edit in place, so a tree is flattened into a
//! path map, edited, and written back out level by level.

use std::collections::BTreeMap;

use git2::{FileMode, ObjectType, Repository, TreeWalkMode, TreeWalkResult};

use crate::model::Namespace;
use crate::storage::error::StoreResult;
use crate::storage::types::{BlobId, EntryPath, TreeId};

/// A flattened, editable snapshot of a commit tree.
///
/// Keys are full slash-separated paths of blobs. Paths that do not decode to
/// an entry are carried through unchanged so foreign files survive commits.
#[derive(Debug, Clone, Default)]
pub struct ContentTree {
    blobs: BTreeMap<String, BlobId>,
}

impl ContentTree {
    /// an empty tree
    pub fn empty() -> Self {
        Self::default()
    }

    /// Flatten an existing tree.
    pub fn from_tree(tree: &git2::Tree<'_>) -> StoreResult<Self> {
        let mut blobs = BTreeMap::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    blobs.insert(format!("{}{}", root, name), BlobId::new(entry.id()));
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(Self { blobs })
    }

    pub fn get(&self, path: &EntryPath) -> Option<BlobId> {
        self.blobs.get(&path.encode()).copied()
    }

    pub fn contains(&self, path: &EntryPath) -> bool {
        self.blobs.contains_key(&path.encode())
    }

    pub fn insert(&mut self, path: &EntryPath, blob: BlobId) {
        self.blobs.insert(path.encode(), blob);
    }

    /// remove an entry, returning its blob if it was present
    pub fn remove(&mut self, path: &EntryPath) -> Option<BlobId> {
        self.blobs.remove(&path.encode())
    }

    /// All decodable entries, in path order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryPath, BlobId)> + '_ {
        self.blobs
            .iter()
            .filter_map(|(path, blob)| EntryPath::decode(path).map(|entry| (entry, *blob)))
    }

    /// Count the entries strictly below `namespace`: tables anywhere under it
    /// and the markers of nested namespaces. Its own marker is not counted.
    pub fn count_below(&self, namespace: &Namespace) -> usize {
        self.entries()
            .filter(|(entry, _)| match entry {
                EntryPath::Content(key) => namespace.contains(key),
                EntryPath::NamespaceMarker(ns) => {
                    ns.elements().len() > namespace.elements().len()
                        && ns.elements().starts_with(namespace.elements())
                }
            })
            .count()
    }

    /// Write the tree back into the object database.
    pub fn write(&self, repo: &Repository) -> StoreResult<TreeId> {
        let mut root = Node::default();
        for (path, blob) in &self.blobs {
            let parts: Vec<&str> = path.split('/').collect();
            root.insert(&parts, *blob);
        }
        let oid = root.write(repo)?;
        Ok(TreeId::new(oid))
    }
}

/// one directory level while writing
#[derive(Default)]
struct Node {
    blobs: BTreeMap<String, BlobId>,
    dirs: BTreeMap<String, Node>,
}

impl Node {
    fn insert(&mut self, parts: &[&str], blob: BlobId) {
        match parts {
            [] => {}
            [name] => {
                self.blobs.insert(name.to_string(), blob);
            }
            [dir, rest @ ..] => {
                self.dirs.entry(dir.to_string()).or_default().insert(rest, blob);
            }
        }
    }

    fn write(&self, repo: &Repository) -> StoreResult<git2::Oid> {
        let mut builder = repo.treebuilder(None)?;
        for (name, dir) in &self.dirs {
            let oid = dir.write(repo)?;
            builder.insert(name, oid, FileMode::Tree.into())?;
        }
        for (name, blob) in &self.blobs {
            builder.insert(name, blob.raw(), FileMode::Blob.into())?;
        }
        Ok(builder.write()?)
    }
}
