//! core type-safe wrappers around git primitives for the version store.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use git2::Oid;

use crate::model::{ContentKey, Hash, InvalidNameError, Namespace};

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the storage module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse a CommitId from a reference hash
    pub fn from_hash(hash: &Hash) -> Result<Self, git2::Error> {
        Oid::from_str(hash.as_str()).map(CommitId)
    }

    pub fn to_hash(self) -> Hash {
        Hash::new(self.0.to_string())
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        let full = self.0.to_string();
        full[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git blob identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub(crate) Oid);

impl BlobId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

/// Git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

/// A validated branch or tag short name.
///
/// Git is more permissive than this, but names that would need escaping
/// or that could be mistaken for a path outside `refs/` are refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefName(String);

impl RefName {
    /// the branch HEAD points at in a fresh repository
    pub const MAIN: &'static str = "main";

    const HEADS: &'static str = "refs/heads/";
    const TAGS: &'static str = "refs/tags/";

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if let Some((position, char)) = name
            .chars()
            .enumerate()
            .find(|(_, c)| c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
        {
            return Err(InvalidNameError::InvalidCharacter { char, position });
        }
        if let Some(position) = name.find("..") {
            return Err(InvalidNameError::InvalidCharacter { char: '.', position });
        }
        if name.starts_with('/') || name.ends_with('/') {
            let position = if name.starts_with('/') { 0 } else { name.len() - 1 };
            return Err(InvalidNameError::InvalidCharacter { char: '/', position });
        }
        Ok(Self(name))
    }

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// full ref path for a branch (e.g. "refs/heads/main")
    pub fn branch_path(&self) -> String {
        format!("{}{}", Self::HEADS, self.0)
    }

    /// full ref path for a tag (e.g. "refs/tags/v1")
    pub fn tag_path(&self) -> String {
        format!("{}{}", Self::TAGS, self.0)
    }

    /// strip `refs/heads/` from a full branch path
    pub fn from_branch_path(path: &str) -> Option<Self> {
        path.strip_prefix(Self::HEADS)
            .and_then(|name| Self::new(name).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an entry lives inside a commit tree.
///
/// Tables are stored as `a/b/t.json`; a namespace `a.b` is marked by
/// `a/b/.namespace.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPath {
    Content(ContentKey),
    NamespaceMarker(Namespace),
}

impl EntryPath {
    const EXT: &'static str = ".json";
    const MARKER: &'static str = ".namespace.json";

    pub fn encode(&self) -> String {
        match self {
            EntryPath::Content(key) => format!("{}{}", key.elements().join("/"), Self::EXT),
            EntryPath::NamespaceMarker(ns) => {
                format!("{}/{}", ns.elements().join("/"), Self::MARKER)
            }
        }
    }

    /// Decode a tree path. Paths that are not entries (foreign files,
    /// names that fail validation) yield `None`.
    pub fn decode(path: &str) -> Option<Self> {
        if let Some(dir) = path.strip_suffix(Self::MARKER) {
            let dir = dir.strip_suffix('/')?;
            let elements = dir.split('/').map(str::to_string).collect();
            return Namespace::of(elements).ok().map(EntryPath::NamespaceMarker);
        }

        let stem = path.strip_suffix(Self::EXT)?;
        let elements = stem.split('/').map(str::to_string).collect();
        ContentKey::new(elements).ok().map(EntryPath::Content)
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.encode())
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// signature for housekeeping commits made by the store itself
    pub fn gitcat() -> Self {
        Self::new("gitcat", "gitcat@localhost")
    }

    /// Signature for a catalog user. libgit2 refuses empty names and emails.
    pub fn for_author(author: &str) -> Self {
        let name = match author.trim() {
            "" => "anonymous",
            trimmed => trimmed,
        };
        Self::new(name, format!("{}@localhost", name.replace(char::is_whitespace, "_")))
    }

    /// convert to git2::Signature stamped with the given time
    pub(crate) fn to_git2_signature(
        &self,
        at: DateTime<Utc>,
    ) -> Result<git2::Signature<'static>, git2::Error> {
        let time = git2::Time::new(at.timestamp(), 0);
        git2::Signature::new(&self.name, &self.email, &time)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::gitcat()
    }
}
