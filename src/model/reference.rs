//! Named pointers into the versioned store.
//!
//! A reference is either a branch (advances as commits land on it) or a tag
//! (fixed once created). Both carry the commit hash they were resolved to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A commit hash in the versioned store, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash(String);

impl Hash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// short form of the hash, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A branch resolved to a specific hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    name: String,
    hash: Hash,
}

impl Branch {
    pub fn new(name: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            hash,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }
}

/// A tag resolved to a specific hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    name: String,
    hash: Hash,
}

impl Tag {
    pub fn new(name: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            hash,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }
}

/// A branch or a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Reference {
    Branch(Branch),
    Tag(Tag),
}

impl Reference {
    pub fn name(&self) -> &str {
        match self {
            Reference::Branch(b) => b.name(),
            Reference::Tag(t) => t.name(),
        }
    }

    pub fn hash(&self) -> &Hash {
        match self {
            Reference::Branch(b) => b.hash(),
            Reference::Tag(t) => t.hash(),
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Reference::Branch(_))
    }

    /// Same name and kind, pointed at another hash.
    pub fn with_hash(&self, hash: Hash) -> Reference {
        match self {
            Reference::Branch(b) => Reference::Branch(Branch::new(b.name(), hash)),
            Reference::Tag(t) => Reference::Tag(Tag::new(t.name(), hash)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reference::Branch(_) => "branch",
            Reference::Tag(_) => "tag",
        }
    }
}

impl From<Branch> for Reference {
    fn from(branch: Branch) -> Self {
        Reference::Branch(branch)
    }
}

impl From<Tag> for Reference {
    fn from(tag: Tag) -> Self {
        Reference::Tag(tag)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}@{}", self.kind(), self.name(), self.hash().short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_hash_keeps_kind() {
        let tag = Reference::Tag(Tag::new("v1", Hash::new("aaaa")));
        let moved = tag.with_hash(Hash::new("bbbb"));
        assert!(!moved.is_branch());
        assert_eq!(moved.name(), "v1");
        assert_eq!(moved.hash().as_str(), "bbbb");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(Hash::new("0123456789abcdef").short(), "0123456");
        assert_eq!(Hash::new("abc").short(), "abc");
    }

    #[test]
    fn test_reference_json_shape() {
        let reference = Reference::Branch(Branch::new("main", Hash::new("abc")));
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(json["type"], "BRANCH");
        assert_eq!(json["name"], "main");
        assert_eq!(json["hash"], "abc");
    }
}
