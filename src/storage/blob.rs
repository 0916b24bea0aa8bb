//! Blob operations for content storage.
//!
//! Every entry (table pointer or namespace marker) is stored as one pretty
//! printed JSON blob. The `type` tag inside the blob has to agree with where
//! the blob sits in the tree.

use git2::Repository;

use crate::model::Content;
use crate::storage::error::{StoreResult, VersionStoreError};
use crate::storage::types::{BlobId, EntryPath};

/// serialize content to JSON bytes
pub fn serialize_content(content: &Content) -> StoreResult<Vec<u8>> {
    let bytes = serde_json::to_vec_pretty(content)?;
    Ok(bytes)
}

/// deserialize content from JSON bytes
///
/// validates that the content kind matches the path it was read from
pub fn deserialize_content(bytes: &[u8], path: &EntryPath) -> StoreResult<Content> {
    let content: Content = serde_json::from_slice(bytes)?;

    match (path, &content) {
        (EntryPath::Content(_), Content::IcebergTable(_)) => Ok(content),
        (EntryPath::NamespaceMarker(expected), Content::Namespace(found)) if expected == found => {
            Ok(content)
        }
        _ => Err(VersionStoreError::CorruptedData {
            path: path.to_path_buf(),
            reason: format!(
                "content of type {:?} does not belong at this path",
                content.content_type()
            ),
        }),
    }
}

/// write content as a blob to the repository
///
/// returns the blob ID (SHA-1 hash of the content)
pub fn write_blob(repo: &Repository, content: &Content) -> StoreResult<BlobId> {
    let bytes = serialize_content(content)?;
    let oid = repo.blob(&bytes)?;
    Ok(BlobId::new(oid))
}

/// read and decode a blob from the repository
pub fn read_content(repo: &Repository, blob_id: BlobId, path: &EntryPath) -> StoreResult<Content> {
    let blob = repo.find_blob(blob_id.raw())?;
    deserialize_content(blob.content(), path)
}
