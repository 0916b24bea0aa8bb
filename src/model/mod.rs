//! Value types shared by the store and the catalog: references, keys,
//! namespaces, table pointers and commit operations.

mod content;
mod reference;

pub use content::{
    CommitMeta, Content, ContentKey, ContentType, Entry, IcebergTable, InvalidNameError,
    Namespace, Operation, SchemaTableName,
};
pub use reference::{Branch, Hash, Reference, Tag};
