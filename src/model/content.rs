//! Keys, namespaces and the content stored under them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validate one element of a key or namespace.
///
/// Elements end up as path segments in the store, so they are restricted to
/// ASCII alphanumerics, underscores and hyphens.
fn validate_element(element: &str) -> Result<(), InvalidNameError> {
    if element.is_empty() {
        return Err(InvalidNameError::Empty);
    }

    if element.len() > 128 {
        return Err(InvalidNameError::TooLong(element.len()));
    }

    for (i, c) in element.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
        }
    }

    Ok(())
}

/// A hierarchical namespace, e.g. `sales.emea`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    elements: Vec<String>,
}

impl Namespace {
    /// The root namespace.
    pub fn empty() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub fn of(elements: Vec<String>) -> Result<Self, InvalidNameError> {
        for element in &elements {
            validate_element(element)?;
        }
        Ok(Self { elements })
    }

    /// Parse a dotted name. An empty string is rejected; use [`Namespace::empty`]
    /// for the root.
    pub fn parse(dotted: &str) -> Result<Self, InvalidNameError> {
        if dotted.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        Self::of(dotted.split('.').map(str::to_string).collect())
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// dotted form
    pub fn name(&self) -> String {
        self.elements.join(".")
    }

    /// True when `key` lives anywhere below this namespace.
    pub fn contains(&self, key: &ContentKey) -> bool {
        key.elements.len() > self.elements.len() && key.elements.starts_with(&self.elements)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Path of an entry in the store: namespace elements followed by a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentKey {
    elements: Vec<String>,
}

impl ContentKey {
    pub fn new(elements: Vec<String>) -> Result<Self, InvalidNameError> {
        if elements.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        for element in &elements {
            validate_element(element)?;
        }
        Ok(Self { elements })
    }

    pub fn of(namespace: &Namespace, name: &str) -> Result<Self, InvalidNameError> {
        let mut elements = namespace.elements().to_vec();
        elements.push(name.to_string());
        Self::new(elements)
    }

    /// Key for a schema-qualified table name.
    pub fn from_table(table: &SchemaTableName) -> Result<Self, InvalidNameError> {
        Self::of(&Namespace::parse(&table.schema)?, &table.table)
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn namespace(&self) -> Namespace {
        Namespace {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        }
    }

    /// the last element
    pub fn name(&self) -> &str {
        &self.elements[self.elements.len() - 1]
    }

    pub fn to_table_name(&self) -> SchemaTableName {
        SchemaTableName::new(self.namespace().name(), self.name())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.elements.join("."))
    }
}

/// A table name as the query engine sees it: `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaTableName {
    pub schema: String,
    pub table: String,
}

impl SchemaTableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Split `schema.table` on its last dot.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (schema, table) = qualified.rsplit_once('.')?;
        if schema.is_empty() || table.is_empty() {
            return None;
        }
        Some(Self::new(schema, table))
    }
}

impl fmt::Display for SchemaTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// The pointer stored for a table.
///
/// Everything else about the table lives in the metadata file that
/// `metadata_location` names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcebergTable {
    pub id: String,
    pub metadata_location: String,
    pub snapshot_id: i64,
    pub schema_id: i32,
    pub spec_id: i32,
    pub sort_order_id: i32,
}

impl IcebergTable {
    /// Create a pointer with a freshly generated content id.
    pub fn new(
        metadata_location: impl Into<String>,
        snapshot_id: i64,
        schema_id: i32,
        spec_id: i32,
        sort_order_id: i32,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            metadata_location: metadata_location.into(),
            snapshot_id,
            schema_id,
            spec_id,
            sort_order_id,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Kinds of content the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    IcebergTable,
    Namespace,
}

/// A value stored under a [`ContentKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Content {
    IcebergTable(IcebergTable),
    Namespace(Namespace),
}

impl Content {
    pub fn content_type(&self) -> ContentType {
        match self {
            Content::IcebergTable(_) => ContentType::IcebergTable,
            Content::Namespace(_) => ContentType::Namespace,
        }
    }

    pub fn into_table(self) -> Option<IcebergTable> {
        match self {
            Content::IcebergTable(table) => Some(table),
            Content::Namespace(_) => None,
        }
    }
}

/// One line of an entry listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: ContentKey,
    pub content_type: ContentType,
}

/// A single change inside a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Put { key: ContentKey, content: Content },
    Delete { key: ContentKey },
}

impl Operation {
    pub fn put(key: ContentKey, content: Content) -> Self {
        Operation::Put { key, content }
    }

    pub fn delete(key: ContentKey) -> Self {
        Operation::Delete { key }
    }

    pub fn key(&self) -> &ContentKey {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

/// Author and message attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub author: String,
    pub message: String,
    pub commit_time: DateTime<Utc>,
}

impl CommitMeta {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            commit_time: Utc::now(),
        }
    }
}

/// error type for invalid key elements and namespace names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidNameError {}
