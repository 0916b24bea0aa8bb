//! Table schema definitions and validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::types::{DataType, NestedField};

/// A versioned table schema.
///
/// Tables keep every schema they ever had; `schema_id` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Schema {
    pub schema_id: i32,
    pub fields: Vec<NestedField>,
}

impl Schema {
    /// Get a field by column name.
    pub fn field(&self, name: &str) -> Option<&NestedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Highest field id in use, 0 for an empty schema.
    pub fn highest_field_id(&self) -> i32 {
        self.fields.iter().map(|f| f.id).max().unwrap_or(0)
    }

    /// Validate the schema itself.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::NoColumns);
        }

        // Check for duplicate column names and ids
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.to_ascii_lowercase()) {
                return Err(SchemaError::DuplicateColumn(field.name.clone()));
            }
            if !ids.insert(field.id) {
                return Err(SchemaError::DuplicateFieldId(field.id));
            }
        }

        Ok(())
    }
}

/// Schema-related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("duplicate field id: {0}")]
    DuplicateFieldId(i32),

    #[error("a table needs at least one column")]
    NoColumns,
}

/// Builder for creating table schemas.
///
/// Field ids are assigned in column order starting at 1.
pub struct SchemaBuilder {
    schema_id: i32,
    fields: Vec<NestedField>,
}

impl SchemaBuilder {
    /// Start building a new schema.
    pub fn new() -> Self {
        Self {
            schema_id: 0,
            fields: Vec::new(),
        }
    }

    pub fn schema_id(mut self, schema_id: i32) -> Self {
        self.schema_id = schema_id;
        self
    }

    fn next_id(&self) -> i32 {
        self.fields.len() as i32 + 1
    }

    /// Add a nullable column.
    pub fn add_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let field = NestedField::optional(self.next_id(), name, data_type);
        self.fields.push(field);
        self
    }

    /// Add a non-nullable column.
    pub fn add_required_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let field = NestedField::required(self.next_id(), name, data_type);
        self.fields.push(field);
        self
    }

    /// Add a column with a comment.
    pub fn add_documented_column(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        required: bool,
        doc: impl Into<String>,
    ) -> Self {
        let id = self.next_id();
        let field = if required {
            NestedField::required(id, name, data_type)
        } else {
            NestedField::optional(id, name, data_type)
        };
        self.fields.push(field.with_doc(doc));
        self
    }

    /// Build the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let schema = Schema {
            schema_id: self.schema_id,
            fields: self.fields,
        };
        schema.validate()?;
        Ok(schema)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
