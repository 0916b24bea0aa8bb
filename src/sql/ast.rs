//! Statements the catalog shell understands.
//!
//! Only definition statements: the shell edits the catalog, it never reads
//! or writes table data.

use crate::catalog::DataType;
use crate::model::SchemaTableName;

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// SHOW SCHEMAS
    ShowSchemas,
    /// SHOW TABLES [FROM schema]
    ShowTables { schema: Option<String> },
    /// SHOW BRANCH
    ShowBranch,
    CreateSchema { name: String, if_not_exists: bool },
    DropSchema { name: String, if_exists: bool },
    CreateTable(CreateTable),
    DropTable { name: SchemaTableName, if_exists: bool },
    /// ALTER TABLE from RENAME TO to
    RenameTable { from: SchemaTableName, to: SchemaTableName },
    Describe(SchemaTableName),
}

/// CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: SchemaTableName,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

/// Column definition in CREATE TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    pub comment: Option<String>,
}
