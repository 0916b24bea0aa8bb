//! Executes parsed statements against a catalog.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::{CatalogError, SchemaBuilder, VersionedCatalog};
use crate::model::Reference;
use crate::sql::{CreateTable, ParseError, Parser, Statement};

pub type ShellResult<T> = Result<T, ShellError>;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutput {
    Message(String),
    Rows {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl ShellOutput {
    fn message(text: impl Into<String>) -> Self {
        ShellOutput::Message(text.into())
    }

    fn rows(header: &[&str], rows: Vec<Vec<String>>) -> Self {
        ShellOutput::Rows {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }
}

/// A shell session: one catalog, one user.
pub struct Session {
    catalog: VersionedCatalog,
}

impl Session {
    pub fn new(catalog: VersionedCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &VersionedCatalog {
        &self.catalog
    }

    /// Parse and run one statement.
    pub fn execute(&self, sql: &str) -> ShellResult<ShellOutput> {
        let statement = Parser::parse(sql)?;
        self.execute_statement(statement)
    }

    pub fn execute_statement(&self, statement: Statement) -> ShellResult<ShellOutput> {
        let catalog = &self.catalog;
        let output = match statement {
            Statement::ShowSchemas => {
                let mut names = catalog.list_namespaces()?;
                names.sort();
                ShellOutput::rows(&["Schema"], names.into_iter().map(|n| vec![n]).collect())
            }
            Statement::ShowTables { schema } => {
                let mut tables = catalog.list_tables(schema.as_deref())?;
                tables.sort();
                ShellOutput::rows(
                    &["Schema", "Table"],
                    tables.into_iter().map(|t| vec![t.schema, t.table]).collect(),
                )
            }
            Statement::ShowBranch => {
                let reference = catalog.current_reference()?;
                let kind = match reference {
                    Reference::Branch(_) => "BRANCH",
                    Reference::Tag(_) => "TAG",
                };
                ShellOutput::rows(
                    &["Reference", "Type", "Hash"],
                    vec![vec![
                        reference.name().to_string(),
                        kind.to_string(),
                        reference.hash().to_string(),
                    ]],
                )
            }
            Statement::CreateSchema { name, if_not_exists } => {
                match catalog.create_namespace(&name, &BTreeMap::new()) {
                    Ok(()) => ShellOutput::message("CREATE SCHEMA"),
                    Err(CatalogError::SchemaAlreadyExists(_)) if if_not_exists => {
                        ShellOutput::message(format!("schema {} already exists, skipped", name))
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Statement::DropSchema { name, if_exists } => match catalog.drop_namespace(&name) {
                Ok(()) => ShellOutput::message("DROP SCHEMA"),
                Err(CatalogError::SchemaNotFound(_)) if if_exists => {
                    ShellOutput::message(format!("schema {} does not exist, skipped", name))
                }
                Err(e) => return Err(e.into()),
            },
            Statement::CreateTable(create) => self.create_table(create)?,
            Statement::DropTable { name, if_exists } => match catalog.drop_table(&name) {
                Ok(()) => ShellOutput::message("DROP TABLE"),
                Err(CatalogError::TableNotFound(_)) if if_exists => {
                    ShellOutput::message(format!("table {} does not exist, skipped", name))
                }
                Err(e) => return Err(e.into()),
            },
            Statement::RenameTable { from, to } => {
                catalog.rename_table(&from, &to)?;
                ShellOutput::message("RENAME TABLE")
            }
            Statement::Describe(name) => {
                let table = catalog.load_table(&name)?;
                let rows = table
                    .metadata
                    .current_schema()
                    .map(|schema| {
                        schema
                            .fields
                            .iter()
                            .map(|field| {
                                vec![
                                    field.name.clone(),
                                    field.field_type.sql_name(),
                                    if field.required { "NO" } else { "YES" }.to_string(),
                                    field.doc.clone().unwrap_or_default(),
                                ]
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ShellOutput::rows(&["Column", "Type", "Nullable", "Comment"], rows)
            }
        };
        Ok(output)
    }

    fn create_table(&self, create: CreateTable) -> ShellResult<ShellOutput> {
        let mut builder = SchemaBuilder::new();
        for column in create.columns {
            builder = match column.comment {
                Some(doc) => {
                    builder.add_documented_column(column.name, column.data_type, column.not_null, doc)
                }
                None if column.not_null => builder.add_required_column(column.name, column.data_type),
                None => builder.add_column(column.name, column.data_type),
            };
        }
        let schema = builder.build().map_err(CatalogError::from)?;

        match self
            .catalog
            .create_table(&create.name, schema, None, BTreeMap::new())
        {
            Ok(table) => Ok(ShellOutput::message(format!(
                "CREATE TABLE at {}",
                table.metadata.location
            ))),
            Err(CatalogError::TableAlreadyExists(_)) if create.if_not_exists => Ok(
                ShellOutput::message(format!("table {} already exists, skipped", create.name)),
            ),
            Err(e) => Err(e.into()),
        }
    }
}
