//! SQL parser implementation.
//!
//! Converts SQL strings to our statements using sqlparser.

use sqlparser::ast as sp;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;

use super::ast::*;
use super::error::{ParseError, ParseResult};
use crate::catalog::DataType;
use crate::model::SchemaTableName;

/// DDL parser for the catalog shell.
pub struct Parser;

impl Parser {
    /// Parse one statement. A trailing semicolon is allowed.
    pub fn parse(sql: &str) -> ParseResult<Statement> {
        let sql = sql.trim().trim_end_matches(';').trim();
        if sql.is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        if let Some(stmt) = Self::parse_special(sql)? {
            return Ok(stmt);
        }

        let dialect = GenericDialect {};
        let statements = SqlParser::parse_sql(&dialect, sql)?;

        if statements.is_empty() {
            return Err(ParseError::EmptyQuery);
        }
        if statements.len() > 1 {
            return Err(ParseError::MultipleStatements);
        }

        Self::convert_statement(&statements[0])
    }

    /// SHOW and DESCRIBE forms sqlparser does not map onto catalog objects.
    fn parse_special(sql: &str) -> ParseResult<Option<Statement>> {
        let words: Vec<&str> = sql.split_whitespace().collect();
        let upper: Vec<String> = words.iter().map(|w| w.to_ascii_uppercase()).collect();
        let upper: Vec<&str> = upper.iter().map(String::as_str).collect();

        let stmt = match upper.as_slice() {
            ["SHOW", "SCHEMAS"] => Statement::ShowSchemas,
            ["SHOW", "TABLES"] => Statement::ShowTables { schema: None },
            ["SHOW", "TABLES", "FROM" | "IN", _] => Statement::ShowTables {
                schema: Some(words[3].to_string()),
            },
            ["SHOW", "BRANCH"] => Statement::ShowBranch,
            ["DESCRIBE" | "DESC", _] => Statement::Describe(Self::qualified_name(words[1])?),
            ["DESCRIBE" | "DESC"] => {
                return Err(ParseError::MissingClause("table name".into()));
            }
            ["SHOW", ..] => return Err(ParseError::UnsupportedStatement(sql.to_string())),
            _ => return Ok(None),
        };
        Ok(Some(stmt))
    }

    fn convert_statement(stmt: &sp::Statement) -> ParseResult<Statement> {
        match stmt {
            sp::Statement::CreateTable(create) => Self::convert_create_table(create),
            sp::Statement::CreateSchema {
                schema_name,
                if_not_exists,
                ..
            } => match schema_name {
                sp::SchemaName::Simple(name) => Ok(Statement::CreateSchema {
                    name: Self::schema_name(name)?,
                    if_not_exists: *if_not_exists,
                }),
                other => Err(ParseError::UnsupportedStatement(format!(
                    "CREATE SCHEMA {}",
                    other
                ))),
            },
            sp::Statement::Drop {
                object_type,
                names,
                if_exists,
                ..
            } => Self::convert_drop(object_type, names, *if_exists),
            sp::Statement::AlterTable {
                name, operations, ..
            } => Self::convert_alter_table(name, operations),
            other => Err(ParseError::UnsupportedStatement(other.to_string())),
        }
    }

    fn convert_create_table(create: &sp::CreateTable) -> ParseResult<Statement> {
        if create.query.is_some() {
            return Err(ParseError::UnsupportedStatement(
                "CREATE TABLE ... AS SELECT".into(),
            ));
        }
        if create.columns.is_empty() {
            return Err(ParseError::MissingClause("column list".into()));
        }

        let name = Self::table_name(&create.name)?;
        let columns = create
            .columns
            .iter()
            .map(Self::convert_column_def)
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Statement::CreateTable(CreateTable {
            name,
            columns,
            if_not_exists: create.if_not_exists,
        }))
    }

    fn convert_column_def(col: &sp::ColumnDef) -> ParseResult<ColumnDef> {
        let mut column = ColumnDef {
            name: col.name.value.clone(),
            data_type: Self::convert_data_type(&col.data_type)?,
            not_null: false,
            comment: None,
        };

        for opt in &col.options {
            match &opt.option {
                sp::ColumnOption::Null => column.not_null = false,
                sp::ColumnOption::NotNull => column.not_null = true,
                sp::ColumnOption::Comment(text) => column.comment = Some(text.clone()),
                other => {
                    return Err(ParseError::UnsupportedStatement(format!(
                        "column option {}",
                        other
                    )))
                }
            }
        }
        Ok(column)
    }

    fn convert_data_type(dt: &sp::DataType) -> ParseResult<DataType> {
        match dt {
            sp::DataType::Boolean | sp::DataType::Bool => Ok(DataType::Boolean),

            sp::DataType::TinyInt(_)
            | sp::DataType::SmallInt(_)
            | sp::DataType::Int(_)
            | sp::DataType::Integer(_) => Ok(DataType::Int),

            sp::DataType::BigInt(_) => Ok(DataType::Long),

            sp::DataType::Real => Ok(DataType::Float),

            sp::DataType::Float(_) | sp::DataType::Double(_) | sp::DataType::DoublePrecision => {
                Ok(DataType::Double)
            }

            sp::DataType::Decimal(info) | sp::DataType::Numeric(info) => {
                let text = match info {
                    sp::ExactNumberInfo::None => "decimal(38,0)".to_string(),
                    sp::ExactNumberInfo::Precision(p) => format!("decimal({},0)", p),
                    sp::ExactNumberInfo::PrecisionAndScale(p, s) => format!("decimal({},{})", p, s),
                };
                text.parse().map_err(ParseError::UnsupportedDataType)
            }

            sp::DataType::Date => Ok(DataType::Date),
            sp::DataType::Time(_, _) => Ok(DataType::Time),
            sp::DataType::Timestamp(_, tz) => match tz {
                sp::TimezoneInfo::WithTimeZone | sp::TimezoneInfo::Tz => Ok(DataType::Timestamptz),
                _ => Ok(DataType::Timestamp),
            },

            sp::DataType::Text
            | sp::DataType::Varchar(_)
            | sp::DataType::CharVarying(_)
            | sp::DataType::Character(_)
            | sp::DataType::Char(_)
            | sp::DataType::String(_) => Ok(DataType::String),

            sp::DataType::Uuid => Ok(DataType::Uuid),

            sp::DataType::Binary(_)
            | sp::DataType::Varbinary(_)
            | sp::DataType::Blob(_)
            | sp::DataType::Bytea => Ok(DataType::Binary),

            other => Err(ParseError::UnsupportedDataType(other.to_string())),
        }
    }

    fn convert_drop(
        object_type: &sp::ObjectType,
        names: &[sp::ObjectName],
        if_exists: bool,
    ) -> ParseResult<Statement> {
        let name = match names {
            [name] => name,
            _ => {
                return Err(ParseError::UnsupportedStatement(
                    "DROP of several objects at once".into(),
                ))
            }
        };

        match object_type {
            sp::ObjectType::Table => Ok(Statement::DropTable {
                name: Self::table_name(name)?,
                if_exists,
            }),
            sp::ObjectType::Schema => Ok(Statement::DropSchema {
                name: Self::schema_name(name)?,
                if_exists,
            }),
            other => Err(ParseError::UnsupportedStatement(format!("DROP {}", other))),
        }
    }

    fn convert_alter_table(
        name: &sp::ObjectName,
        operations: &[sp::AlterTableOperation],
    ) -> ParseResult<Statement> {
        match operations {
            [sp::AlterTableOperation::RenameTable { table_name }] => Ok(Statement::RenameTable {
                from: Self::table_name(name)?,
                to: Self::table_name(table_name)?,
            }),
            _ => Err(ParseError::UnsupportedStatement(
                "ALTER TABLE only supports RENAME TO".into(),
            )),
        }
    }

    fn name_parts(name: &sp::ObjectName) -> ParseResult<Vec<String>> {
        name.0
            .iter()
            .map(|part| {
                part.as_ident()
                    .map(|id| id.value.clone())
                    .ok_or_else(|| ParseError::InvalidIdentifier(part.to_string()))
            })
            .collect()
    }

    fn schema_name(name: &sp::ObjectName) -> ParseResult<String> {
        let parts = Self::name_parts(name)?;
        if parts.is_empty() {
            return Err(ParseError::InvalidIdentifier("empty schema name".into()));
        }
        Ok(parts.join("."))
    }

    /// Tables are always named `schema.table`; the schema may itself be
    /// dotted.
    fn table_name(name: &sp::ObjectName) -> ParseResult<SchemaTableName> {
        match Self::name_parts(name)?.as_slice() {
            [schema @ .., table] if !schema.is_empty() => {
                Ok(SchemaTableName::new(schema.join("."), table.clone()))
            }
            _ => Err(ParseError::InvalidIdentifier(format!(
                "table name must be qualified as schema.table: {}",
                name
            ))),
        }
    }

    fn qualified_name(text: &str) -> ParseResult<SchemaTableName> {
        SchemaTableName::parse(text).ok_or_else(|| {
            ParseError::InvalidIdentifier(format!(
                "table name must be qualified as schema.table: {}",
                text
            ))
        })
    }
}
