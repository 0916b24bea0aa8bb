//! Column types and fields for table schemas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primitive column types a catalog table may use.
///
/// Serialized in metadata files using the lower-case names of the table
/// format (`long`, `decimal(10,2)`, `timestamptz`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Date,
    Time,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    Timestamptz,
    String,
    Uuid,
    Binary,
}

impl DataType {
    /// Get the SQL name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            DataType::Boolean => "BOOLEAN".into(),
            DataType::Int => "INTEGER".into(),
            DataType::Long => "BIGINT".into(),
            DataType::Float => "REAL".into(),
            DataType::Double => "DOUBLE".into(),
            DataType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            DataType::Date => "DATE".into(),
            DataType::Time => "TIME(6)".into(),
            DataType::Timestamp => "TIMESTAMP(6)".into(),
            DataType::Timestamptz => "TIMESTAMP(6) WITH TIME ZONE".into(),
            DataType::String => "VARCHAR".into(),
            DataType::Uuid => "UUID".into(),
            DataType::Binary => "VARBINARY".into(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "boolean"),
            DataType::Int => write!(f, "int"),
            DataType::Long => write!(f, "long"),
            DataType::Float => write!(f, "float"),
            DataType::Double => write!(f, "double"),
            DataType::Decimal { precision, scale } => write!(f, "decimal({},{})", precision, scale),
            DataType::Date => write!(f, "date"),
            DataType::Time => write!(f, "time"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::Timestamptz => write!(f, "timestamptz"),
            DataType::String => write!(f, "string"),
            DataType::Uuid => write!(f, "uuid"),
            DataType::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let parsed = match lower.as_str() {
            "boolean" => DataType::Boolean,
            "int" => DataType::Int,
            "long" => DataType::Long,
            "float" => DataType::Float,
            "double" => DataType::Double,
            "date" => DataType::Date,
            "time" => DataType::Time,
            "timestamp" => DataType::Timestamp,
            "timestamptz" => DataType::Timestamptz,
            "string" => DataType::String,
            "uuid" => DataType::Uuid,
            "binary" => DataType::Binary,
            other => {
                let args = other
                    .strip_prefix("decimal(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown type: {}", s))?;
                let (p, sc) = args
                    .split_once(',')
                    .ok_or_else(|| format!("decimal needs precision and scale: {}", s))?;
                let precision: u32 = p.trim().parse().map_err(|_| format!("bad precision: {}", s))?;
                let scale: u32 = sc.trim().parse().map_err(|_| format!("bad scale: {}", s))?;
                if precision == 0 || precision > 38 || scale > precision {
                    return Err(format!("decimal precision/scale out of range: {}", s));
                }
                DataType::Decimal { precision, scale }
            }
        };
        Ok(parsed)
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

/// One column of a schema, identified by a field id that stays stable
/// across renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedField {
    pub id: i32,
    pub name: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl NestedField {
    pub fn optional(id: i32, name: impl Into<String>, field_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            required: false,
            field_type,
            doc: None,
        }
    }

    pub fn required(id: i32, name: impl Into<String>, field_type: DataType) -> Self {
        Self {
            required: true,
            ..Self::optional(id, name, field_type)
        }
    }

    /// Set the column comment.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl fmt::Display for NestedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.field_type.sql_name())?;
        if self.required {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}
