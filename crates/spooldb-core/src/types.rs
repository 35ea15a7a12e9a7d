//! Core types: records, scalar types, table schemas, file-name constants.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QueryError, Result, SchemaError};

/// A single row: field name to scalar value, in insertion order.
///
/// Values are restricted to integers, floats, booleans and strings. The
/// on-disk form is one compact JSON object per line.
pub type Record = Map<String, Value>;

/// Declared field types of a table, in declaration order.
pub type TableSchema = IndexMap<String, ScalarType>;

/// Name of the per-database catalog file.
pub const METADATA_FILE: &str = "metadata.jsonl";

/// Extension of table and scratch files.
pub const TABLE_EXTENSION: &str = "jsonl";

/// Default number of records per in-memory sort batch.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// The declared type of a table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "str")]
    Str,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
            ScalarType::Str => "str",
        };
        f.write_str(name)
    }
}

/// Look up a field on a record, failing with `FieldNotFound` if absent.
pub fn field<'a>(record: &'a Record, name: &str) -> Result<&'a Value> {
    record
        .get(name)
        .ok_or_else(|| QueryError::FieldNotFound(name.to_string()).into())
}

/// Whether a JSON value is one of the four storable scalar kinds.
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Reject records holding null, array or object values.
pub fn validate_scalars(record: &Record) -> Result<()> {
    for (name, value) in record {
        if !is_scalar(value) {
            return Err(SchemaError::NonScalarValue {
                field: name.clone(),
                value: value.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Check that a database or table name can be used as a single path component.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.starts_with('.');
    if bad {
        return Err(SchemaError::InvalidName(name.to_string()).into());
    }
    Ok(())
}

/// Like [`validate_name`], and also rejects names whose backing file would
/// be the catalog file.
pub fn validate_table_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if format!("{name}.{TABLE_EXTENSION}") == METADATA_FILE {
        return Err(SchemaError::InvalidName(name.to_string()).into());
    }
    Ok(())
}
