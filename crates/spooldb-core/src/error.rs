//! Error types for all SpoolDB operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ScalarType;

/// Top-level error type for SpoolDB operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("database already exists: {0}")]
    DatabaseAlreadyExists(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("malformed record at {}:{line}: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("malformed catalog {}: {reason}", path.display())]
    MalformedCatalog { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("field '{field}' is not declared in the schema of table '{table}'")]
    UnknownField { table: String, field: String },

    #[error("cannot coerce field '{field}' value {value} to {expected}")]
    TypeMismatch {
        field: String,
        expected: ScalarType,
        value: serde_json::Value,
    },

    #[error("field '{field}' holds a non-scalar value: {value}")]
    NonScalarValue {
        field: String,
        value: serde_json::Value,
    },

    #[error("catalog and files disagree on table '{table}': {detail}")]
    CatalogConflict { table: String, detail: String },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("cannot aggregate field '{0}' over an empty sequence")]
    EmptyAggregate(String),

    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("invalid aggregate: {0}")]
    InvalidAggregate(String),

    #[error("values of field '{field}' are not comparable: {left} vs {right}")]
    IncomparableValues {
        field: String,
        left: serde_json::Value,
        right: serde_json::Value,
    },
}

/// Coarse classification of an [`Error`], independent of where it arose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    SchemaViolation,
    MalformedRecord,
    FieldNotFound,
    EmptyAggregate,
    ConflictingCatalogState,
    InvalidArgument,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Storage(e) => match e {
                StorageError::Io(_) | StorageError::InvalidConfig(_) => ErrorKind::Io,
                StorageError::DatabaseNotFound(_) | StorageError::FileNotFound(_) => {
                    ErrorKind::NotFound
                }
                StorageError::DatabaseAlreadyExists(_) => ErrorKind::AlreadyExists,
                StorageError::MalformedRecord { .. } | StorageError::MalformedCatalog { .. } => {
                    ErrorKind::MalformedRecord
                }
            },
            Error::Schema(e) => match e {
                SchemaError::TableNotFound(_) => ErrorKind::NotFound,
                SchemaError::TableAlreadyExists(_) => ErrorKind::AlreadyExists,
                SchemaError::CatalogConflict { .. } => ErrorKind::ConflictingCatalogState,
                SchemaError::InvalidName(_)
                | SchemaError::UnknownField { .. }
                | SchemaError::TypeMismatch { .. }
                | SchemaError::NonScalarValue { .. } => ErrorKind::SchemaViolation,
            },
            Error::Query(e) => match e {
                QueryError::FieldNotFound(_) => ErrorKind::FieldNotFound,
                QueryError::EmptyAggregate(_) => ErrorKind::EmptyAggregate,
                QueryError::InvalidChunkSize
                | QueryError::InvalidExpression(_)
                | QueryError::InvalidAggregate(_)
                | QueryError::IncomparableValues { .. } => ErrorKind::InvalidArgument,
            },
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Storage(StorageError::Io(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
