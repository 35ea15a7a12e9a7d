//! Table catalog: schema storage, create/drop/list operations, coercion.
//!
//! The catalog of a database is a single JSON line in `metadata.jsonl`
//! mapping each table name to its schema (`field -> "int"|"float"|"bool"|"str"`).
//! Database handles reload it for every operation; it is rewritten
//! atomically after every mutation.

pub mod coerce;
pub mod ops;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Result, StorageError};
use crate::storage::replace_atomically;
use crate::types::TableSchema;

/// In-memory view of a database's catalog file.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    tables: IndexMap<String, TableSchema>,
}

impl Catalog {
    /// Write an empty catalog to `path` and return it.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let catalog = Self {
            path: path.into(),
            tables: IndexMap::new(),
        };
        catalog.persist()?;
        Ok(catalog)
    }

    /// Load the catalog stored at `path`.
    ///
    /// Only the first line is significant. A missing file surfaces as
    /// `FileNotFound`; anything unparsable as `MalformedCatalog`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::FileNotFound(path.clone()),
            _ => StorageError::Io(e),
        })?;

        let mut first = String::new();
        BufReader::new(file).read_line(&mut first)?;
        let tables = serde_json::from_str(first.trim_end_matches(['\n', '\r'])).map_err(|e| {
            StorageError::MalformedCatalog {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self { path, tables })
    }

    /// Rewrite the catalog file from the in-memory state.
    pub fn persist(&self) -> Result<()> {
        replace_atomically(&self.path, "metadata", |w| w.write(&self.tables))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All tables and their schemas, in creation order.
    pub fn tables(&self) -> &IndexMap<String, TableSchema> {
        &self.tables
    }

    pub(crate) fn tables_mut(&mut self) -> &mut IndexMap<String, TableSchema> {
        &mut self.tables
    }
}
