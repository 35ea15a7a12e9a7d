use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{self, Catalog, coerce};
use crate::error::{Error, Result, SchemaError, StorageError};
use crate::query::{
    self, AggregateSpec, GroupAggregate, NestedLoopJoin, Predicate, Predicates, SortMerge, matches,
};
use crate::storage::{RecordReader, ScratchDir, append_record, replace_atomically};
use crate::types::{METADATA_FILE, Record, TABLE_EXTENSION, TableSchema, validate_scalars};

use super::builders::{DeleteBuilder, QueryBuilder, TableBuilder, UpdateBuilder};
use super::update::{apply_assignments, validate_assignments};

/// Handle to one database directory.
///
/// Obtained from [`Engine::open`](super::Engine::open) or
/// [`Engine::create_database`](super::Engine::create_database). The catalog
/// is read from disk by every operation, so two handles on the same
/// directory always agree. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    dir: PathBuf,
    scratch: ScratchDir,
    chunk_size: usize,
}

impl Database {
    pub(crate) fn new(name: String, dir: PathBuf, scratch: ScratchDir, chunk_size: usize) -> Self {
        Self {
            name,
            dir,
            scratch,
            chunk_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the catalog and table files.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Scratch space used by joins, group-by and sorts started from this
    /// handle.
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Batch size used by [`Database::sort_merge`].
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Load the current catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        Catalog::load(self.dir.join(METADATA_FILE)).map_err(|e| match e {
            Error::Storage(StorageError::FileNotFound(_)) => {
                StorageError::DatabaseNotFound(self.name.clone()).into()
            }
            other => other,
        })
    }

    fn file_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.{TABLE_EXTENSION}"))
    }

    // -----------------------------------------------------------------------
    // Tables
    // -----------------------------------------------------------------------

    /// Create a table.
    pub fn create_table(&self, name: &str) -> TableBuilder<'_> {
        TableBuilder::new(self, name.to_string())
    }

    /// Create a table from a complete schema.
    ///
    /// The backing file is created before the catalog entry is persisted.
    /// A name already in the catalog fails with `TableAlreadyExists`; a
    /// stray file without a catalog entry fails with `CatalogConflict`.
    pub fn create_table_with_schema(&self, name: &str, schema: TableSchema) -> Result<()> {
        let mut catalog = self.catalog()?;
        catalog::ops::create_table(&mut catalog, name, schema)?;

        let path = self.file_for(name);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| -> Error {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    SchemaError::CatalogConflict {
                        table: name.to_string(),
                        detail: "backing file exists without a catalog entry".to_string(),
                    }
                    .into()
                } else {
                    e.into()
                }
            })?;

        if let Err(e) = catalog.persist() {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        debug!(db = %self.name, table = name, "created table");
        Ok(())
    }

    /// Drop a table: the catalog entry goes first, then the file.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut catalog = self.catalog()?;
        catalog::ops::drop_table(&mut catalog, name)?;
        catalog.persist()?;
        match fs::remove_file(self.file_for(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(db = %self.name, table = name, "dropped table");
        Ok(())
    }

    /// List all table names, in creation order.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        Ok(catalog::ops::list_tables(&self.catalog()?))
    }

    /// Describe a table's schema.
    pub fn describe_table(&self, name: &str) -> Result<TableSchema> {
        let catalog = self.catalog()?;
        catalog::ops::get_table(&catalog, name).cloned()
    }

    /// Check that catalog entries and table files correspond one to one.
    ///
    /// Hidden files (leftover mutation temp files) are ignored.
    pub fn check_consistency(&self) -> Result<()> {
        let catalog = self.catalog()?;
        for table in catalog.tables().keys() {
            if !self.file_for(table).is_file() {
                return Err(SchemaError::CatalogConflict {
                    table: table.clone(),
                    detail: "catalog entry without a backing file".to_string(),
                }
                .into());
            }
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name == METADATA_FILE || file_name.starts_with('.') {
                continue;
            }
            if let Some(table) = file_name.strip_suffix(&format!(".{TABLE_EXTENSION}"))
                && !catalog.tables().contains_key(table)
            {
                return Err(SchemaError::CatalogConflict {
                    table: table.to_string(),
                    detail: "backing file without a catalog entry".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Resolve a table's backing file, checking both catalog and disk.
    pub fn table_path(&self, table: &str) -> Result<PathBuf> {
        let catalog = self.catalog()?;
        catalog::ops::get_table(&catalog, table)?;
        let path = self.file_for(table);
        if !path.is_file() {
            return Err(SchemaError::CatalogConflict {
                table: table.to_string(),
                detail: "catalog entry without a backing file".to_string(),
            }
            .into());
        }
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Stream every record of a table, in file order.
    pub fn scan(&self, table: &str) -> Result<RecordReader> {
        RecordReader::open(self.table_path(table)?)
    }

    /// Convert `values` to the table's declared field types.
    ///
    /// Never applied implicitly by [`Database::insert_record`] or
    /// [`Database::update_record`].
    pub fn coerce_record(&self, table: &str, values: &Record) -> Result<Record> {
        let schema = self.describe_table(table)?;
        coerce::coerce_record(table, &schema, values)
    }

    /// Append one record to a table.
    pub fn insert_record(&self, table: &str, record: &Record) -> Result<()> {
        validate_scalars(record)?;
        let path = self.table_path(table)?;
        append_record(record, &path)?;
        debug!(db = %self.name, table, "inserted record");
        Ok(())
    }

    /// Update a table.
    pub fn update(&self, table: &str) -> UpdateBuilder<'_> {
        UpdateBuilder::new(self, table.to_string())
    }

    /// Overwrite `assignments` on every record matching all `predicates`.
    ///
    /// The table is rewritten into a temp file in the database directory and
    /// renamed over the original; on error the original is left untouched.
    /// Returns the number of updated records.
    pub fn update_record(
        &self,
        table: &str,
        assignments: &Record,
        predicates: &[Box<dyn Predicate>],
    ) -> Result<usize> {
        validate_assignments(assignments)?;
        let path = self.table_path(table)?;
        let reader = RecordReader::open(&path)?;
        let updated = replace_atomically(&path, "update_record", |w| {
            let mut updated = 0;
            for record in reader {
                let mut record = record?;
                if matches(&record, predicates)? {
                    apply_assignments(&mut record, assignments);
                    updated += 1;
                }
                w.write(&record)?;
            }
            Ok(updated)
        })?;
        debug!(db = %self.name, table, updated, "updated records");
        Ok(updated)
    }

    /// Delete from a table.
    pub fn delete(&self, table: &str) -> DeleteBuilder<'_> {
        DeleteBuilder::new(self, table.to_string())
    }

    /// Remove every record matching all `predicates`, with the same
    /// rewrite-and-rename protocol as [`Database::update_record`].
    ///
    /// Returns the number of deleted records.
    pub fn delete_record(&self, table: &str, predicates: &[Box<dyn Predicate>]) -> Result<usize> {
        let path = self.table_path(table)?;
        let reader = RecordReader::open(&path)?;
        let deleted = replace_atomically(&path, "delete_record", |w| {
            let mut deleted = 0;
            for record in reader {
                let record = record?;
                if matches(&record, predicates)? {
                    deleted += 1;
                } else {
                    w.write(&record)?;
                }
            }
            Ok(deleted)
        })?;
        debug!(db = %self.name, table, deleted, "deleted records");
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Operators bound to this database's scratch space
    // -----------------------------------------------------------------------

    /// Build a query pipeline starting from a table scan.
    pub fn query(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table.to_string())
    }

    pub fn cross_product<L, R>(&self, left: L, right: R) -> NestedLoopJoin<L::IntoIter, R>
    where
        L: IntoIterator<Item = Result<Record>>,
        R: IntoIterator<Item = Result<Record>>,
    {
        query::cross_product(left, right, &self.scratch)
    }

    pub fn theta_inner_join<L, R>(
        &self,
        left: L,
        right: R,
        predicates: Predicates,
    ) -> NestedLoopJoin<L::IntoIter, R>
    where
        L: IntoIterator<Item = Result<Record>>,
        R: IntoIterator<Item = Result<Record>>,
    {
        query::theta_inner_join(left, right, predicates, &self.scratch)
    }

    pub fn group_by_and_aggregate<I>(
        &self,
        input: I,
        group_by: Vec<String>,
        aggregates: Vec<AggregateSpec>,
    ) -> GroupAggregate<I::IntoIter>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        query::group_by_and_aggregate(input, group_by, aggregates, &self.scratch)
    }

    /// Sort with the configured default chunk size.
    pub fn sort_merge<I>(&self, input: I, key: &str, ascending: bool) -> SortMerge<I::IntoIter>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        query::sort_merge(input, key, ascending, self.chunk_size, &self.scratch)
    }
}
