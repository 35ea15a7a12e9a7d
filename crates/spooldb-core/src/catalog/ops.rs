//! Catalog operations: create, drop, get, and list tables.
//!
//! These functions only touch the in-memory catalog; callers persist it
//! with [`Catalog::persist`] once the backing files are in the right state.

use crate::error::{Result, SchemaError};
use crate::types::{TableSchema, validate_table_name};

use super::Catalog;

/// Register a new table.
///
/// Fails with `TableAlreadyExists` instead of overwriting an existing
/// schema.
pub fn create_table(catalog: &mut Catalog, name: &str, schema: TableSchema) -> Result<()> {
    validate_table_name(name)?;
    if catalog.tables().contains_key(name) {
        return Err(SchemaError::TableAlreadyExists(name.to_string()).into());
    }
    catalog.tables_mut().insert(name.to_string(), schema);
    Ok(())
}

/// Remove a table, returning its schema.
pub fn drop_table(catalog: &mut Catalog, name: &str) -> Result<TableSchema> {
    catalog
        .tables_mut()
        .shift_remove(name)
        .ok_or_else(|| SchemaError::TableNotFound(name.to_string()).into())
}

/// Look up a table's schema by name.
pub fn get_table<'a>(catalog: &'a Catalog, name: &str) -> Result<&'a TableSchema> {
    catalog
        .tables()
        .get(name)
        .ok_or_else(|| SchemaError::TableNotFound(name.to_string()).into())
}

/// List all table names in creation order.
pub fn list_tables(catalog: &Catalog) -> Vec<String> {
    catalog.tables().keys().cloned().collect()
}
