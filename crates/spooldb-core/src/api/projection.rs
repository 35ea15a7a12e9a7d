//! Projection: keep only the named fields of a record.

use crate::error::Result;
use crate::types::{Record, field};

/// Build a record holding exactly `fields`, in the order given.
///
/// Every named field must be present; an absent one fails with
/// `FieldNotFound`. Naming a field twice keeps its first position.
pub fn apply_projection(record: &Record, fields: &[String]) -> Result<Record> {
    let mut result = Record::new();
    for name in fields {
        let value = field(record, name)?;
        result.insert(name.clone(), value.clone());
    }
    Ok(result)
}
