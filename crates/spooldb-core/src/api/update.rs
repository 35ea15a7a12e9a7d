//! Field assignments applied by `update_record`.

use crate::error::Result;
use crate::types::{Record, validate_scalars};

/// Check that an assignment map only carries scalar values.
pub fn validate_assignments(assignments: &Record) -> Result<()> {
    validate_scalars(assignments)
}

/// Overwrite every assigned field of `record`.
///
/// Existing fields keep their position; new ones are appended after the
/// record's own fields, in assignment order.
pub fn apply_assignments(record: &mut Record, assignments: &Record) {
    for (name, value) in assignments {
        record.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut doc = rec(json!({"a": 1, "b": 2, "c": 3}));
        apply_assignments(&mut doc, &rec(json!({"b": 20})));
        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(doc["b"], json!(20));
    }

    #[test]
    fn test_new_fields_are_appended() {
        let mut doc = rec(json!({"a": 1}));
        apply_assignments(&mut doc, &rec(json!({"z": true, "m": "x"})));
        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, ["a", "z", "m"]);
    }

    #[test]
    fn test_empty_assignments_leave_record_alone() {
        let mut doc = rec(json!({"a": 1}));
        apply_assignments(&mut doc, &Record::new());
        assert_eq!(doc, rec(json!({"a": 1})));
    }

    #[test]
    fn test_validate_assignments_rejects_nested() {
        let err = validate_assignments(&rec(json!({"a": {"b": 1}}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        validate_assignments(&rec(json!({"a": 1.5}))).unwrap();
    }
}
