//! The predicate capability and AND-evaluation over predicate lists.

use crate::error::Result;
use crate::types::Record;

/// A boolean test over a record.
///
/// Implemented for [`FilterExpr`](crate::api::FilterExpr) and for any
/// closure `Fn(&Record) -> Result<bool>`. A predicate that references a
/// field the record lacks should fail with `FieldNotFound` rather than
/// answer `false`; [`field`](crate::types::field) does that lookup.
pub trait Predicate {
    fn test(&self, record: &Record) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&Record) -> Result<bool>,
{
    fn test(&self, record: &Record) -> Result<bool> {
        self(record)
    }
}

/// A list of predicates combined with AND.
pub type Predicates = Vec<Box<dyn Predicate>>;

/// Box a closure as a predicate.
///
/// Mostly a type-inference aid: closures passed here get their argument
/// type from the `Fn(&Record)` bound.
pub fn predicate<F>(f: F) -> Box<dyn Predicate>
where
    F: Fn(&Record) -> Result<bool> + 'static,
{
    Box::new(f)
}

/// Whether `record` satisfies every predicate. An empty list matches.
///
/// Stops at the first predicate that answers `false`; errors propagate.
pub fn matches(record: &Record, predicates: &[Box<dyn Predicate>]) -> Result<bool> {
    for p in predicates {
        if !p.test(record)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::field;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_empty_list_matches() {
        assert!(matches(&rec(json!({"a": 1})), &[]).unwrap());
    }

    #[test]
    fn test_all_must_hold() {
        let preds: Predicates = vec![
            predicate(|r| Ok(field(r, "a")? == &json!(1))),
            predicate(|r| Ok(field(r, "b")?.as_i64() > Some(5))),
        ];
        assert!(matches(&rec(json!({"a": 1, "b": 6})), &preds).unwrap());
        assert!(!matches(&rec(json!({"a": 1, "b": 5})), &preds).unwrap());
        assert!(!matches(&rec(json!({"a": 2, "b": 6})), &preds).unwrap());
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let preds: Predicates = vec![predicate(|r| Ok(field(r, "zzz")? == &json!(1)))];
        let err = matches(&rec(json!({"a": 1})), &preds).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
    }

    #[test]
    fn test_short_circuit_skips_later_predicates() {
        let preds: Predicates = vec![
            predicate(|_| Ok(false)),
            predicate(|r| Ok(field(r, "missing")?.is_null())),
        ];
        assert!(!matches(&rec(json!({"a": 1})), &preds).unwrap());
    }
}
