//! Streaming select and project adaptors.

use crate::api::projection::apply_projection;
use crate::error::Result;
use crate::types::Record;

use super::predicate::{Predicates, matches};

/// Yields the input records that satisfy every predicate, in order.
///
/// Created by [`select`]. Stops after the first error.
pub struct Select<I> {
    input: I,
    predicates: Predicates,
    done: bool,
}

/// Filter a record stream by a list of predicates.
pub fn select<I>(input: I, predicates: Predicates) -> Select<I::IntoIter>
where
    I: IntoIterator<Item = Result<Record>>,
{
    Select {
        input: input.into_iter(),
        predicates,
        done: false,
    }
}

impl<I> Iterator for Select<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let outcome = self
                .input
                .next()?
                .and_then(|record| Ok(matches(&record, &self.predicates)?.then_some(record)));
            match outcome {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Yields each input record restricted to a fixed list of fields.
///
/// Created by [`project`].
pub struct Project<I> {
    input: I,
    fields: Vec<String>,
    done: bool,
}

/// Restrict every record of a stream to `fields`, in that order.
pub fn project<I>(input: I, fields: Vec<String>) -> Project<I::IntoIter>
where
    I: IntoIterator<Item = Result<Record>>,
{
    Project {
        input: input.into_iter(),
        fields,
        done: false,
    }
}

impl<I> Iterator for Project<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let projected = self
            .input
            .next()?
            .and_then(|record| apply_projection(&record, &self.fields));
        if projected.is_err() {
            self.done = true;
        }
        Some(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FilterExpr;
    use crate::error::ErrorKind;
    use crate::query::predicate;
    use crate::types::field;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().unwrap().clone()
    }

    fn table() -> Vec<Result<Record>> {
        vec![
            Ok(rec(json!({"id": 1, "name": "a", "n": 10}))),
            Ok(rec(json!({"id": 2, "name": "b", "n": 20}))),
            Ok(rec(json!({"id": 3, "name": "c", "n": 30}))),
        ]
    }

    #[test]
    fn test_select_without_predicates_is_identity() {
        let out: Vec<Record> = select(table(), vec![]).collect::<Result<_>>().unwrap();
        let expected: Vec<Record> = table().into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_select_keeps_order() {
        let preds: Predicates = vec![
            Box::new(FilterExpr::ge(FilterExpr::field("n"), FilterExpr::literal(20))),
            predicate(|r| Ok(field(r, "name")? != &json!("x"))),
        ];
        let ids: Vec<i64> = select(table(), preds)
            .map(|r| r.unwrap()["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [2, 3]);
    }

    #[test]
    fn test_select_missing_field_stops_stream() {
        let preds: Predicates = vec![Box::new(FilterExpr::eq(
            FilterExpr::field("missing"),
            FilterExpr::literal(1),
        ))];
        let mut it = select(table(), preds);
        assert_eq!(it.next().unwrap().unwrap_err().kind(), ErrorKind::FieldNotFound);
        assert!(it.next().is_none());
    }

    #[test]
    fn test_project() {
        let out: Vec<Record> = project(table(), vec!["n".into(), "id".into()])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out[0], rec(json!({"n": 10, "id": 1})));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_project_passes_upstream_errors() {
        let input = vec![
            Ok(rec(json!({"id": 1}))),
            Err(crate::error::QueryError::InvalidChunkSize.into()),
            Ok(rec(json!({"id": 3}))),
        ];
        let mut it = project(input, vec!["id".into()]);
        assert!(it.next().unwrap().is_ok());
        assert_eq!(it.next().unwrap().unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(it.next().is_none());
    }

    #[test]
    fn test_project_missing_field() {
        let err = project(table(), vec!["zzz".into()])
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
    }
}
