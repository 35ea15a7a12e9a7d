//! Filter expressions: a serializable predicate grammar over records.
//!
//! A [`FilterExpr`] is the data form of a predicate. It can be parsed from
//! JSON (the CLI's `--where` and `--on` arguments) and plugged into any
//! operator that takes predicates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{QueryError, Result};
use crate::query::Predicate;
use crate::types::{Record, field};

/// A filter expression that can be evaluated against a record.
///
/// Serialized in snake case, e.g.
/// `{"gt": [{"field": "age"}, {"literal": 30}]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    // Leaf nodes
    /// Reference to a record field. Fails with `FieldNotFound` if absent.
    Field(String),
    /// A literal JSON value.
    Literal(Value),

    // Comparisons
    Eq(Box<FilterExpr>, Box<FilterExpr>),
    Ne(Box<FilterExpr>, Box<FilterExpr>),
    Lt(Box<FilterExpr>, Box<FilterExpr>),
    Le(Box<FilterExpr>, Box<FilterExpr>),
    Gt(Box<FilterExpr>, Box<FilterExpr>),
    Ge(Box<FilterExpr>, Box<FilterExpr>),
    Between(Box<FilterExpr>, Box<FilterExpr>, Box<FilterExpr>),

    // String operations
    BeginsWith(Box<FilterExpr>, String),
    Contains(Box<FilterExpr>, String),

    /// True iff the record has the field. Never fails.
    Exists(String),

    // Boolean logic
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

/// Maximum nesting depth for filter expressions.
const MAX_EXPRESSION_DEPTH: usize = 16;

impl FilterExpr {
    /// Evaluate this filter expression against a record.
    ///
    /// Enforces a maximum nesting depth of 16 levels.
    pub fn eval(&self, record: &Record) -> Result<bool> {
        self.eval_inner(record, 0)
    }

    fn eval_inner(&self, record: &Record, depth: usize) -> Result<bool> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(QueryError::InvalidExpression(format!(
                "expression depth exceeds maximum of {MAX_EXPRESSION_DEPTH}"
            ))
            .into());
        }

        match self {
            FilterExpr::Field(_) | FilterExpr::Literal(_) => Err(QueryError::InvalidExpression(
                "leaf node cannot be evaluated as a boolean".to_string(),
            )
            .into()),

            FilterExpr::Eq(left, right) => {
                Ok(compare_operands(left, right, record)? == Some(Ordering::Equal))
            }
            FilterExpr::Ne(left, right) => {
                Ok(compare_operands(left, right, record)? != Some(Ordering::Equal))
            }
            FilterExpr::Lt(left, right) => {
                Ok(compare_operands(left, right, record)? == Some(Ordering::Less))
            }
            FilterExpr::Le(left, right) => Ok(matches!(
                compare_operands(left, right, record)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            FilterExpr::Gt(left, right) => {
                Ok(compare_operands(left, right, record)? == Some(Ordering::Greater))
            }
            FilterExpr::Ge(left, right) => Ok(matches!(
                compare_operands(left, right, record)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            FilterExpr::Between(val, low, high) => {
                let ge_low = matches!(
                    compare_operands(val, low, record)?,
                    Some(Ordering::Greater | Ordering::Equal)
                );
                let le_high = matches!(
                    compare_operands(val, high, record)?,
                    Some(Ordering::Less | Ordering::Equal)
                );
                Ok(ge_low && le_high)
            }

            FilterExpr::BeginsWith(expr, prefix) => match resolve_expr(expr, record)? {
                Value::String(s) => Ok(s.starts_with(prefix.as_str())),
                _ => Ok(false),
            },
            FilterExpr::Contains(expr, needle) => match resolve_expr(expr, record)? {
                Value::String(s) => Ok(s.contains(needle.as_str())),
                _ => Ok(false),
            },

            FilterExpr::Exists(name) => Ok(record.contains_key(name)),

            FilterExpr::And(exprs) => {
                for expr in exprs {
                    if !expr.eval_inner(record, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterExpr::Or(exprs) => {
                for expr in exprs {
                    if expr.eval_inner(record, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FilterExpr::Not(expr) => Ok(!expr.eval_inner(record, depth + 1)?),
        }
    }
}

impl Predicate for FilterExpr {
    fn test(&self, record: &Record) -> Result<bool> {
        self.eval(record)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve an operand to a value borrowed from the record or the expression.
fn resolve_expr<'a>(expr: &'a FilterExpr, record: &'a Record) -> Result<&'a Value> {
    match expr {
        FilterExpr::Field(name) => field(record, name),
        FilterExpr::Literal(val) => Ok(val),
        _ => Err(QueryError::InvalidExpression(
            "expected field or literal in comparison position".to_string(),
        )
        .into()),
    }
}

fn compare_operands(
    left: &FilterExpr,
    right: &FilterExpr,
    record: &Record,
) -> Result<Option<Ordering>> {
    let l = resolve_expr(left, record)?;
    let r = resolve_expr(right, record)?;
    Ok(compare_values(l, r))
}

/// Compare two scalar values, returning an ordering if their kinds are
/// comparable.
///
/// - Numbers: integers exactly, otherwise as f64
/// - Strings: lexicographically by bytes
/// - Booleans: false < true
/// - Mismatched kinds: `None`
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl FilterExpr {
    /// Create a field reference.
    pub fn field(name: impl Into<String>) -> Self {
        FilterExpr::Field(name.into())
    }

    /// Create a literal value.
    pub fn literal(val: impl Into<Value>) -> Self {
        FilterExpr::Literal(val.into())
    }

    /// `field == value`
    pub fn eq(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Eq(Box::new(left), Box::new(right))
    }

    /// `field != value`
    pub fn ne(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Ne(Box::new(left), Box::new(right))
    }

    /// `field < value`
    pub fn lt(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Lt(Box::new(left), Box::new(right))
    }

    /// `field <= value`
    pub fn le(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Le(Box::new(left), Box::new(right))
    }

    /// `field > value`
    pub fn gt(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Gt(Box::new(left), Box::new(right))
    }

    /// `field >= value`
    pub fn ge(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Ge(Box::new(left), Box::new(right))
    }

    /// `field BETWEEN low AND high`
    pub fn between(val: FilterExpr, low: FilterExpr, high: FilterExpr) -> Self {
        FilterExpr::Between(Box::new(val), Box::new(low), Box::new(high))
    }

    /// `begins_with(field, prefix)`
    pub fn begins_with(expr: FilterExpr, prefix: impl Into<String>) -> Self {
        FilterExpr::BeginsWith(Box::new(expr), prefix.into())
    }

    /// `contains(field, needle)`
    pub fn contains(expr: FilterExpr, needle: impl Into<String>) -> Self {
        FilterExpr::Contains(Box::new(expr), needle.into())
    }

    /// `exists(field)`
    pub fn exists(name: impl Into<String>) -> Self {
        FilterExpr::Exists(name.into())
    }

    /// `expr1 AND expr2 AND ...`
    pub fn and(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::And(exprs)
    }

    /// `expr1 OR expr2 OR ...`
    pub fn or(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::Or(exprs)
    }

    /// `NOT expr`
    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn sample_record() -> Record {
        json!({
            "id": 7,
            "name": "Alice",
            "age": 30,
            "active": true,
            "score": 95.5,
        })
        .as_object()
        .unwrap()
        .clone()
    }

    // -----------------------------------------------------------------------
    // Equality
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_eq_string() {
        let rec = sample_record();
        let f = FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Alice"));
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Bob"));
        assert!(!f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_eq_number_int_and_float() {
        let rec = sample_record();
        let f = FilterExpr::eq(FilterExpr::field("age"), FilterExpr::literal(30));
        assert!(f.eval(&rec).unwrap());

        // 30 == 30.0 across int and float.
        let f = FilterExpr::eq(FilterExpr::field("age"), FilterExpr::literal(30.0));
        assert!(f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_eq_boolean() {
        let rec = sample_record();
        let f = FilterExpr::eq(FilterExpr::field("active"), FilterExpr::literal(true));
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::eq(FilterExpr::field("active"), FilterExpr::literal(false));
        assert!(!f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_ne() {
        let rec = sample_record();
        let f = FilterExpr::ne(FilterExpr::field("name"), FilterExpr::literal("Bob"));
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::ne(FilterExpr::field("name"), FilterExpr::literal("Alice"));
        assert!(!f.eval(&rec).unwrap());
    }

    // -----------------------------------------------------------------------
    // Comparisons
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_lt_le_gt_ge() {
        let rec = sample_record();
        let age = || FilterExpr::field("age");
        assert!(FilterExpr::lt(age(), FilterExpr::literal(40)).eval(&rec).unwrap());
        assert!(!FilterExpr::lt(age(), FilterExpr::literal(30)).eval(&rec).unwrap());
        assert!(FilterExpr::le(age(), FilterExpr::literal(30)).eval(&rec).unwrap());
        assert!(!FilterExpr::le(age(), FilterExpr::literal(29)).eval(&rec).unwrap());
        assert!(FilterExpr::gt(age(), FilterExpr::literal(20)).eval(&rec).unwrap());
        assert!(!FilterExpr::gt(age(), FilterExpr::literal(30)).eval(&rec).unwrap());
        assert!(FilterExpr::ge(age(), FilterExpr::literal(30)).eval(&rec).unwrap());
        assert!(!FilterExpr::ge(age(), FilterExpr::literal(31)).eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_field_to_field() {
        let rec = json!({"a": 3, "b": 5}).as_object().unwrap().clone();
        let f = FilterExpr::lt(FilterExpr::field("a"), FilterExpr::field("b"));
        assert!(f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_string_comparison() {
        let rec = sample_record();
        // "Alice" < "Bob" lexicographically
        let f = FilterExpr::lt(FilterExpr::field("name"), FilterExpr::literal("Bob"));
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::gt(FilterExpr::field("name"), FilterExpr::literal("Bob"));
        assert!(!f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_float_comparison() {
        let rec = sample_record();
        let f = FilterExpr::gt(FilterExpr::field("score"), FilterExpr::literal(90));
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::lt(FilterExpr::field("score"), FilterExpr::literal(90.0));
        assert!(!f.eval(&rec).unwrap());
    }

    // -----------------------------------------------------------------------
    // Between
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_between() {
        let rec = sample_record();
        let f = FilterExpr::between(
            FilterExpr::field("age"),
            FilterExpr::literal(25),
            FilterExpr::literal(35),
        );
        assert!(f.eval(&rec).unwrap());

        // Exactly at bounds
        let f = FilterExpr::between(
            FilterExpr::field("age"),
            FilterExpr::literal(30),
            FilterExpr::literal(30),
        );
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::between(
            FilterExpr::field("age"),
            FilterExpr::literal(31),
            FilterExpr::literal(40),
        );
        assert!(!f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_between_strings() {
        let rec = sample_record();
        let f = FilterExpr::between(
            FilterExpr::field("name"),
            FilterExpr::literal("A"),
            FilterExpr::literal("B"),
        );
        assert!(f.eval(&rec).unwrap());
    }

    // -----------------------------------------------------------------------
    // String operations
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_begins_with() {
        let rec = sample_record();
        let f = FilterExpr::begins_with(FilterExpr::field("name"), "Ali");
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::begins_with(FilterExpr::field("name"), "Bob");
        assert!(!f.eval(&rec).unwrap());

        // Non-string field returns false
        let f = FilterExpr::begins_with(FilterExpr::field("age"), "3");
        assert!(!f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_contains() {
        let rec = sample_record();
        let f = FilterExpr::contains(FilterExpr::field("name"), "lic");
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::contains(FilterExpr::field("name"), "xyz");
        assert!(!f.eval(&rec).unwrap());
    }

    // -----------------------------------------------------------------------
    // Missing fields
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_missing_field_fails() {
        let rec = sample_record();
        for f in [
            FilterExpr::eq(FilterExpr::field("nope"), FilterExpr::literal(1)),
            FilterExpr::ne(FilterExpr::field("nope"), FilterExpr::literal(1)),
            FilterExpr::begins_with(FilterExpr::field("nope"), "x"),
            FilterExpr::not(FilterExpr::contains(FilterExpr::field("nope"), "x")),
        ] {
            let err = f.eval(&rec).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FieldNotFound, "{f:?}");
        }
    }

    #[test]
    fn test_filter_exists() {
        let rec = sample_record();
        assert!(FilterExpr::exists("name").eval(&rec).unwrap());
        assert!(!FilterExpr::exists("nonexistent").eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_exists_guards_missing_field() {
        let rec = sample_record();
        let f = FilterExpr::and(vec![
            FilterExpr::exists("email"),
            FilterExpr::eq(FilterExpr::field("email"), FilterExpr::literal("a@b")),
        ]);
        assert!(!f.eval(&rec).unwrap());
    }

    // -----------------------------------------------------------------------
    // Boolean logic
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_and_or_not() {
        let rec = sample_record();
        let f = FilterExpr::and(vec![
            FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Alice")),
            FilterExpr::gt(FilterExpr::field("age"), FilterExpr::literal(20)),
        ]);
        assert!(f.eval(&rec).unwrap());

        let f = FilterExpr::or(vec![
            FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Bob")),
            FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Carol")),
        ]);
        assert!(!f.eval(&rec).unwrap());

        let f = FilterExpr::not(FilterExpr::eq(
            FilterExpr::field("name"),
            FilterExpr::literal("Bob"),
        ));
        assert!(f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_empty_and_or() {
        let rec = sample_record();
        // Empty AND is vacuously true, empty OR vacuously false.
        assert!(FilterExpr::and(vec![]).eval(&rec).unwrap());
        assert!(!FilterExpr::or(vec![]).eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_short_circuit() {
        let rec = sample_record();
        // The second operand would fail (leaf as boolean) if evaluated.
        let f = FilterExpr::and(vec![
            FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Bob")),
            FilterExpr::field("name"),
        ]);
        assert!(!f.eval(&rec).unwrap());

        let f = FilterExpr::or(vec![
            FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Alice")),
            FilterExpr::field("name"),
        ]);
        assert!(f.eval(&rec).unwrap());
    }

    // -----------------------------------------------------------------------
    // Type mismatches and invalid expressions
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_type_mismatch() {
        let rec = sample_record();
        let f = FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal(42));
        assert!(!f.eval(&rec).unwrap());

        let f = FilterExpr::lt(FilterExpr::field("name"), FilterExpr::literal(42));
        assert!(!f.eval(&rec).unwrap());

        // Unordered kinds are never equal, so Ne holds.
        let f = FilterExpr::ne(FilterExpr::field("active"), FilterExpr::literal(1));
        assert!(f.eval(&rec).unwrap());
    }

    #[test]
    fn test_filter_leaf_eval_error() {
        let rec = sample_record();
        let err = FilterExpr::field("name").eval(&rec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(FilterExpr::literal(42).eval(&rec).is_err());
    }

    #[test]
    fn test_filter_depth_limit() {
        let rec = sample_record();
        let mut f = FilterExpr::exists("name");
        for _ in 0..=MAX_EXPRESSION_DEPTH {
            f = FilterExpr::not(f);
        }
        let err = f.eval(&rec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    #[test]
    fn test_filter_parses_from_json() {
        let parsed: FilterExpr = serde_json::from_str(
            r#"{"and": [{"eq": [{"field": "name"}, {"literal": "Alice"}]},
                        {"exists": "age"}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            FilterExpr::and(vec![
                FilterExpr::eq(FilterExpr::field("name"), FilterExpr::literal("Alice")),
                FilterExpr::exists("age"),
            ])
        );
        assert!(parsed.eval(&sample_record()).unwrap());
    }

    #[test]
    fn test_filter_as_predicate() {
        let preds: Vec<Box<dyn Predicate>> = vec![Box::new(FilterExpr::gt(
            FilterExpr::field("age"),
            FilterExpr::literal(18),
        ))];
        assert!(crate::query::matches(&sample_record(), &preds).unwrap());
    }

    // -----------------------------------------------------------------------
    // compare_values
    // -----------------------------------------------------------------------

    #[test]
    fn test_compare_values_numbers() {
        assert_eq!(compare_values(&json!(1), &json!(2)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(2), &json!(2.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(3), &json!(2.5)), Some(Ordering::Greater));
        // Large integers compare exactly, not through f64.
        assert_eq!(
            compare_values(&json!(9_007_199_254_740_993_i64), &json!(9_007_199_254_740_992_i64)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_compare_values_strings_and_bools() {
        assert_eq!(compare_values(&json!("a"), &json!("b")), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("B"), &json!("a")), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(false), &json!(true)), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_values_mixed_types() {
        assert_eq!(compare_values(&json!("a"), &json!(1)), None);
        assert_eq!(compare_values(&json!(true), &json!(1)), None);
    }
}
