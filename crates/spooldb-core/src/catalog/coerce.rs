//! Coercion of caller-supplied values to a table's declared field types.
//!
//! The storage layer never coerces on its own; callers that want the
//! declared schema enforced run their records through [`coerce_record`]
//! before inserting or updating.

use serde_json::{Number, Value};

use crate::error::{Error, Result, SchemaError};
use crate::types::{Record, ScalarType, TableSchema, validate_scalars};

/// Convert every field of `values` to the type declared for it in `schema`.
///
/// Fields not present in `values` are not added. A field missing from the
/// schema fails with `UnknownField`.
pub fn coerce_record(table: &str, schema: &TableSchema, values: &Record) -> Result<Record> {
    validate_scalars(values)?;
    let mut out = Record::new();
    for (field, value) in values {
        let declared = schema.get(field).ok_or_else(|| SchemaError::UnknownField {
            table: table.to_string(),
            field: field.clone(),
        })?;
        out.insert(field.clone(), coerce_value(field, value, *declared)?);
    }
    Ok(out)
}

/// Convert a single scalar to `target`.
pub fn coerce_value(field: &str, value: &Value, target: ScalarType) -> Result<Value> {
    let mismatch = || -> Error {
        SchemaError::TypeMismatch {
            field: field.to_string(),
            expected: target,
            value: value.clone(),
        }
        .into()
    };

    let coerced = match (target, value) {
        (ScalarType::Int, Value::Number(n)) => {
            if n.is_i64() {
                value.clone()
            } else {
                let f = n.as_f64().ok_or_else(mismatch)?;
                float_to_int(f).ok_or_else(mismatch)?
            }
        }
        (ScalarType::Int, Value::Bool(b)) => Value::from(i64::from(*b)),
        (ScalarType::Int, Value::String(s)) => {
            Value::from(s.trim().parse::<i64>().map_err(|_| mismatch())?)
        }

        (ScalarType::Float, Value::Number(n)) => {
            float_value(n.as_f64().ok_or_else(mismatch)?).ok_or_else(mismatch)?
        }
        (ScalarType::Float, Value::Bool(b)) => Value::from(if *b { 1.0 } else { 0.0 }),
        (ScalarType::Float, Value::String(s)) => {
            let f = s.trim().parse::<f64>().map_err(|_| mismatch())?;
            float_value(f).ok_or_else(mismatch)?
        }

        (ScalarType::Bool, Value::Bool(_)) => value.clone(),
        (ScalarType::Bool, Value::Number(n)) => {
            Value::Bool(n.as_f64().ok_or_else(mismatch)? != 0.0)
        }
        (ScalarType::Bool, Value::String(s)) => {
            Value::Bool(parse_bool(s.trim()).ok_or_else(mismatch)?)
        }

        (ScalarType::Str, Value::String(_)) => value.clone(),
        (ScalarType::Str, Value::Number(n)) => Value::String(n.to_string()),
        (ScalarType::Str, Value::Bool(b)) => Value::String(b.to_string()),

        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

fn float_to_int(f: f64) -> Option<Value> {
    let t = f.trunc();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(Value::from(t as i64))
    } else {
        None
    }
}

fn float_value(f: f64) -> Option<Value> {
    Number::from_f64(f).map(Value::Number)
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s == "0" {
        Some(false)
    } else {
        None
    }
}
