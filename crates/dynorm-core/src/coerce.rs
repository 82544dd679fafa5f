//! Typed coercion keyed off declared scalar types.
//!
//! Filter operands are coerced strictly on the way in: an operand that cannot
//! be converted to its attribute's declared type is an invalid argument.
//! Returned records are coerced leniently on the way out: values that do not
//! convert are left untouched.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use dynorm_proto::{Clause, Item, Value, WhereClause};

use crate::catalog::{KeySchema, ScalarType};
use crate::error::Error;

/// Convert `value` to the representation of `ty`.
///
/// Null converts to null for every type. Lists and maps never convert.
pub fn coerce_value(value: &Value, ty: ScalarType) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }
    match ty {
        ScalarType::String => to_string(value),
        ScalarType::Number => to_number(value),
        ScalarType::Date => to_date(value),
        ScalarType::Boolean => to_boolean(value),
    }
}

fn to_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Int(i) => Some(Value::String(i.to_string())),
        Value::Float(f) if f.is_finite() => Some(Value::String(f.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        Value::Timestamp(ms) => DateTime::<Utc>::from_timestamp_millis(*ms)
            .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Int(_) | Value::Float(_) => Some(value.clone()),
        Value::Timestamp(ms) => Some(Value::Int(*ms)),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Int(i));
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(Value::Float(f)),
        _ => None,
    }
}

fn to_date(value: &Value) -> Option<Value> {
    match value {
        Value::Timestamp(_) => Some(value.clone()),
        Value::Int(ms) => Some(Value::Timestamp(*ms)),
        Value::Float(f) if f.is_finite() => Some(Value::Timestamp(*f as i64)),
        Value::String(s) => parse_date(s).map(Value::Timestamp),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis());
    }
    s.parse::<i64>().ok()
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Int(0) => Some(Value::Bool(false)),
        Value::Int(1) => Some(Value::Bool(true)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a filter operand, failing if it does not convert.
pub fn coerce_operand(attribute: &str, value: &Value, ty: ScalarType) -> Result<Value, Error> {
    coerce_value(value, ty).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "value {value:?} for `{attribute}` is not a valid {ty}"
        ))
    })
}

/// Coerce every operand of a where clause to its attribute's declared type.
///
/// Attributes without a declared type pass through unchanged.
pub fn coerce_where(clause: &WhereClause, schema: &KeySchema) -> Result<WhereClause, Error> {
    let mut coerced = WhereClause::new();
    for entry in clause.clauses() {
        match entry {
            Clause::Attribute { name, condition } => {
                let condition = match schema.scalar_type(name) {
                    Some(ty) => condition.try_map_values(|v| coerce_operand(name, v, ty))?,
                    None => condition.clone(),
                };
                coerced = coerced.with(name.clone(), condition);
            }
            Clause::AnyOf(entries) => {
                let mut group = Vec::with_capacity(entries.len());
                for (name, value) in entries {
                    let value = match schema.scalar_type(name) {
                        Some(ty) => coerce_operand(name, value, ty)?,
                        None => value.clone(),
                    };
                    group.push((name.clone(), value));
                }
                coerced = coerced.with_any_of(group);
            }
        }
    }
    Ok(coerced)
}

/// Convert the declared attributes of a returned record, leaving values that
/// do not convert as they are.
pub fn coerce_item(mut item: Item, schema: &KeySchema) -> Item {
    for (name, value) in item.iter_mut() {
        if let Some(ty) = schema.scalar_type(name) {
            if let Some(converted) = coerce_value(value, ty) {
                *value = converted;
            }
        }
    }
    item
}
