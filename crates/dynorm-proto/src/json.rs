//! Conversion between JSON documents and runtime values.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::value::{Item, Value};

/// Convert a JSON value to a runtime value.
///
/// Integral numbers that fit in an `i64` become [`Value::Int`]; every other
/// number becomes [`Value::Float`].
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(arr) => Value::List(arr.iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => Value::Map(
            obj.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

/// Convert a runtime value to JSON.
///
/// Timestamps are emitted as epoch milliseconds. Non-finite floats become null.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::json!(i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(t) => serde_json::json!(t),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert a JSON object to a record.
pub fn item_from_json(json: &serde_json::Value) -> Result<Item, Error> {
    let obj = json.as_object().ok_or_else(|| {
        Error::InvalidFilter(format!("expected a JSON object for a record, got {json}"))
    })?;
    Ok(obj
        .iter()
        .map(|(k, v)| (k.clone(), json_to_value(v)))
        .collect::<BTreeMap<_, _>>())
}

/// Convert a record to a JSON object.
pub fn item_to_json(item: &Item) -> serde_json::Value {
    serde_json::Value::Object(
        item.iter()
            .map(|(k, v)| (k.clone(), value_to_json(v)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers() {
        assert_eq!(json_to_value(&json!(3)), Value::Int(3));
        assert_eq!(json_to_value(&json!(-3)), Value::Int(-3));
        assert_eq!(json_to_value(&json!(2.5)), Value::Float(2.5));
        assert_eq!(json_to_value(&json!(u64::MAX)), Value::Float(u64::MAX as f64));
    }

    #[test]
    fn test_item_conversion() {
        let item = item_from_json(&json!({"id": "1", "order": 2, "tags": ["a"]})).unwrap();
        assert_eq!(item.get("id"), Some(&Value::String("1".into())));
        assert_eq!(item.get("order"), Some(&Value::Int(2)));
        assert_eq!(
            item.get("tags"),
            Some(&Value::List(vec![Value::String("a".into())]))
        );
        assert_eq!(
            item_to_json(&item),
            json!({"id": "1", "order": 2, "tags": ["a"]})
        );
    }

    #[test]
    fn test_item_requires_object() {
        assert!(matches!(
            item_from_json(&json!([1, 2])),
            Err(Error::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_timestamp_and_nan() {
        assert_eq!(value_to_json(&Value::Timestamp(1500)), json!(1500));
        assert_eq!(value_to_json(&Value::Float(f64::NAN)), serde_json::Value::Null);
    }
}
