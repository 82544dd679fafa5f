//! Result post-processing: sort, then offset, then limit.
//!
//! Pages are concatenated in arrival order before any of this runs. The store
//! never sees the limit, so the window always applies to the fully sorted set.

use std::cmp::Ordering;

use dynorm_proto::{Item, OrderDirection, OrderSpec, Value};

use crate::catalog::KeySchema;
use crate::coerce::coerce_value;

/// The ordering to apply: the explicit order, or ascending by the sort key
/// (the hash key when there is none).
pub fn effective_order(order: &[OrderSpec], schema: &KeySchema) -> Vec<OrderSpec> {
    if order.is_empty() {
        vec![OrderSpec::asc(schema.default_order_key())]
    } else {
        order.to_vec()
    }
}

/// Stable sort by `order`, comparing values as their declared types.
///
/// Missing and null values sort first in ascending order.
pub fn sort_items(items: Vec<Item>, order: &[OrderSpec], schema: &KeySchema) -> Vec<Item> {
    if order.is_empty() {
        return items;
    }

    let mut keyed: Vec<(Vec<Option<Value>>, Item)> = items
        .into_iter()
        .map(|item| {
            let key = order
                .iter()
                .map(|spec| sort_key(&item, &spec.field, schema))
                .collect();
            (key, item)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        for (i, spec) in order.iter().enumerate() {
            let cmp = compare_keys(a[i].as_ref(), b[i].as_ref());
            let cmp = match spec.direction {
                OrderDirection::Asc => cmp,
                OrderDirection::Desc => cmp.reverse(),
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });

    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Skip `offset` records, then keep at most `limit`.
pub fn apply_window(items: Vec<Item>, offset: Option<usize>, limit: Option<usize>) -> Vec<Item> {
    let offset = offset.unwrap_or(0);
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

fn sort_key(item: &Item, field: &str, schema: &KeySchema) -> Option<Value> {
    let value = item.get(field).filter(|v| !v.is_null())?;
    match schema.scalar_type(field) {
        Some(ty) => Some(coerce_value(value, ty).unwrap_or_else(|| value.clone())),
        None => Some(value.clone()),
    }
}

fn compare_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .compare(b)
            .unwrap_or_else(|| type_rank(a).cmp(&type_rank(b))),
    }
}

/// Total order across types that do not compare directly.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Timestamp(_) => 4,
        Value::List(_) => 5,
        Value::Map(_) => 6,
    }
}
