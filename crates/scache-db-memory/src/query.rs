//! JSON document matching, ordering and patching.

use std::cmp::Ordering;

use scache_core::{Index, OrderBys};
use serde_json::{Map, Value};

/// Resolves a dotted path (`addr.country`, `tags.0.name`) inside a document.
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Writes `value` at a dotted path, creating intermediate objects.
/// Array elements are addressed by position and never appended.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    match path.split_once('.') {
        None => set_member(doc, path, value),
        Some((head, rest)) => {
            if let Some(child) = child_mut(doc, head) {
                set_path(child, rest, value);
            }
        }
    }
}

fn set_member(doc: &mut Value, segment: &str, value: Value) {
    match doc {
        Value::Array(items) => {
            if let Some(slot) = segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = value;
            }
        }
        Value::Object(map) => {
            map.insert(segment.to_string(), value);
        }
        other => {
            let mut map = Map::new();
            map.insert(segment.to_string(), value);
            *other = Value::Object(map);
        }
    }
}

fn child_mut<'a>(doc: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match doc {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        Value::Object(map) => Some(
            map.entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
        ),
        other => {
            *other = Value::Object(Map::new());
            match other {
                Value::Object(map) => Some(
                    map.entry(segment.to_string())
                        .or_insert_with(|| Value::Object(Map::new())),
                ),
                _ => None,
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Returns `true` if every field of `index` equals the document's value.
/// A missing field matches a null index value.
pub fn matches_index(doc: &Value, index: &Index) -> bool {
    index.iter().all(|(field, expected)| {
        let expected = expected.to_json();
        match lookup_path(doc, field) {
            Some(actual) => values_equal(actual, &expected),
            None => expected.is_null(),
        }
    })
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON scalars: null < bool < number < string.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compares two documents field by field following `order_by`.
pub fn compare_documents(a: &Value, b: &Value, order_by: &OrderBys) -> Ordering {
    for order in order_by {
        let left = lookup_path(a, &order.field).unwrap_or(&Value::Null);
        let right = lookup_path(b, &order.field).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right);
        let ordering = if order.asc { ordering } else { ordering.reverse() };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
