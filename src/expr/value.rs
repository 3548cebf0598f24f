//! JSON value helpers shared by operations, sorting, and grouping.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Path segment that maps the rest of a path over an array level.
pub const WILDCARD: &str = "$";

/// Splits a dotted path into segments; the empty path has no segments.
pub fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Reads `path` out of `value`; missing segments yield `null`.
///
/// When an object lacks the next segment, a key spelled as the remaining
/// dotted path is used instead, so rows keyed by `"home.name"` stay readable.
pub fn lookup_path(value: &Value, path: &[&str]) -> Value {
    let Some((head, rest)) = path.split_first() else {
        return value.clone();
    };
    match value {
        Value::Array(items) if *head == WILDCARD => {
            Value::Array(items.iter().map(|item| lookup_path(item, rest)).collect())
        }
        Value::Array(items) => match head.parse::<usize>() {
            Ok(index) => items
                .get(index)
                .map(|item| lookup_path(item, rest))
                .unwrap_or(Value::Null),
            Err(_) => Value::Null,
        },
        Value::Object(map) => match map.get(*head) {
            Some(inner) => lookup_path(inner, rest),
            None if !rest.is_empty() => map.get(&path.join(".")).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

/// Whether every segment of `path` exists in `value`.
pub fn has_path(value: &Value, path: &[&str]) -> bool {
    let Some((head, rest)) = path.split_first() else {
        return true;
    };
    match value {
        Value::Array(items) if *head == WILDCARD => items.iter().all(|item| has_path(item, rest)),
        Value::Array(items) => head
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .is_some_and(|item| has_path(item, rest)),
        Value::Object(map) => match map.get(*head) {
            Some(inner) => has_path(inner, rest),
            None => !rest.is_empty() && map.contains_key(&path.join(".")),
        },
        _ => false,
    }
}

/// Truthiness: `false`, `null`, `0`, and `""` are falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Structural equality where numbers compare by numeric value.
pub fn deep_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => left == right,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used by comparisons, sorting, and cursors.
///
/// Values of different kinds order as null < bool < number < string < array <
/// object; arrays compare element-wise, objects by length then entries.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()).then_with(|| {
            for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                let ord = ka.cmp(kb).then_with(|| compare_values(va, vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }),
        _ => kind_rank(left).cmp(&kind_rank(right)),
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

/// Converts a float into a JSON number, preferring integers when exact.
pub fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
