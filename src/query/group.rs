//! Group-by rollups.

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::expr::value::{lookup_path, number_value, split_path, truthy};
use crate::query::ast::{GroupQuery, GroupSelection, OrderKey};
use crate::query::executor::Engines;
use crate::query::order::{self, SortKey};
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::types::Result;

struct Bucket {
    key: SortKey,
    members: Vec<Value>,
}

/// Rolls `rows` up into one output row per distinct `by` tuple.
///
/// `read` resolves a `by` path on a row and `member` renders the row as it is
/// exposed to aggregate expressions. Buckets appear in first-appearance order
/// unless the group orders them.
pub fn rollup<T, R, M>(
    rows: Vec<T>,
    group: &GroupQuery,
    engines: &Engines,
    mut read: R,
    mut member: M,
) -> Result<Vec<Value>>
where
    R: FnMut(&T, &str) -> Result<Value>,
    M: FnMut(&T) -> Result<Value>,
{
    let timer = profile_timer();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    let mut buckets: Vec<Bucket> = Vec::new();
    for row in &rows {
        let key = group
            .by
            .iter()
            .map(|path| read(row, path))
            .collect::<Result<SortKey>>()?;
        let slot = *index
            .entry(bucket_id(&key)?)
            .or_insert_with(|| {
                buckets.push(Bucket {
                    key,
                    members: Vec::new(),
                });
                buckets.len() - 1
            });
        buckets[slot].members.push(member(row)?);
    }
    debug!(rows = rows.len(), buckets = buckets.len(), by = ?group.by, "group partitioned");

    let mut out = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        out.push(project_bucket(group, engines, bucket)?);
    }
    record_profile_timer(QueryProfileKind::Group, timer);

    let out = match &group.where_clause {
        Some(expr) => {
            let mut kept = Vec::with_capacity(out.len());
            for row in out {
                if truthy(&engines.where_engine.apply(expr, &row)?) {
                    kept.push(row);
                }
            }
            kept
        }
        None => out,
    };

    let order = effective_order(group);
    let mut keyed = order::keyed(out, &order, |row, path| Ok(lookup_path(row, &split_path(path))))?;
    order::sort(&mut keyed, &order);
    let rows: Vec<Value> = order::window(keyed, &order, &group.slice)?
        .into_iter()
        .map(|keyed| keyed.row)
        .collect();

    match &group.group {
        Some(nested) => rollup(rows, nested, engines, read_value, clone_value),
        None => Ok(rows),
    }
}

fn project_bucket(group: &GroupQuery, engines: &Engines, bucket: Bucket) -> Result<Value> {
    let mut scalar = Value::Object(Map::new());
    for (path, value) in group.by.iter().zip(bucket.key) {
        set_path(&mut scalar, &split_path(path), value);
    }
    let mut row = Map::with_capacity(group.select.len() + group.aggregates.len());
    for (key, selection) in &group.select {
        let value = match selection {
            GroupSelection::By(path) => lookup_path(&scalar, &split_path(path)),
            GroupSelection::Expression(expr) => engines.select_engine.apply(expr, &scalar)?,
        };
        row.insert(key.clone(), value);
    }
    let members = Value::Array(bucket.members);
    for (key, expr) in &group.aggregates {
        row.insert(key.clone(), engines.select_engine.apply(expr, &members)?);
    }
    Ok(Value::Object(row))
}

/// Cursors need a total order; without one, bucket rows order by their `by` fields.
fn effective_order(group: &GroupQuery) -> Vec<OrderKey> {
    let cursor = group.slice.before.is_some() || group.slice.after.is_some();
    if group.order.is_empty() && cursor {
        group.select
            .iter()
            .filter_map(|(key, selection)| match selection {
                GroupSelection::By(_) => Some(OrderKey::asc(key.clone())),
                GroupSelection::Expression(_) => None,
            })
            .collect()
    } else {
        group.order.clone()
    }
}

/// Identity of a `by` tuple; numbers that compare equal share a bucket.
fn bucket_id(key: &[Value]) -> Result<String> {
    fn canonical(value: &Value) -> Value {
        match value {
            Value::Number(n) if n.is_f64() => n.as_f64().map_or(Value::Null, number_value),
            Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
    let canonical: Vec<Value> = key.iter().map(canonical).collect();
    Ok(serde_json::to_string(&canonical)?)
}

fn set_path(target: &mut Value, path: &[&str], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry((*head).to_owned()).or_insert(Value::Null);
        set_path(slot, rest, value);
    }
}

fn read_value(row: &Value, path: &str) -> Result<Value> {
    Ok(lookup_path(row, &split_path(path)))
}

fn clone_value(row: &Value) -> Result<Value> {
    Ok(row.clone())
}
