//! Sorting, cursor slicing, and offset/limit windows.
//!
//! Rows are paired with their sort tuple once, up front, so the comparator and
//! the cursor comparisons never re-read row data.

use std::cmp::Ordering;

use serde_json::Value;
use smallvec::SmallVec;

use crate::expr::value::{compare_values, lookup_path, split_path};
use crate::query::ast::{Direction, OrderKey, Slice};
use crate::types::{QuarryError, Result};

/// Values of a row under an order list, primary key first.
pub type SortKey = SmallVec<[Value; 4]>;

/// A row paired with its sort tuple.
#[derive(Clone, Debug)]
pub struct Keyed<T> {
    /// The row.
    pub row: T,
    /// Its values under the active order list.
    pub key: SortKey,
}

/// Pairs every row with its sort tuple, reading each path through `read`.
pub fn keyed<T, F>(rows: Vec<T>, order: &[OrderKey], mut read: F) -> Result<Vec<Keyed<T>>>
where
    F: FnMut(&T, &str) -> Result<Value>,
{
    rows.into_iter()
        .map(|row| {
            let key = order
                .iter()
                .map(|entry| read(&row, &entry.path))
                .collect::<Result<SortKey>>()?;
            Ok(Keyed { row, key })
        })
        .collect()
}

/// Lexicographic comparison of two tuples under `order`.
pub fn compare_keys(left: &[Value], right: &[Value], order: &[OrderKey]) -> Ordering {
    for ((a, b), entry) in left.iter().zip(right).zip(order) {
        let ord = match entry.direction {
            Direction::Asc => compare_values(a, b),
            Direction::Desc => compare_values(b, a),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable multi-key sort.
pub fn sort<T>(rows: &mut [Keyed<T>], order: &[OrderKey]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| compare_keys(&a.key, &b.key, order));
}

/// Reads an anchor object's tuple under `order`.
pub fn anchor_key(anchor: &Value, order: &[OrderKey]) -> SortKey {
    order
        .iter()
        .map(|entry| lookup_path(anchor, &split_path(&entry.path)))
        .collect()
}

/// Rejects `limit < 1` and `offset < 0`.
pub fn check_range(slice: &Slice) -> Result<()> {
    if let Some(limit) = slice.limit {
        if limit < 1 {
            return Err(QuarryError::Range(format!("limit must be at least 1, got {limit}")));
        }
    }
    if let Some(offset) = slice.offset {
        if offset < 0 {
            return Err(QuarryError::Range(format!("offset must not be negative, got {offset}")));
        }
    }
    Ok(())
}

/// Applies cursors, then offset and limit, to sorted rows.
///
/// With `before` and no `after`, the window is taken from the tail: `offset`
/// drops rows nearest the anchor's far end and `limit` keeps the last rows.
pub fn window<T>(rows: Vec<Keyed<T>>, order: &[OrderKey], slice: &Slice) -> Result<Vec<Keyed<T>>> {
    check_range(slice)?;
    let after = slice.after.as_ref().map(|anchor| anchor_key(anchor, order));
    let before = slice.before.as_ref().map(|anchor| anchor_key(anchor, order));

    let mut rows: Vec<Keyed<T>> = rows
        .into_iter()
        .filter(|row| {
            after
                .as_ref()
                .map_or(true, |anchor| compare_keys(&row.key, anchor, order).is_gt())
                && before
                    .as_ref()
                    .map_or(true, |anchor| compare_keys(&row.key, anchor, order).is_lt())
        })
        .collect();

    let offset = slice.offset.unwrap_or(0) as usize;
    let limit = slice.limit.map(|limit| limit as usize);
    if before.is_some() && after.is_none() {
        rows.truncate(rows.len().saturating_sub(offset));
        if let Some(limit) = limit {
            let excess = rows.len().saturating_sub(limit);
            rows.drain(..excess);
        }
    } else {
        rows.drain(..offset.min(rows.len()));
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
    }
    Ok(rows)
}
