//! Aggregate operations over arrays.
//!
//! The array comes from the evaluated operand when it is one. A string operand
//! names a path plucked from each row of the input array, and a `null` operand
//! aggregates the input array itself. Numeric aggregates skip `null` entries.

use std::cmp::Ordering;

use serde_json::Value;

use crate::expr::value::{compare_values, deep_equal, lookup_path, number_value, split_path};
use crate::expr::{Evaluator, Operation, OperationSet};
use crate::types::{QuarryError, Result};

/// Registers the aggregative family.
pub fn register(set: &mut OperationSet) {
    set.register("$count", Operation::Eager(count))
        .register("$sum", Operation::Eager(sum))
        .register("$min", Operation::Eager(min))
        .register("$max", Operation::Eager(max))
        .register("$mean", Operation::Eager(mean))
        .register("$median", Operation::Eager(median))
        .register("$mode", Operation::Eager(mode));
}

fn collect(name: &str, operand: Value, ctx: &Evaluator<'_>) -> Result<Vec<Value>> {
    match operand {
        Value::Array(items) => Ok(items),
        Value::String(path) => {
            let rows = input_rows(name, ctx)?;
            let segments = split_path(&path);
            Ok(rows.iter().map(|row| lookup_path(row, &segments)).collect())
        }
        Value::Null => input_rows(name, ctx),
        other => Err(QuarryError::eval(format!(
            "{name} expects an array, a path, or null; got {other}"
        ))),
    }
}

fn input_rows(name: &str, ctx: &Evaluator<'_>) -> Result<Vec<Value>> {
    match ctx.input_value()? {
        Value::Array(rows) => Ok(rows),
        other => Err(QuarryError::eval(format!(
            "{name} needs an array input, got {other}"
        ))),
    }
}

fn numbers(name: &str, items: &[Value]) -> Result<Vec<f64>> {
    items
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| QuarryError::eval(format!("{name} expects numbers, got {item}")))
        })
        .collect()
}

fn count(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    Ok(Value::from(collect("$count", operand, ctx)?.len()))
}

fn sum(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let items = collect("$sum", operand, ctx)?;
    Ok(number_value(numbers("$sum", &items)?.iter().sum()))
}

fn extreme(name: &str, operand: Value, ctx: &Evaluator<'_>, keep: Ordering) -> Result<Value> {
    let items = collect(name, operand, ctx)?;
    Ok(items
        .into_iter()
        .filter(|item| !item.is_null())
        .reduce(|best, item| {
            if compare_values(&item, &best) == keep {
                item
            } else {
                best
            }
        })
        .unwrap_or(Value::Null))
}

fn min(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    extreme("$min", operand, ctx, Ordering::Less)
}

fn max(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    extreme("$max", operand, ctx, Ordering::Greater)
}

fn mean(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let items = collect("$mean", operand, ctx)?;
    let values = numbers("$mean", &items)?;
    if values.is_empty() {
        return Ok(Value::Null);
    }
    Ok(number_value(values.iter().sum::<f64>() / values.len() as f64))
}

fn median(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let items = collect("$median", operand, ctx)?;
    let mut values = numbers("$median", &items)?;
    if values.is_empty() {
        return Ok(Value::Null);
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let middle = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Ok(number_value(middle))
}

fn mode(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let items = collect("$mode", operand, ctx)?;
    // Linear buckets: values are arbitrary JSON compared numerically.
    let mut tally: Vec<(Value, usize)> = Vec::new();
    for item in items {
        match tally.iter_mut().find(|(seen, _)| deep_equal(seen, &item)) {
            Some((_, hits)) => *hits += 1,
            None => tally.push((item, 1)),
        }
    }
    let top = tally.iter().map(|(_, hits)| *hits).max().unwrap_or(0);
    if top <= 1 {
        return Ok(Value::Null);
    }
    let mut winners: Vec<Value> = tally
        .into_iter()
        .filter(|(_, hits)| *hits == top)
        .map(|(value, _)| value)
        .collect();
    if winners.len() == 1 {
        return Ok(winners.remove(0));
    }
    winners.sort_by(compare_values);
    Ok(Value::Array(winners))
}
