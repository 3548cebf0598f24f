//! Per-element operations over the input array.

use serde_json::Value;

use crate::expr::value::truthy;
use crate::expr::{Evaluator, Operation, OperationSet};
use crate::types::{QuarryError, Result};

/// Registers `$map`, `$filter`, and `$flatMap`.
pub fn register(set: &mut OperationSet) {
    set.register("$map", Operation::Controlled(map))
        .register("$filter", Operation::Controlled(filter))
        .register("$flatMap", Operation::Controlled(flat_map));
}

fn elements(name: &str, ctx: &Evaluator<'_>) -> Result<Vec<Value>> {
    match ctx.input_value()? {
        Value::Array(items) => Ok(items),
        other => Err(QuarryError::eval(format!(
            "{name} needs an array input, got {other}"
        ))),
    }
}

fn map(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    elements("$map", ctx)?
        .iter()
        .map(|item| ctx.eval_with(operand, item))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn filter(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let mut kept = Vec::new();
    for item in elements("$filter", ctx)? {
        if truthy(&ctx.eval_with(operand, &item)?) {
            kept.push(item);
        }
    }
    Ok(Value::Array(kept))
}

fn flat_map(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let mut out = Vec::new();
    for item in elements("$flatMap", ctx)? {
        match ctx.eval_with(operand, &item)? {
            Value::Array(inner) => out.extend(inner),
            other => out.push(other),
        }
    }
    Ok(Value::Array(out))
}
