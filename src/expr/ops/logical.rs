//! Short-circuiting boolean operations.

use serde_json::Value;

use crate::expr::value::truthy;
use crate::expr::{Evaluator, Operation, OperationSet};
use crate::types::{QuarryError, Result};

/// Registers `$and`, `$or`, and `$not`.
pub fn register(set: &mut OperationSet) {
    set.register("$and", Operation::Controlled(and))
        .register("$or", Operation::Controlled(or))
        .register("$not", Operation::Controlled(not));
}

fn operands<'v>(name: &str, operand: &'v Value) -> Result<&'v [Value]> {
    match operand {
        Value::Array(items) => Ok(items),
        other => Err(QuarryError::eval(format!(
            "{name} expects an array, got {other}"
        ))),
    }
}

fn and(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    for item in operands("$and", operand)? {
        if !truthy(&ctx.eval(item)?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn or(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    for item in operands("$or", operand)? {
        if truthy(&ctx.eval(item)?) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn not(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    Ok(Value::Bool(!truthy(&ctx.eval(operand)?)))
}
