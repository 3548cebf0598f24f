//! Comparison operations.
//!
//! A two-element array operand compares its two evaluated elements. Any other
//! operand compares the current input against the evaluated operand, which is
//! the form normalized `where` clauses use inside `$pipe`. To compare the
//! input against a literal array, quote it with `$literal`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::expr::value::{compare_values, deep_equal};
use crate::expr::{Evaluator, Operation, OperationSet};
use crate::types::{QuarryError, Result};

/// Registers the comparative family.
pub fn register(set: &mut OperationSet) {
    set.register("$eq", Operation::Controlled(eq))
        .register("$ne", Operation::Controlled(ne))
        .register("$gt", Operation::Controlled(gt))
        .register("$gte", Operation::Controlled(gte))
        .register("$lt", Operation::Controlled(lt))
        .register("$lte", Operation::Controlled(lte))
        .register("$in", Operation::Controlled(in_list))
        .register("$nin", Operation::Controlled(not_in_list));
}

fn sides(operand: &Value, ctx: &Evaluator<'_>) -> Result<(Value, Value)> {
    match operand {
        Value::Array(pair) if pair.len() == 2 => Ok((ctx.eval(&pair[0])?, ctx.eval(&pair[1])?)),
        other => Ok((ctx.input_value()?, ctx.eval(other)?)),
    }
}

fn ordered(operand: &Value, ctx: &Evaluator<'_>, accept: fn(Ordering) -> bool) -> Result<Value> {
    let (left, right) = sides(operand, ctx)?;
    Ok(Value::Bool(accept(compare_values(&left, &right))))
}

fn eq(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let (left, right) = sides(operand, ctx)?;
    Ok(Value::Bool(deep_equal(&left, &right)))
}

fn ne(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let (left, right) = sides(operand, ctx)?;
    Ok(Value::Bool(!deep_equal(&left, &right)))
}

fn gt(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    ordered(operand, ctx, Ordering::is_gt)
}

fn gte(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    ordered(operand, ctx, Ordering::is_ge)
}

fn lt(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    ordered(operand, ctx, Ordering::is_lt)
}

fn lte(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    ordered(operand, ctx, Ordering::is_le)
}

fn membership(name: &str, operand: &Value, ctx: &Evaluator<'_>) -> Result<bool> {
    let Value::Array(candidates) = ctx.eval(operand)? else {
        return Err(QuarryError::eval(format!("{name} expects an array operand")));
    };
    let subject = ctx.input_value()?;
    Ok(candidates.iter().any(|candidate| deep_equal(candidate, &subject)))
}

fn in_list(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    membership("$in", operand, ctx).map(Value::Bool)
}

fn not_in_list(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    membership("$nin", operand, ctx).map(|found| Value::Bool(!found))
}
