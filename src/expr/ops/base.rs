//! Core operations: identity, path access, quoting, branching, and composition.

use serde_json::Value;
use tracing::debug;

use crate::expr::value::{deep_equal, split_path, truthy};
use crate::expr::{single_entry, Evaluator, Operation, OperationSet};
use crate::types::{QuarryError, Result};

/// Registers the core family.
pub fn register(set: &mut OperationSet) {
    set.register("$identity", Operation::Eager(identity))
        .register("$get", Operation::Eager(get))
        .register("$literal", Operation::Controlled(literal))
        .register("$if", Operation::Controlled(if_then_else))
        .register("$case", Operation::Controlled(case))
        .register("$pipe", Operation::Controlled(pipe))
        .register("$compose", Operation::Controlled(compose))
        .register("$ensurePath", Operation::Eager(ensure_path))
        .register("$debug", Operation::Eager(debug_value))
        .register("$echo", Operation::Eager(echo));
}

fn identity(operand: Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    Ok(operand)
}

fn path_operand<'v>(name: &str, operand: &'v Value) -> Result<&'v str> {
    operand
        .as_str()
        .ok_or_else(|| QuarryError::eval(format!("{name} expects a path string, got {operand}")))
}

fn get(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let path = path_operand("$get", &operand)?;
    ctx.input().lookup(&split_path(path))
}

fn literal(operand: &Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    Ok(operand.clone())
}

fn if_then_else(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let Value::Object(clauses) = operand else {
        return Err(QuarryError::eval("$if expects {if, then, else}"));
    };
    let condition = clauses
        .get("if")
        .ok_or_else(|| QuarryError::eval("$if requires an 'if' clause"))?;
    let branch = if truthy(&ctx.eval(condition)?) {
        clauses.get("then")
    } else {
        clauses.get("else")
    };
    branch.map_or(Ok(Value::Null), |expr| ctx.eval(expr))
}

fn case(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let Value::Object(clauses) = operand else {
        return Err(QuarryError::eval("$case expects {value, cases, default}"));
    };
    let subject = match clauses.get("value") {
        Some(expr) => ctx.eval(expr)?,
        None => ctx.input_value()?,
    };
    let cases = match clauses.get("cases") {
        Some(Value::Array(cases)) => cases.as_slice(),
        Some(_) => return Err(QuarryError::eval("$case 'cases' must be an array")),
        None => &[],
    };
    for entry in cases {
        let (Some(when), Some(then)) = (entry.get("when"), entry.get("then")) else {
            return Err(QuarryError::eval("$case entries need 'when' and 'then'"));
        };
        let matched = if ctx.is_expression(when) {
            truthy(&ctx.eval_with(when, &subject)?)
        } else {
            deep_equal(&ctx.eval(when)?, &subject)
        };
        if matched {
            return ctx.eval(then);
        }
    }
    clauses
        .get("default")
        .map_or(Ok(Value::Null), |expr| ctx.eval(expr))
}

fn steps<'v>(name: &str, operand: &'v Value, ctx: &Evaluator<'_>) -> Result<&'v [Value]> {
    let Value::Array(steps) = operand else {
        return Err(QuarryError::eval(format!(
            "{name} expects an array of expressions"
        )));
    };
    if let Some(bad) = steps.iter().find(|step| !ctx.is_expression(step)) {
        if let Some((op, _)) = single_entry(bad).filter(|(op, _)| op.starts_with('$')) {
            return Err(QuarryError::UnsupportedExpression { name: op.to_owned() });
        }
        return Err(QuarryError::eval(format!(
            "{name} steps must be expressions, got {bad}"
        )));
    }
    Ok(steps)
}

fn run_steps<'v, I>(mut steps: I, ctx: &Evaluator<'_>) -> Result<Value>
where
    I: Iterator<Item = &'v Value>,
{
    let Some(first) = steps.next() else {
        return ctx.input_value();
    };
    let mut acc = ctx.eval(first)?;
    for step in steps {
        acc = ctx.eval_with(step, &acc)?;
    }
    Ok(acc)
}

fn pipe(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    run_steps(steps("$pipe", operand, ctx)?.iter(), ctx)
}

fn compose(operand: &Value, ctx: &Evaluator<'_>) -> Result<Value> {
    run_steps(steps("$compose", operand, ctx)?.iter().rev(), ctx)
}

fn ensure_path(operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    let path = path_operand("$ensurePath", &operand)?;
    if !ctx.input().has_path(&split_path(path))? {
        return Err(QuarryError::eval(format!("path '{path}' does not exist")));
    }
    ctx.input_value()
}

fn debug_value(operand: Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    debug!(value = %operand, "$debug");
    Ok(operand)
}

fn echo(_operand: Value, ctx: &Evaluator<'_>) -> Result<Value> {
    ctx.input_value()
}
