//! Operations that generate fresh values on every call.

use rand::Rng;
use serde_json::Value;
use uuid::Uuid;

use crate::expr::value::number_value;
use crate::expr::{Evaluator, Operation, OperationSet};
use crate::types::{QuarryError, Result};

/// Registers `$uuid` and `$random`.
pub fn register(set: &mut OperationSet) {
    set.register("$uuid", Operation::Eager(uuid))
        .register("$random", Operation::Eager(random));
}

fn uuid(_operand: Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    Ok(Value::String(Uuid::new_v4().to_string()))
}

fn bound(options: &Value, key: &str, default: f64) -> Result<f64> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| QuarryError::eval(format!("$random '{key}' must be a number"))),
    }
}

/// Rounds to `precision` decimal places; negative precision rounds to a power of ten.
fn round_to(value: f64, precision: i32) -> f64 {
    if precision >= 0 {
        let scale = 10f64.powi(precision);
        (value * scale).round() / scale
    } else {
        let scale = 10f64.powi(-precision);
        (value / scale).round() * scale
    }
}

fn random(operand: Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    if !(operand.is_null() || operand.is_object()) {
        return Err(QuarryError::eval("$random expects {min, max, precision}"));
    }
    let min = bound(&operand, "min", 0.0)?;
    let max = bound(&operand, "max", 1.0)?;
    if min > max {
        return Err(QuarryError::eval(format!(
            "$random min {min} exceeds max {max}"
        )));
    }
    let raw = if min == max {
        min
    } else {
        rand::thread_rng().gen_range(min..max)
    };
    let value = match operand.get("precision").and_then(Value::as_i64) {
        Some(precision) => round_to(raw, precision.clamp(-15, 15) as i32),
        None => raw,
    };
    Ok(number_value(value))
}
