//! Clock readings.

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::expr::{Evaluator, Operation, OperationSet};
use crate::types::{QuarryError, Result};

/// Registers `$nowUTC`, `$nowLocal`, and `$timestamp`.
pub fn register(set: &mut OperationSet) {
    set.register("$nowUTC", Operation::Eager(now_utc))
        .register("$nowLocal", Operation::Eager(now_local))
        .register("$timestamp", Operation::Eager(timestamp));
}

fn rfc3339(ts: OffsetDateTime) -> Result<Value> {
    ts.format(&Rfc3339)
        .map(Value::String)
        .map_err(|err| QuarryError::eval(format!("cannot format timestamp: {err}")))
}

fn now_utc(_operand: Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    rfc3339(OffsetDateTime::now_utc())
}

fn now_local(_operand: Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    // The local offset is unknowable in some multithreaded processes.
    rfc3339(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()))
}

fn timestamp(_operand: Value, _ctx: &Evaluator<'_>) -> Result<Value> {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    Ok(Value::from(millis as i64))
}
