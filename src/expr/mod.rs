//! Interpreter for the JSON-tree expression language.
//!
//! An expression is a single-key object `{"$name": operand}` whose key is
//! registered in the engine's [`OperationSet`]. Everything else is data:
//! arrays and objects are walked so nested expressions still evaluate, and
//! primitives pass through unchanged.
//!
//! Operations come in two flavors (see [`Operation`]): eager operations
//! receive their operand already evaluated bottom-up, while controlled
//! operations receive the raw operand plus an [`Evaluator`] and decide what
//! to evaluate and in which order. Short-circuiting logic, branching,
//! pipelines, iteration, and literal quoting are all controlled.
//!
//! Input data is reached through the [`Scope`] trait. Plain JSON values are
//! scopes; the executor supplies scopes over prepared records so paths can
//! walk relationships. [`Engine::evaluate`] runs with [`Detached`], which
//! rejects any attempt to read input.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::types::{QuarryError, Result};

/// Built-in operation families.
pub mod ops;
/// JSON helpers: paths, truthiness, equality, ordering.
pub mod value;

pub use value::{compare_values, deep_equal, lookup_path, number_value, split_path, truthy};

/// Input data an expression is applied to.
pub trait Scope {
    /// Reads the value at `path`; missing segments yield `null`.
    fn lookup(&self, path: &[&str]) -> Result<Value>;

    /// Whether every segment of `path` exists.
    fn has_path(&self, path: &[&str]) -> Result<bool>;

    /// Materializes the whole input as JSON.
    fn to_value(&self) -> Result<Value>;
}

impl Scope for Value {
    fn lookup(&self, path: &[&str]) -> Result<Value> {
        Ok(value::lookup_path(self, path))
    }

    fn has_path(&self, path: &[&str]) -> Result<bool> {
        Ok(value::has_path(self, path))
    }

    fn to_value(&self) -> Result<Value> {
        Ok(self.clone())
    }
}

/// Scope used by context-free evaluation: every read fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct Detached;

impl Scope for Detached {
    fn lookup(&self, path: &[&str]) -> Result<Value> {
        Err(QuarryError::eval(format!(
            "path '{}' requires input data",
            path.join(".")
        )))
    }

    fn has_path(&self, path: &[&str]) -> Result<bool> {
        self.lookup(path).map(|_| false)
    }

    fn to_value(&self) -> Result<Value> {
        Err(QuarryError::eval("expression requires input data"))
    }
}

/// Handler for an operation that receives its operand pre-evaluated.
pub type EagerFn = fn(Value, &Evaluator<'_>) -> Result<Value>;

/// Handler for an operation that receives its raw operand.
pub type ControlledFn = fn(&Value, &Evaluator<'_>) -> Result<Value>;

/// A registered operation.
#[derive(Clone, Copy)]
pub enum Operation {
    /// Operand is deep-evaluated before the handler runs.
    Eager(EagerFn),
    /// Handler controls evaluation of its raw operand.
    Controlled(ControlledFn),
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Eager(_) => f.write_str("Eager"),
            Operation::Controlled(_) => f.write_str("Controlled"),
        }
    }
}

/// Registry of operations keyed by `$`-prefixed name.
#[derive(Clone, Debug, Default)]
pub struct OperationSet {
    ops: FxHashMap<String, Operation>,
}

impl OperationSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in operation.
    pub fn standard() -> Self {
        let mut set = Self::new();
        ops::base::register(&mut set);
        ops::logical::register(&mut set);
        ops::comparative::register(&mut set);
        ops::aggregative::register(&mut set);
        ops::iterative::register(&mut set);
        ops::generative::register(&mut set);
        ops::temporal::register(&mut set);
        set
    }

    /// Vocabulary allowed inside `where` clauses: core, logical, comparative,
    /// and iterative operations.
    pub fn where_ops() -> Self {
        let mut set = Self::new();
        ops::base::register(&mut set);
        ops::logical::register(&mut set);
        ops::comparative::register(&mut set);
        ops::iterative::register(&mut set);
        set
    }

    /// Vocabulary allowed inside `select`, `group.select`, and aggregates.
    pub fn select_ops() -> Self {
        Self::standard()
    }

    /// Registers (or replaces) an operation.
    pub fn register(&mut self, name: impl Into<String>, op: Operation) -> &mut Self {
        self.ops.insert(name.into(), op);
        self
    }

    /// Returns a copy without the named operations.
    pub fn without<'a, I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.ops.remove(name);
        }
        self
    }

    /// Returns a copy restricted to the named operations.
    pub fn only<'a, I>(self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut restricted = Self::new();
        for name in names {
            if let Some(op) = self.ops.get(name) {
                restricted.ops.insert(name.to_owned(), *op);
            }
        }
        restricted
    }

    /// Looks up an operation.
    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.ops.get(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Expression interpreter parameterized by an operation set.
#[derive(Clone, Debug)]
pub struct Engine {
    ops: Arc<OperationSet>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::standard()
    }
}

impl Engine {
    /// Builds an engine over `ops`.
    pub fn new(ops: OperationSet) -> Self {
        Self { ops: Arc::new(ops) }
    }

    /// Engine with every built-in operation.
    pub fn standard() -> Self {
        Self::new(OperationSet::standard())
    }

    /// Engine restricted to the `where` vocabulary.
    pub fn for_where() -> Self {
        Self::new(OperationSet::where_ops())
    }

    /// Engine for projections and aggregates.
    pub fn for_select() -> Self {
        Self::new(OperationSet::select_ops())
    }

    /// The active operation set.
    pub fn operations(&self) -> &OperationSet {
        &self.ops
    }

    /// Whether `value` is a single-key object naming a registered operation.
    pub fn is_expression(&self, value: &Value) -> bool {
        single_entry(value).is_some_and(|(name, _)| self.ops.contains(name))
    }

    /// Evaluates `expr` against `input`.
    pub fn apply(&self, expr: &Value, input: &dyn Scope) -> Result<Value> {
        match expr {
            Value::Object(map) => {
                if let Some((name, operand)) = single_entry(expr) {
                    if let Some(op) = self.ops.get(name) {
                        return self.dispatch(*op, operand, input);
                    }
                    if name.starts_with('$') {
                        return Err(QuarryError::UnsupportedExpression {
                            name: name.to_owned(),
                        });
                    }
                }
                let mut out = Map::with_capacity(map.len());
                for (key, inner) in map {
                    out.insert(key.clone(), self.apply(inner, input)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.apply(item, input))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    /// Evaluates `expr` without input data.
    pub fn evaluate(&self, expr: &Value) -> Result<Value> {
        self.apply(expr, &Detached)
    }

    /// Prepares `expr` for repeated application; fails unless it is an expression.
    pub fn compile(&self, expr: &Value) -> Result<Compiled> {
        if !self.is_expression(expr) {
            return Err(QuarryError::eval(format!(
                "cannot compile a non-expression: {expr}"
            )));
        }
        Ok(Compiled {
            engine: self.clone(),
            expr: expr.clone(),
        })
    }

    fn dispatch(&self, op: Operation, operand: &Value, input: &dyn Scope) -> Result<Value> {
        let ctx = Evaluator {
            engine: self,
            input,
        };
        match op {
            Operation::Eager(handler) => {
                let evaluated = self.apply(operand, input)?;
                handler(evaluated, &ctx)
            }
            Operation::Controlled(handler) => handler(operand, &ctx),
        }
    }
}

/// Evaluation handle passed to operation handlers.
pub struct Evaluator<'a> {
    engine: &'a Engine,
    input: &'a dyn Scope,
}

impl<'a> Evaluator<'a> {
    /// Evaluates `expr` against the current input.
    pub fn eval(&self, expr: &Value) -> Result<Value> {
        self.engine.apply(expr, self.input)
    }

    /// Evaluates `expr` against a different input.
    pub fn eval_with(&self, expr: &Value, input: &dyn Scope) -> Result<Value> {
        self.engine.apply(expr, input)
    }

    /// The engine's expression predicate.
    pub fn is_expression(&self, value: &Value) -> bool {
        self.engine.is_expression(value)
    }

    /// Current input.
    pub fn input(&self) -> &dyn Scope {
        self.input
    }

    /// Current input materialized as JSON.
    pub fn input_value(&self) -> Result<Value> {
        self.input.to_value()
    }
}

/// An expression bound to its engine.
#[derive(Clone, Debug)]
pub struct Compiled {
    engine: Engine,
    expr: Value,
}

impl Compiled {
    /// Applies the compiled expression to `input`.
    pub fn apply(&self, input: &dyn Scope) -> Result<Value> {
        self.engine.apply(&self.expr, input)
    }

    /// The source expression.
    pub fn expr(&self) -> &Value {
        &self.expr
    }
}

/// Splits a single-key object into `(key, value)`.
pub(crate) fn single_entry(value: &Value) -> Option<(&str, &Value)> {
    match value {
        Value::Object(map) if map.len() == 1 => map.iter().next().map(|(k, v)| (k.as_str(), v)),
        _ => None,
    }
}
