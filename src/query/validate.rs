//! Pre-execution checks on raw query documents.

use serde_json::{Map, Value};

use crate::expr::{single_entry, Engine};
use crate::query::executor::Engines;
use crate::schema::{ResourceSchema, Schema};
use crate::types::ValidationIssue;

/// Checks a raw query against a schema before it is normalized or run.
pub trait Validator {
    /// Returns every problem found; an empty list means the query may run.
    fn validate(&self, schema: &Schema, query: &Value, engines: &Engines) -> Vec<ValidationIssue>;
}

/// Validator covering the shape of a query and the names it references.
///
/// Dotted paths are checked on their first segment only, since later segments
/// may live inside attribute values or on related types.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    fn validate(&self, schema: &Schema, query: &Value, engines: &Engines) -> Vec<ValidationIssue> {
        let mut walk = Walk {
            schema,
            engines,
            issues: Vec::new(),
            path: Vec::new(),
        };
        match query {
            Value::Object(raw) => match raw.get("type").and_then(Value::as_str) {
                Some(resource_type) => walk.query(resource_type, raw),
                None => walk.push("query requires a string 'type'", query),
            },
            other => walk.push("query must be an object", other),
        }
        walk.issues
    }
}

struct Walk<'a> {
    schema: &'a Schema,
    engines: &'a Engines,
    issues: Vec<ValidationIssue>,
    path: Vec<String>,
}

impl Walk<'_> {
    fn push(&mut self, message: impl Into<String>, value: &Value) {
        self.issues.push(ValidationIssue {
            message: message.into(),
            path: self.path.clone(),
            value: value.clone(),
        });
    }

    fn nested(&mut self, segment: &str, check: impl FnOnce(&mut Self)) {
        self.path.push(segment.to_owned());
        check(self);
        self.path.pop();
    }

    fn query(&mut self, resource_type: &str, raw: &Map<String, Value>) {
        let schema = self.schema;
        let Some(def) = schema.resources.get(resource_type) else {
            let value = Value::String(resource_type.to_owned());
            self.nested("type", |walk| {
                walk.push(format!("unknown resource type '{resource_type}'"), &value)
            });
            return;
        };
        if raw.contains_key("id") && raw.contains_key("ids") {
            self.push("'id' and 'ids' are mutually exclusive", &Value::Object(raw.clone()));
        }
        if let Some(ids) = raw.get("ids") {
            if !(ids.is_array() || ids.is_null()) {
                self.nested("ids", |walk| walk.push("'ids' must be an array", ids));
            }
        }
        for key in ["limit", "offset"] {
            if let Some(value) = raw.get(key) {
                self.nested(key, |walk| walk.integer(key, value));
            }
        }
        if let Some(Value::Object(slice)) = raw.get("slice") {
            for key in ["limit", "offset"] {
                if let Some(value) = slice.get(key) {
                    self.nested("slice", |walk| walk.nested(key, |walk| walk.integer(key, value)));
                }
            }
        }
        if let Some(select) = raw.get("select") {
            self.nested("select", |walk| walk.select(def, select));
        }
        if let Some(filter) = raw.get("where") {
            self.nested("where", |walk| walk.where_clause(def, filter));
        }
        if let Some(order) = raw.get("order") {
            self.nested("order", |walk| walk.order(Some(def), order));
        }
        if let Some(group) = raw.get("group") {
            self.nested("group", |walk| walk.group(group));
        }
    }

    fn integer(&mut self, key: &str, value: &Value) {
        if !(value.is_null() || value.is_i64()) {
            self.push(format!("'{key}' must be an integer"), value);
        }
    }

    fn field(&mut self, def: &ResourceSchema, path: &str, value: &Value) {
        let head = path.split('.').next().unwrap_or(path);
        if !def.has_field(head) {
            self.push(format!("'{head}' is not an attribute or relationship"), value);
        }
    }

    fn select(&mut self, def: &ResourceSchema, select: &Value) {
        match select {
            Value::Null => {}
            Value::String(name) if name == "*" => {}
            Value::String(name) => self.field(def, name, select),
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.nested(&index.to_string(), |walk| match item {
                        Value::String(name) if name == "*" => {}
                        Value::String(name) => walk.field(def, name, item),
                        Value::Object(entries) => walk.select_entries(def, entries),
                        other => walk.push("select entries must be names or objects", other),
                    });
                }
            }
            Value::Object(entries) => self.select_entries(def, entries),
            other => self.push("select must be a name, list, or object", other),
        }
    }

    fn select_entries(&mut self, def: &ResourceSchema, entries: &Map<String, Value>) {
        let engines = self.engines;
        let engine = &engines.select_engine;
        for (key, value) in entries {
            if key == "*" {
                continue;
            }
            self.nested(key, |walk| match value {
                Value::String(path) => walk.field(def, path, value),
                Value::Object(sub) if !engine.is_expression(value) => {
                    match def.relationship(key) {
                        Some(rel) => {
                            let target = rel.target.clone();
                            walk.query(&target, sub);
                        }
                        None => walk.push(format!("'{key}' is not a relationship"), value),
                    }
                }
                expr => walk.vocabulary(engine, expr),
            });
        }
    }

    fn where_clause(&mut self, def: &ResourceSchema, filter: &Value) {
        let engines = self.engines;
        let engine = &engines.where_engine;
        if engine.is_expression(filter) {
            self.vocabulary(engine, filter);
            let operands: &[Value] = match single_entry(filter) {
                Some(("$and" | "$or", Value::Array(items))) => items,
                Some(("$not", operand)) => std::slice::from_ref(operand),
                _ => &[],
            };
            for item in operands {
                if item.is_object() && !engine.is_expression(item) {
                    self.where_clause(def, item);
                }
            }
            return;
        }
        match filter {
            Value::Null => {}
            Value::Object(entries) => {
                for (path, expected) in entries {
                    self.nested(path, |walk| {
                        walk.field(def, path, expected);
                        walk.vocabulary(engine, expected);
                    });
                }
            }
            other => self.push("where must be an attribute map or expression", other),
        }
    }

    /// Reports `$`-named operations missing from `engine`, anywhere in `value`.
    fn vocabulary(&mut self, engine: &Engine, value: &Value) {
        if let Some((name, operand)) = single_entry(value) {
            if name.starts_with('$') {
                if !engine.operations().contains(name) {
                    self.push(format!("'{name}' is not available here"), value);
                }
                if name != "$literal" {
                    self.vocabulary(engine, operand);
                }
                return;
            }
        }
        match value {
            Value::Array(items) => items.iter().for_each(|item| self.vocabulary(engine, item)),
            Value::Object(entries) => entries.values().for_each(|item| self.vocabulary(engine, item)),
            _ => {}
        }
    }

    /// Group rows carry computed keys, so they pass `None` and skip field checks.
    fn order(&mut self, def: Option<&ResourceSchema>, order: &Value) {
        let field = |walk: &mut Self, path: &str, value: &Value| {
            if let Some(def) = def {
                walk.field(def, path, value);
            }
        };
        let check = |walk: &mut Self, entries: &Map<String, Value>| {
            for (path, direction) in entries {
                field(walk, path, direction);
                if !matches!(direction.as_str(), Some("asc" | "desc")) {
                    walk.push(format!("order direction for '{path}' must be asc or desc"), direction);
                }
            }
        };
        match order {
            Value::Null => {}
            Value::String(path) => field(self, path, order),
            Value::Object(entries) => check(self, entries),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(path) => field(self, path, item),
                        Value::Object(entries) => check(self, entries),
                        other => self.push("order entries must be objects", other),
                    }
                }
            }
            other => self.push("order must be an object or list", other),
        }
    }

    fn group(&mut self, group: &Value) {
        let Value::Object(raw) = group else {
            self.push("group must be an object", group);
            return;
        };
        match raw.get("by") {
            Some(Value::String(_)) => {}
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
            other => self.push(
                "group.by must be a path or list of paths",
                other.unwrap_or(&Value::Null),
            ),
        }
        let engines = self.engines;
        if let Some(select) = raw.get("select") {
            self.nested("select", |walk| match select {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items.iter().filter(|item| !item.is_string()) {
                        walk.vocabulary(&engines.select_engine, item);
                    }
                }
                Value::Object(_) => walk.vocabulary(&engines.select_engine, select),
                other => walk.push("group.select must be a list or object", other),
            });
        }
        if let Some(aggregates) = raw.get("aggregates") {
            match aggregates {
                Value::Object(_) | Value::Null => {
                    self.nested("aggregates", |walk| {
                        walk.vocabulary(&engines.select_engine, aggregates)
                    });
                }
                other => self.push("group.aggregates must be an object", other),
            }
        }
        if let Some(filter) = raw.get("where") {
            self.nested("where", |walk| match filter {
                Value::Null | Value::Object(_) => walk.vocabulary(&engines.where_engine, filter),
                other => walk.push("where must be an attribute map or expression", other),
            });
        }
        if let Some(order) = raw.get("order") {
            self.nested("order", |walk| walk.order(None, order));
        }
        if let Some(nested) = raw.get("group") {
            self.nested("group", |walk| walk.group(nested));
        }
    }
}
