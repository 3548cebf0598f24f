//! Fluent construction of raw query documents.

use serde_json::{json, Map, Value};

use crate::query::ast::Direction;
use crate::types::{QuarryError, Result};

/// Builds a raw query document for one resource type.
///
/// Misuse is latched and reported by [`QueryBuilder::build`]; once an error is
/// recorded later calls are ignored.
#[derive(Clone, Debug)]
pub struct QueryBuilder {
    resource_type: String,
    id: Option<String>,
    ids: Option<Vec<String>>,
    select: Vec<Value>,
    where_map: Map<String, Value>,
    where_exprs: Vec<Value>,
    order: Vec<Value>,
    slice: Map<String, Value>,
    group: Option<Value>,
    error: Option<Latched>,
}

impl QueryBuilder {
    /// Starts a query over `resource_type`.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            ids: None,
            select: Vec::new(),
            where_map: Map::new(),
            where_exprs: Vec::new(),
            order: Vec::new(),
            slice: Map::new(),
            group: None,
            error: None,
        }
    }

    fn record_error(&mut self, err: QuarryError) {
        if self.error.is_none() {
            self.error = Some(Latched::from(err));
        }
    }

    /// Restricts the query to a single record.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.ids.is_some() {
            self.record_error(QuarryError::invalid("'id' and 'ids' are mutually exclusive"));
            return self;
        }
        self.id = Some(id.into());
        self
    }

    /// Restricts the seed set to `ids`.
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.error.is_some() {
            return self;
        }
        if self.id.is_some() {
            self.record_error(QuarryError::invalid("'id' and 'ids' are mutually exclusive"));
            return self;
        }
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Appends attribute paths (or `"*"`) to the selection.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.error.is_some() {
            return self;
        }
        self.select
            .extend(fields.into_iter().map(|field| Value::String(field.into())));
        self
    }

    /// Appends an output key computed by `expr`.
    pub fn select_expr(mut self, key: impl Into<String>, expr: Value) -> Self {
        if self.error.is_some() {
            return self;
        }
        let mut entry = Map::new();
        entry.insert(key.into(), expr);
        self.select.push(Value::Object(entry));
        self
    }

    /// Appends a nested query over the relationship `name`.
    pub fn select_subquery(mut self, name: impl Into<String>, sub: QueryBuilder) -> Self {
        if self.error.is_some() {
            return self;
        }
        match sub.build_nested() {
            Ok(nested) => {
                let mut entry = Map::new();
                entry.insert(name.into(), nested);
                self.select.push(Value::Object(entry));
            }
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Requires `attr` to equal `value`.
    pub fn where_eq(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        if self.error.is_some() {
            return self;
        }
        self.where_map.insert(attr.into(), value.into());
        self
    }

    /// Adds a filter expression; every filter must hold.
    pub fn where_expr(mut self, expr: Value) -> Self {
        if self.error.is_some() {
            return self;
        }
        match expr.as_object() {
            Some(map) if map.len() == 1 && map.keys().all(|k| k.starts_with('$')) => {
                self.where_exprs.push(expr)
            }
            _ => self.record_error(QuarryError::invalid(format!(
                "where_expr expects an expression, got {expr}"
            ))),
        }
        self
    }

    /// Appends a sort key.
    pub fn order_by(mut self, attr: impl Into<String>, direction: Direction) -> Self {
        if self.error.is_some() {
            return self;
        }
        let attr: String = attr.into();
        self.order.push(json!({ attr: direction.as_str() }));
        self
    }

    /// Keeps at most `n` rows.
    pub fn limit(mut self, n: i64) -> Self {
        if self.error.is_some() {
            return self;
        }
        if n < 1 {
            self.record_error(QuarryError::Range(format!("limit must be at least 1, got {n}")));
            return self;
        }
        self.slice.insert("limit".into(), n.into());
        self
    }

    /// Skips `n` rows.
    pub fn offset(mut self, n: i64) -> Self {
        if self.error.is_some() {
            return self;
        }
        if n < 0 {
            self.record_error(QuarryError::Range(format!("offset must not be negative, got {n}")));
            return self;
        }
        self.slice.insert("offset".into(), n.into());
        self
    }

    /// Keeps rows strictly after `anchor` in sort order.
    pub fn after(self, anchor: Value) -> Self {
        self.cursor("after", anchor)
    }

    /// Keeps rows strictly before `anchor` in sort order.
    pub fn before(self, anchor: Value) -> Self {
        self.cursor("before", anchor)
    }

    fn cursor(mut self, key: &str, anchor: Value) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !anchor.is_object() {
            self.record_error(QuarryError::invalid(format!(
                "'{key}' anchors must be objects, got {anchor}"
            )));
            return self;
        }
        self.slice.insert(key.into(), anchor);
        self
    }

    /// Replaces the select stage with a rollup.
    pub fn group(mut self, group: GroupBuilder) -> Self {
        if self.error.is_some() {
            return self;
        }
        match group.build() {
            Ok(value) => self.group = Some(value),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Produces the raw query document.
    pub fn build(self) -> Result<Value> {
        let resource_type = self.resource_type.clone();
        let mut doc = self.build_nested()?;
        if let Value::Object(map) = &mut doc {
            map.insert("type".into(), Value::String(resource_type));
        }
        Ok(doc)
    }

    fn build_nested(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        let mut doc = Map::new();
        if let Some(id) = self.id {
            doc.insert("id".into(), Value::String(id));
        }
        if let Some(ids) = self.ids {
            doc.insert("ids".into(), json!(ids));
        }
        doc.insert("select".into(), Value::Array(self.select));
        if let Some(filter) = where_document(self.where_map, self.where_exprs) {
            doc.insert("where".into(), filter);
        }
        if !self.order.is_empty() {
            doc.insert("order".into(), Value::Array(self.order));
        }
        if !self.slice.is_empty() {
            doc.insert("slice".into(), Value::Object(self.slice));
        }
        if let Some(group) = self.group {
            doc.insert("group".into(), group);
        }
        Ok(Value::Object(doc))
    }
}

/// A builder error kept in a form that survives `Clone`.
#[derive(Clone, Debug)]
enum Latched {
    Range(String),
    Invalid(String),
}

impl From<QuarryError> for Latched {
    fn from(err: QuarryError) -> Self {
        match err {
            QuarryError::Range(message) => Latched::Range(message),
            QuarryError::InvalidQuery(message) => Latched::Invalid(message),
            other => Latched::Invalid(other.to_string()),
        }
    }
}

impl From<Latched> for QuarryError {
    fn from(err: Latched) -> Self {
        match err {
            Latched::Range(message) => QuarryError::Range(message),
            Latched::Invalid(message) => QuarryError::InvalidQuery(message),
        }
    }
}

fn where_document(map: Map<String, Value>, mut exprs: Vec<Value>) -> Option<Value> {
    if !map.is_empty() {
        exprs.insert(0, Value::Object(map));
    }
    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(json!({ "$and": exprs })),
    }
}

/// Builds a `group` clause.
#[derive(Clone, Debug)]
pub struct GroupBuilder {
    by: Vec<String>,
    select: Map<String, Value>,
    aggregates: Map<String, Value>,
    where_exprs: Vec<Value>,
    order: Vec<Value>,
    slice: Map<String, Value>,
    group: Option<Box<GroupBuilder>>,
    error: Option<Latched>,
}

impl GroupBuilder {
    /// Groups by the given paths.
    pub fn by<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by: paths.into_iter().map(Into::into).collect(),
            select: Map::new(),
            aggregates: Map::new(),
            where_exprs: Vec::new(),
            order: Vec::new(),
            slice: Map::new(),
            group: None,
            error: None,
        }
    }

    /// Adds an output key computed from the bucket's `by` values.
    pub fn select(mut self, key: impl Into<String>, value: Value) -> Self {
        self.select.insert(key.into(), value);
        self
    }

    /// Adds an aggregate evaluated over each bucket's members.
    pub fn aggregate(mut self, key: impl Into<String>, expr: Value) -> Self {
        self.aggregates.insert(key.into(), expr);
        self
    }

    /// Filters bucket rows.
    pub fn where_expr(mut self, expr: Value) -> Self {
        self.where_exprs.push(expr);
        self
    }

    /// Orders bucket rows.
    pub fn order_by(mut self, path: impl Into<String>, direction: Direction) -> Self {
        let path: String = path.into();
        self.order.push(json!({ path: direction.as_str() }));
        self
    }

    /// Keeps at most `n` bucket rows.
    pub fn limit(mut self, n: i64) -> Self {
        if n < 1 && self.error.is_none() {
            self.error = Some(Latched::Range(format!("limit must be at least 1, got {n}")));
        }
        self.slice.insert("limit".into(), n.into());
        self
    }

    /// Rolls the bucket rows up again.
    pub fn group(mut self, nested: GroupBuilder) -> Self {
        self.group = Some(Box::new(nested));
        self
    }

    fn build(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        if self.by.is_empty() {
            return Err(QuarryError::invalid("group requires at least one 'by' path"));
        }
        let mut doc = Map::new();
        doc.insert("by".into(), json!(self.by));
        if !self.select.is_empty() {
            doc.insert("select".into(), Value::Object(self.select));
        }
        doc.insert("aggregates".into(), Value::Object(self.aggregates));
        if let Some(filter) = where_document(Map::new(), self.where_exprs) {
            doc.insert("where".into(), filter);
        }
        if !self.order.is_empty() {
            doc.insert("order".into(), Value::Array(self.order));
        }
        if !self.slice.is_empty() {
            doc.insert("slice".into(), Value::Object(self.slice));
        }
        if let Some(nested) = self.group {
            doc.insert("group".into(), nested.build()?);
        }
        Ok(Value::Object(doc))
    }
}
