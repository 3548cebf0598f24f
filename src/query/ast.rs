//! Canonical query shape produced by the normalizer.
//!
//! Raw query documents accept several shorthands; [`NormalQuery`] has exactly
//! one spelling for each concept and is what the executor consumes. Holding a
//! `NormalQuery` is proof of normalization, so normalizing one again is an
//! identity return.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl Direction {
    /// Parses `"asc"` or `"desc"`.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }

    /// The keyword used in query documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// One `(path, direction)` entry of an order list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderKey {
    /// Dotted path read from each row.
    pub path: String,
    /// Sort direction.
    pub direction: Direction,
}

impl OrderKey {
    /// Ascending key on `path`.
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending key on `path`.
    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Desc,
        }
    }
}

/// Cursor and window bounds applied after sorting.
///
/// `limit` and `offset` stay signed so out-of-range values reach the executor,
/// which rejects them with a range error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Slice {
    /// Maximum number of rows to keep.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: Option<i64>,
    /// Keep rows strictly before this anchor.
    pub before: Option<Value>,
    /// Keep rows strictly after this anchor.
    pub after: Option<Value>,
}

impl Slice {
    /// Whether no bound is set.
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none() && self.before.is_none() && self.after.is_none()
    }

    fn to_value(&self) -> Value {
        let mut out = Map::new();
        if let Some(limit) = self.limit {
            out.insert("limit".into(), limit.into());
        }
        if let Some(offset) = self.offset {
            out.insert("offset".into(), offset.into());
        }
        if let Some(before) = &self.before {
            out.insert("before".into(), before.clone());
        }
        if let Some(after) = &self.after {
            out.insert("after".into(), after.clone());
        }
        Value::Object(out)
    }
}

/// A classified `select` entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// Attribute path, possibly dotted through relationships.
    Attribute(String),
    /// Relationship emitted as bare `{type, id}` refs.
    Relationship(String),
    /// Expression evaluated against the record.
    Expression(Value),
    /// Nested query over the related records.
    Subquery {
        /// Relationship the subquery follows.
        relationship: String,
        /// Query scoped to the relationship's target type.
        query: Box<NormalQuery>,
    },
}

impl Selection {
    fn to_value(&self) -> Value {
        match self {
            Selection::Attribute(path) => Value::String(path.clone()),
            Selection::Relationship(name) => Value::String(name.clone()),
            Selection::Expression(expr) => expr.clone(),
            Selection::Subquery { query, .. } => query.to_value(),
        }
    }
}

/// A `group.select` entry.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupSelection {
    /// Echoes the bucket's value for a `by` path.
    By(String),
    /// Expression evaluated against the bucket's scalar view.
    Expression(Value),
}

/// Normalized `group` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupQuery {
    /// Paths whose value tuple keys a bucket.
    pub by: Vec<String>,
    /// Output fields computed per bucket.
    pub select: IndexMap<String, GroupSelection>,
    /// Expressions evaluated against each bucket's member rows.
    pub aggregates: IndexMap<String, Value>,
    /// Filter over bucket rows.
    pub where_clause: Option<Value>,
    /// Order over bucket rows.
    pub order: Vec<OrderKey>,
    /// Window over bucket rows.
    pub slice: Slice,
    /// Further rollup of the bucket rows.
    pub group: Option<Box<GroupQuery>>,
}

impl GroupQuery {
    /// Canonical JSON form.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "by".into(),
            Value::Array(self.by.iter().cloned().map(Value::String).collect()),
        );
        let select = self
            .select
            .iter()
            .map(|(key, entry)| {
                let value = match entry {
                    GroupSelection::By(path) => Value::String(path.clone()),
                    GroupSelection::Expression(expr) => expr.clone(),
                };
                (key.clone(), value)
            })
            .collect();
        out.insert("select".into(), Value::Object(select));
        out.insert(
            "aggregates".into(),
            Value::Object(self.aggregates.clone().into_iter().collect()),
        );
        write_tail(&mut out, &self.where_clause, &self.order, &self.slice);
        if let Some(group) = &self.group {
            out.insert("group".into(), group.to_value());
        }
        Value::Object(out)
    }
}

/// A query in canonical form.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalQuery {
    /// Resource type the query reads.
    pub resource_type: String,
    /// Restricts the query to one record; the result is an object or `null`.
    pub id: Option<String>,
    /// Restricts the seed set to these ids.
    pub ids: Option<Vec<String>>,
    /// Output fields in output order. Empty means bare refs.
    pub select: IndexMap<String, Selection>,
    /// Filter expression.
    pub where_clause: Option<Value>,
    /// Sort keys, primary first.
    pub order: Vec<OrderKey>,
    /// Cursor and window.
    pub slice: Slice,
    /// Rollup replacing the select stage.
    pub group: Option<GroupQuery>,
}

impl NormalQuery {
    /// Empty query over `resource_type`.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            ids: None,
            select: IndexMap::new(),
            where_clause: None,
            order: Vec::new(),
            slice: Slice::default(),
            group: None,
        }
    }

    /// Canonical JSON form; normalizing it yields an equal query.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.resource_type.clone()));
        if let Some(id) = &self.id {
            out.insert("id".into(), Value::String(id.clone()));
        }
        if let Some(ids) = &self.ids {
            out.insert(
                "ids".into(),
                Value::Array(ids.iter().cloned().map(Value::String).collect()),
            );
        }
        let select = self
            .select
            .iter()
            .map(|(key, entry)| (key.clone(), entry.to_value()))
            .collect();
        out.insert("select".into(), Value::Object(select));
        write_tail(&mut out, &self.where_clause, &self.order, &self.slice);
        if let Some(group) = &self.group {
            out.insert("group".into(), group.to_value());
        }
        Value::Object(out)
    }
}

fn write_tail(out: &mut Map<String, Value>, where_clause: &Option<Value>, order: &[OrderKey], slice: &Slice) {
    if let Some(expr) = where_clause {
        out.insert("where".into(), expr.clone());
    }
    if !order.is_empty() {
        let keys = order
            .iter()
            .map(|key| {
                let mut entry = Map::new();
                entry.insert(key.path.clone(), Value::String(key.direction.as_str().into()));
                Value::Object(entry)
            })
            .collect();
        out.insert("order".into(), Value::Array(keys));
    }
    if !slice.is_empty() {
        out.insert("slice".into(), slice.to_value());
    }
}
