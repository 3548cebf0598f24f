//! Rewrites shorthand query documents into [`NormalQuery`].
//!
//! Accepted shorthands:
//!
//! - `select`: `"*"`, a string, an array mixing attribute names with
//!   `{relationship: subquery}` objects, or an object. A `"*"` entry expands to
//!   every declared attribute; explicitly listed keys override wildcard entries.
//! - `where`: an attribute map `{attr: value | expression}` becomes
//!   `$pipe`/`$get`/`$eq` chains joined by `$and`; operands of `$and`, `$or`,
//!   and `$not` are rewritten the same way.
//! - `order`: a single object (one key per entry) or a list of them.
//! - `limit` and `offset` at the top level fold into `slice`.
//! - `group.by` as a string, `group.select` defaulting to `by`.

use std::sync::OnceLock;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::expr::single_entry;
use crate::query::ast::{Direction, GroupQuery, GroupSelection, NormalQuery, OrderKey, Selection, Slice};
use crate::query::executor::Engines;
use crate::schema::{ResourceSchema, Schema};
use crate::types::{QuarryError, Result};

/// Anything that can become a [`NormalQuery`].
///
/// A `NormalQuery` converts to itself without inspecting the schema, which
/// makes repeated normalization free.
pub trait IntoNormalQuery {
    /// Performs the conversion.
    fn into_normal(self, schema: &Schema, engines: &Engines) -> Result<NormalQuery>;
}

impl IntoNormalQuery for NormalQuery {
    fn into_normal(self, _schema: &Schema, _engines: &Engines) -> Result<NormalQuery> {
        Ok(self)
    }
}

impl IntoNormalQuery for &NormalQuery {
    fn into_normal(self, _schema: &Schema, _engines: &Engines) -> Result<NormalQuery> {
        Ok(self.clone())
    }
}

impl IntoNormalQuery for &Value {
    fn into_normal(self, schema: &Schema, engines: &Engines) -> Result<NormalQuery> {
        let Value::Object(raw) = self else {
            return Err(QuarryError::invalid("query must be an object"));
        };
        let resource_type = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| QuarryError::invalid("query requires a string 'type'"))?;
        Normalizer { schema, engines }.query(resource_type, raw)
    }
}

impl IntoNormalQuery for Value {
    fn into_normal(self, schema: &Schema, engines: &Engines) -> Result<NormalQuery> {
        (&self).into_normal(schema, engines)
    }
}

fn default_engines() -> &'static Engines {
    static ENGINES: OnceLock<Engines> = OnceLock::new();
    ENGINES.get_or_init(Engines::default)
}

/// Normalizes `query` using the default where/select vocabularies.
pub fn normalize<Q: IntoNormalQuery>(schema: &Schema, query: Q) -> Result<NormalQuery> {
    query.into_normal(schema, default_engines())
}

/// Normalizes `query`, recognizing expressions with `engines`.
pub fn normalize_with<Q: IntoNormalQuery>(
    schema: &Schema,
    engines: &Engines,
    query: Q,
) -> Result<NormalQuery> {
    query.into_normal(schema, engines)
}

struct Normalizer<'a> {
    schema: &'a Schema,
    engines: &'a Engines,
}

impl Normalizer<'_> {
    fn query(&self, resource_type: &str, raw: &Map<String, Value>) -> Result<NormalQuery> {
        let def = self.schema.resource(resource_type)?;
        let id = raw.get("id").filter(|v| !v.is_null()).map(id_string).transpose()?;
        let ids = match raw.get("ids") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(items.iter().map(id_string).collect::<Result<Vec<_>>>()?),
            Some(other) => {
                return Err(QuarryError::invalid(format!("'ids' must be an array, got {other}")))
            }
        };
        Ok(NormalQuery {
            resource_type: resource_type.to_owned(),
            id,
            ids,
            select: self.select(resource_type, def, raw.get("select"))?,
            where_clause: self.where_clause(raw.get("where"))?,
            order: order(raw.get("order"))?,
            slice: slice(raw)?,
            group: raw
                .get("group")
                .filter(|g| !g.is_null())
                .map(|g| self.group(g))
                .transpose()?,
        })
    }

    fn select(
        &self,
        resource_type: &str,
        def: &ResourceSchema,
        raw: Option<&Value>,
    ) -> Result<IndexMap<String, Selection>> {
        let entries: Vec<(String, Value)> = match raw {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(name)) => vec![(name.clone(), Value::String(name.clone()))],
            Some(Value::Array(items)) => {
                let mut entries = Vec::new();
                for item in items {
                    match item {
                        Value::String(name) => entries.push((name.clone(), item.clone())),
                        Value::Object(map) => {
                            entries.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())))
                        }
                        other => {
                            return Err(QuarryError::invalid(format!(
                                "select entries must be names or objects, got {other}"
                            )))
                        }
                    }
                }
                entries
            }
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(other) => {
                return Err(QuarryError::invalid(format!("malformed select: {other}")))
            }
        };

        let mut out = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            if key == "*" {
                for attribute in def.attributes.keys() {
                    out.entry(attribute.clone())
                        .or_insert_with(|| Selection::Attribute(attribute.clone()));
                }
                continue;
            }
            let selection = self.classify(resource_type, def, &key, &value)?;
            out.insert(key, selection);
        }
        Ok(out)
    }

    fn classify(
        &self,
        resource_type: &str,
        def: &ResourceSchema,
        key: &str,
        value: &Value,
    ) -> Result<Selection> {
        match value {
            Value::String(path) if def.relationship(path).is_some() => {
                Ok(Selection::Relationship(path.clone()))
            }
            Value::String(path) => Ok(Selection::Attribute(path.clone())),
            Value::Object(raw) => {
                if self.engines.select_engine.is_expression(value) {
                    return Ok(Selection::Expression(value.clone()));
                }
                reject_unknown_operation(value)?;
                let Some(rel) = def.relationship(key) else {
                    return Err(QuarryError::invalid(format!(
                        "select entry '{key}' on '{resource_type}' is not a relationship"
                    )));
                };
                if let Some(declared) = raw.get("type").and_then(Value::as_str) {
                    if declared != rel.target {
                        return Err(QuarryError::invalid(format!(
                            "subquery '{key}' targets '{}', not '{declared}'",
                            rel.target
                        )));
                    }
                }
                Ok(Selection::Subquery {
                    relationship: key.to_owned(),
                    query: Box::new(self.query(&rel.target, raw)?),
                })
            }
            constant => Ok(Selection::Expression(constant.clone())),
        }
    }

    fn where_clause(&self, raw: Option<&Value>) -> Result<Option<Value>> {
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) if map.is_empty() => Ok(None),
            Some(expr) => self.rewrite_where(expr).map(Some),
        }
    }

    fn rewrite_where(&self, raw: &Value) -> Result<Value> {
        if self.engines.where_engine.is_expression(raw) {
            let Some((name, operand)) = single_entry(raw) else {
                return Ok(raw.clone());
            };
            return match (name, operand) {
                ("$and" | "$or", Value::Array(items)) => {
                    let rewritten = items
                        .iter()
                        .map(|item| self.rewrite_where(item))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(json!({ name: rewritten }))
                }
                ("$not", operand) => Ok(json!({ "$not": self.rewrite_where(operand)? })),
                _ => Ok(raw.clone()),
            };
        }
        reject_unknown_operation(raw)?;
        let Value::Object(map) = raw else {
            return Ok(raw.clone());
        };
        let mut clauses = Vec::with_capacity(map.len());
        for (path, expected) in map {
            clauses.push(self.match_clause(path, expected)?);
        }
        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(json!({ "$and": clauses }))
        }
    }

    fn match_clause(&self, path: &str, expected: &Value) -> Result<Value> {
        let test = if self.engines.where_engine.is_expression(expected) {
            expected.clone()
        } else {
            reject_unknown_operation(expected)?;
            match expected {
                Value::Array(_) | Value::Object(_) => json!({ "$eq": { "$literal": expected } }),
                scalar => json!({ "$eq": scalar }),
            }
        };
        Ok(json!({ "$pipe": [{ "$get": path }, test] }))
    }

    fn group(&self, raw: &Value) -> Result<GroupQuery> {
        let Value::Object(map) = raw else {
            return Err(QuarryError::invalid(format!("group must be an object, got {raw}")));
        };
        let by = match map.get("by") {
            Some(Value::String(path)) => vec![path.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        QuarryError::invalid(format!("group.by entries must be paths, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(QuarryError::invalid(format!(
                    "group.by must be a path or list of paths, got {}",
                    other.unwrap_or(&Value::Null)
                )))
            }
        };

        let select = match map.get("select") {
            None | Some(Value::Null) => by
                .iter()
                .map(|path| (path.clone(), GroupSelection::By(path.clone())))
                .collect(),
            Some(Value::Array(items)) => {
                let mut select = IndexMap::new();
                for item in items {
                    match item {
                        Value::String(path) => {
                            select.insert(path.clone(), GroupSelection::By(path.clone()));
                        }
                        Value::Object(entries) => {
                            for (key, value) in entries {
                                select.insert(key.clone(), group_selection(value));
                            }
                        }
                        other => {
                            return Err(QuarryError::invalid(format!(
                                "group.select entries must be paths or objects, got {other}"
                            )))
                        }
                    }
                }
                select
            }
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(key, value)| (key.clone(), group_selection(value)))
                .collect(),
            Some(other) => {
                return Err(QuarryError::invalid(format!("malformed group.select: {other}")))
            }
        };

        let aggregates = match map.get("aggregates") {
            None | Some(Value::Null) => IndexMap::new(),
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Some(other) => {
                return Err(QuarryError::invalid(format!(
                    "group.aggregates must be an object, got {other}"
                )))
            }
        };

        Ok(GroupQuery {
            by,
            select,
            aggregates,
            where_clause: self.where_clause(map.get("where"))?,
            order: order(map.get("order"))?,
            slice: slice(map)?,
            group: map
                .get("group")
                .filter(|g| !g.is_null())
                .map(|g| self.group(g).map(Box::new))
                .transpose()?,
        })
    }
}

fn group_selection(value: &Value) -> GroupSelection {
    match value {
        Value::String(path) => GroupSelection::By(path.clone()),
        other => GroupSelection::Expression(other.clone()),
    }
}

/// Fails on `{"$name": ..}` objects whose operation is not in the vocabulary.
fn reject_unknown_operation(value: &Value) -> Result<()> {
    match single_entry(value) {
        Some((name, _)) if name.starts_with('$') => Err(QuarryError::UnsupportedExpression {
            name: name.to_owned(),
        }),
        _ => Ok(()),
    }
}

fn id_string(value: &Value) -> Result<String> {
    match value {
        Value::String(id) => Ok(id.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        other => Err(QuarryError::invalid(format!(
            "ids must be strings or integers, got {other}"
        ))),
    }
}

fn order(raw: Option<&Value>) -> Result<Vec<OrderKey>> {
    let mut keys = Vec::new();
    match raw {
        None | Some(Value::Null) => {}
        Some(Value::String(path)) => keys.push(OrderKey::asc(path.clone())),
        Some(Value::Object(entries)) => push_order_entries(&mut keys, entries)?,
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(path) => keys.push(OrderKey::asc(path.clone())),
                    Value::Object(entries) => push_order_entries(&mut keys, entries)?,
                    other => {
                        return Err(QuarryError::invalid(format!("malformed order entry: {other}")))
                    }
                }
            }
        }
        Some(other) => return Err(QuarryError::invalid(format!("malformed order: {other}"))),
    }
    Ok(keys)
}

fn push_order_entries(keys: &mut Vec<OrderKey>, entries: &Map<String, Value>) -> Result<()> {
    for (path, direction) in entries {
        let direction = direction.as_str().and_then(Direction::parse).ok_or_else(|| {
            QuarryError::invalid(format!(
                "order direction for '{path}' must be \"asc\" or \"desc\", got {direction}"
            ))
        })?;
        keys.push(OrderKey {
            path: path.clone(),
            direction,
        });
    }
    Ok(())
}

fn integer(name: &str, value: Option<&Value>) -> Result<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| QuarryError::invalid(format!("'{name}' must be an integer, got {v}"))),
    }
}

fn anchor(name: &str, value: Option<&Value>) -> Result<Option<Value>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v.clone())),
        Some(v) => Err(QuarryError::invalid(format!(
            "'{name}' must be an object of order values, got {v}"
        ))),
    }
}

fn slice(raw: &Map<String, Value>) -> Result<Slice> {
    let explicit = match raw.get("slice") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => return Err(QuarryError::invalid(format!("malformed slice: {other}"))),
    };
    let from_slice = |key: &str| explicit.and_then(|map| map.get(key)).filter(|v| !v.is_null());
    Ok(Slice {
        limit: integer("limit", from_slice("limit").or_else(|| raw.get("limit")))?,
        offset: integer("offset", from_slice("offset").or_else(|| raw.get("offset")))?,
        before: anchor("before", from_slice("before"))?,
        after: anchor("after", from_slice("after"))?,
    })
}
