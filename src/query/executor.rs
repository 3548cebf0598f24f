//! Query execution over a prepared graph.
//!
//! Each (sub)query runs the same stages: seed, where, order, cursor and
//! window, then either projection or a group rollup. Relationship paths in
//! `where`, `order`, and `select` resolve through the prepared graph, so
//! records are only dereferenced when a stage actually reads through them.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use tracing::debug;

use crate::expr::value::{self, split_path, truthy, WILDCARD};
use crate::expr::{Engine, Scope};
use crate::graph::{PreparedGraph, PreparedNode, Related};
use crate::query::ast::{NormalQuery, OrderKey, Selection};
use crate::query::group::rollup;
use crate::query::order;
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::schema::{Cardinality, Schema};
use crate::types::Result;

/// The expression vocabularies a query runs with.
#[derive(Clone, Debug)]
pub struct Engines {
    /// Evaluates `where` clauses.
    pub where_engine: Engine,
    /// Evaluates `select` expressions and aggregates.
    pub select_engine: Engine,
}

impl Default for Engines {
    fn default() -> Self {
        Self {
            where_engine: Engine::for_where(),
            select_engine: Engine::for_select(),
        }
    }
}

/// Runs normalized queries against one prepared graph.
pub struct Executor<'a> {
    schema: &'a Schema,
    graph: &'a PreparedGraph,
    engines: &'a Engines,
}

impl<'a> Executor<'a> {
    /// Creates an executor.
    pub fn new(schema: &'a Schema, graph: &'a PreparedGraph, engines: &'a Engines) -> Self {
        Self {
            schema,
            graph,
            engines,
        }
    }

    /// Runs a root query.
    ///
    /// An `id` query yields the record or `null`; other queries yield an
    /// array, as do grouped queries.
    pub fn run(&self, query: &NormalQuery) -> Result<Value> {
        order::check_range(&query.slice)?;
        self.schema.resource(&query.resource_type)?;
        let timer = profile_timer();
        let seeds = match &query.id {
            Some(id) => self.graph.node(&query.resource_type, id).into_iter().collect(),
            None => self.graph.nodes_of(&query.resource_type),
        };
        record_profile_timer(QueryProfileKind::Seed, timer);
        let single = query.id.is_some() && query.group.is_none();
        let rows = self.pipeline(query, seeds)?;
        Ok(shape(rows, single))
    }

    fn pipeline(&self, query: &NormalQuery, seeds: Vec<Arc<PreparedNode>>) -> Result<Vec<Value>> {
        order::check_range(&query.slice)?;
        let seeded = seeds.len();
        let rows = restrict_ids(query, seeds);

        let timer = profile_timer();
        let rows = match &query.where_clause {
            Some(expr) => {
                let mut kept = Vec::with_capacity(rows.len());
                for node in rows {
                    let scope = RecordScope {
                        exec: self,
                        node: node.as_ref(),
                    };
                    if truthy(&self.engines.where_engine.apply(expr, &scope)?) {
                        kept.push(node);
                    }
                }
                kept
            }
            None => rows,
        };
        record_profile_timer(QueryProfileKind::Filter, timer);
        debug!(
            resource_type = %query.resource_type,
            seeded,
            kept = rows.len(),
            "where applied"
        );

        let order_keys = self.effective_order(query);
        let timer = profile_timer();
        let mut keyed = order::keyed(rows, &order_keys, |node, path| {
            self.read_path(node, &split_path(path))
        })?;
        order::sort(&mut keyed, &order_keys);
        record_profile_timer(QueryProfileKind::Sort, timer);

        let timer = profile_timer();
        let rows: Vec<Arc<PreparedNode>> = order::window(keyed, &order_keys, &query.slice)?
            .into_iter()
            .map(|keyed| keyed.row)
            .collect();
        record_profile_timer(QueryProfileKind::Slice, timer);
        debug!(resource_type = %query.resource_type, rows = rows.len(), "window applied");

        if let Some(group) = &query.group {
            let id_field = self.schema.id_field(&query.resource_type);
            return rollup(
                rows,
                group,
                self.engines,
                |node, path| self.read_path(node, &split_path(path)),
                |node| Ok(node.to_value(id_field)),
            );
        }

        let timer = profile_timer();
        let projected = rows
            .iter()
            .map(|node| self.project(query, node))
            .collect::<Result<Vec<_>>>()?;
        record_profile_timer(QueryProfileKind::Project, timer);
        Ok(projected)
    }

    /// Cursors need a total order; without one, rows order by id.
    fn effective_order(&self, query: &NormalQuery) -> Vec<OrderKey> {
        let cursor = query.slice.before.is_some() || query.slice.after.is_some();
        if query.order.is_empty() && cursor {
            vec![OrderKey::asc(self.schema.id_field(&query.resource_type))]
        } else {
            query.order.clone()
        }
    }

    fn project(&self, query: &NormalQuery, node: &Arc<PreparedNode>) -> Result<Value> {
        if query.select.is_empty() {
            return Ok(node.to_ref().to_value());
        }
        let mut out = Map::with_capacity(query.select.len());
        for (key, selection) in &query.select {
            let value = match selection {
                Selection::Attribute(path) => self.read_path(node, &split_path(path))?,
                Selection::Relationship(name) => match self.graph.related(node, name)? {
                    Some(Related::One(target)) => target
                        .map(|t| t.to_ref().to_value())
                        .unwrap_or(Value::Null),
                    Some(Related::Many(targets)) => Value::Array(
                        targets.iter().map(|t| t.to_ref().to_value()).collect(),
                    ),
                    None => Value::Null,
                },
                Selection::Expression(expr) => {
                    let scope = RecordScope {
                        exec: self,
                        node: node.as_ref(),
                    };
                    self.engines.select_engine.apply(expr, &scope)?
                }
                Selection::Subquery {
                    relationship,
                    query: sub,
                } => self.subquery(node, relationship, sub)?,
            };
            out.insert(key.clone(), value);
        }
        Ok(Value::Object(out))
    }

    fn subquery(&self, node: &PreparedNode, relationship: &str, sub: &NormalQuery) -> Result<Value> {
        let cardinality = self
            .schema
            .resource(node.resource_type())?
            .relationship(relationship)
            .map(|rel| rel.cardinality);
        let seeds = match self.graph.related(node, relationship)? {
            Some(Related::One(target)) => target.into_iter().collect(),
            Some(Related::Many(targets)) => targets,
            None => Vec::new(),
        };
        let single = sub.id.is_some() || cardinality == Some(Cardinality::One);
        let rows = self.pipeline(sub, seeds)?;
        Ok(shape(rows, single && sub.group.is_none()))
    }

    /// Reads `path` from a record: attributes first, then the id field, then
    /// relationships, dereferenced lazily.
    fn read_path(&self, node: &PreparedNode, path: &[&str]) -> Result<Value> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(node.to_value(self.schema.id_field(node.resource_type())));
        };
        if let Some(attribute) = node.attribute(head) {
            return Ok(value::lookup_path(attribute, rest));
        }
        if *head == self.schema.id_field(node.resource_type()) {
            return Ok(if rest.is_empty() {
                Value::String(node.id().to_owned())
            } else {
                Value::Null
            });
        }
        match self.graph.related(node, head)? {
            Some(Related::One(Some(target))) => self.read_path(&target, rest),
            Some(Related::One(None)) | None => Ok(Value::Null),
            Some(Related::Many(targets)) => match rest.split_first() {
                None => Ok(Value::Array(
                    targets
                        .iter()
                        .map(|t| t.to_value(self.schema.id_field(t.resource_type())))
                        .collect(),
                )),
                Some((&WILDCARD, tail)) => targets
                    .iter()
                    .map(|t| self.read_path(t, tail))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                Some((index, tail)) => match index.parse::<usize>().ok().and_then(|i| targets.get(i)) {
                    Some(target) => self.read_path(target, tail),
                    None => Ok(Value::Null),
                },
            },
        }
    }

    fn has_path(&self, node: &PreparedNode, path: &[&str]) -> Result<bool> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(true);
        };
        if let Some(attribute) = node.attribute(head) {
            return Ok(value::has_path(attribute, rest));
        }
        if *head == self.schema.id_field(node.resource_type()) {
            return Ok(rest.is_empty());
        }
        match self.graph.related(node, head)? {
            None => Ok(false),
            Some(Related::One(None)) => Ok(rest.is_empty()),
            Some(Related::One(Some(target))) => self.has_path(&target, rest),
            Some(Related::Many(targets)) => match rest.split_first() {
                None => Ok(true),
                Some((&WILDCARD, tail)) => {
                    for target in &targets {
                        if !self.has_path(target, tail)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Some((index, tail)) => match index.parse::<usize>().ok().and_then(|i| targets.get(i)) {
                    Some(target) => self.has_path(target, tail),
                    None => Ok(false),
                },
            },
        }
    }
}

/// A prepared record seen as expression input.
struct RecordScope<'e> {
    exec: &'e Executor<'e>,
    node: &'e PreparedNode,
}

impl Scope for RecordScope<'_> {
    fn lookup(&self, path: &[&str]) -> Result<Value> {
        self.exec.read_path(self.node, path)
    }

    fn has_path(&self, path: &[&str]) -> Result<bool> {
        self.exec.has_path(self.node, path)
    }

    fn to_value(&self) -> Result<Value> {
        Ok(self
            .node
            .to_value(self.exec.schema.id_field(self.node.resource_type())))
    }
}

fn restrict_ids(query: &NormalQuery, seeds: Vec<Arc<PreparedNode>>) -> Vec<Arc<PreparedNode>> {
    let mut rows = seeds;
    if let Some(id) = &query.id {
        rows.retain(|node| node.id() == id);
    }
    if let Some(ids) = &query.ids {
        let wanted: FxHashSet<&str> = ids.iter().map(String::as_str).collect();
        rows.retain(|node| wanted.contains(node.id()));
    }
    rows
}

fn shape(rows: Vec<Value>, single: bool) -> Value {
    if single {
        rows.into_iter().next().unwrap_or(Value::Null)
    } else {
        Value::Array(rows)
    }
}
