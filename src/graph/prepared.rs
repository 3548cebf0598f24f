#![forbid(unsafe_code)]

//! Prepared graph nodes with memoized relationship dereferencing.
//!
//! Every node is materialized at most once per [`PreparedGraph`] and shared as
//! an `Arc`, so two paths reaching the same resource observe the same node.
//! Resolved relationships are pinned as refs into the node table rather than
//! owned subtrees, which keeps cyclic graphs finite and free of `Arc` cycles.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::graph::{Graph, RelationshipValue};
use crate::types::{QuarryError, Ref, Result};

/// Options controlling relationship resolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrepareOptions {
    /// Substitute `null` (one) or drop the entry (many) instead of failing on
    /// refs whose target is missing from the graph.
    pub tolerate_missing_refs: bool,
}

/// Identity of a prepared node, kept apart from its attribute map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeMeta {
    /// Resource type.
    pub resource_type: String,
    /// Resource id.
    pub id: String,
}

/// Relationship after its refs were checked against the graph.
#[derive(Clone, Debug)]
enum Pinned {
    One(Option<Ref>),
    Many(Vec<Ref>),
}

/// Resolved relationship value handed to callers.
#[derive(Clone, Debug)]
pub enum Related {
    /// Target of a `"one"` relationship, `None` when the ref is null.
    One(Option<Arc<PreparedNode>>),
    /// Targets of a `"many"` relationship.
    Many(Vec<Arc<PreparedNode>>),
}

/// A resource record decorated for traversal.
#[derive(Debug)]
pub struct PreparedNode {
    meta: NodeMeta,
    attributes: Map<String, Value>,
    raw_relationships: IndexMap<String, RelationshipValue>,
    pinned: RwLock<FxHashMap<String, Pinned>>,
}

impl PreparedNode {
    /// Type and id of this node.
    pub fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    /// Resource type of this node.
    pub fn resource_type(&self) -> &str {
        &self.meta.resource_type
    }

    /// Id of this node.
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Visible attribute values.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Reads one attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Raw relationship refs exactly as stored in the graph.
    pub fn raw_relationships(&self) -> &IndexMap<String, RelationshipValue> {
        &self.raw_relationships
    }

    /// Whether the record declares a relationship named `name`.
    pub fn has_relationship(&self, name: &str) -> bool {
        self.raw_relationships.contains_key(name)
    }

    /// `{type, id}` reference to this node.
    pub fn to_ref(&self) -> Ref {
        Ref::new(self.meta.resource_type.clone(), self.meta.id.clone())
    }

    /// Flat JSON view: attributes, the id under `id_field` unless an attribute
    /// already uses that name, and relationships as bare refs.
    pub fn to_value(&self, id_field: &str) -> Value {
        let mut out = self.attributes.clone();
        if !out.contains_key(id_field) {
            out.insert(id_field.to_owned(), Value::String(self.meta.id.clone()));
        }
        for (name, rel) in &self.raw_relationships {
            if !out.contains_key(name) {
                out.insert(name.clone(), rel.to_value());
            }
        }
        Value::Object(out)
    }
}

/// Graph view whose nodes dereference relationships on first access.
#[derive(Debug)]
pub struct PreparedGraph {
    graph: Arc<Graph>,
    options: PrepareOptions,
    nodes: RwLock<FxHashMap<Ref, Arc<PreparedNode>>>,
}

impl PreparedGraph {
    /// Prepares `graph`; no record is touched until it is first read.
    pub fn new(graph: Arc<Graph>, options: PrepareOptions) -> Self {
        Self {
            graph,
            options,
            nodes: RwLock::new(FxHashMap::default()),
        }
    }

    /// The underlying raw graph.
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Resolution options in effect.
    pub fn options(&self) -> PrepareOptions {
        self.options
    }

    /// Number of nodes materialized so far.
    pub fn materialized(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns the node for `(resource_type, id)`, materializing it on first use.
    pub fn node(&self, resource_type: &str, id: &str) -> Option<Arc<PreparedNode>> {
        let key = Ref::new(resource_type, id);
        if let Some(node) = self.nodes.read().get(&key) {
            return Some(Arc::clone(node));
        }
        let record = self.graph.get(resource_type, id)?;
        let fresh = PreparedNode {
            meta: NodeMeta {
                resource_type: resource_type.to_owned(),
                id: id.to_owned(),
            },
            attributes: record.attributes.clone(),
            raw_relationships: record.relationships.clone(),
            pinned: RwLock::new(FxHashMap::default()),
        };
        let mut nodes = self.nodes.write();
        // A concurrent reader may have won the race; keep its node.
        let node = nodes.entry(key).or_insert_with(|| Arc::new(fresh));
        Some(Arc::clone(node))
    }

    /// All nodes of a type, in graph order.
    pub fn nodes_of(&self, resource_type: &str) -> Vec<Arc<PreparedNode>> {
        self.graph
            .resources_of(resource_type)
            .filter_map(|(id, _)| self.node(resource_type, id))
            .collect()
    }

    /// Dereferences the relationship `name` on `node`.
    ///
    /// Returns `Ok(None)` when the record has no such relationship. The first
    /// call checks every ref against the graph and pins the outcome; later
    /// calls reuse it.
    pub fn related(&self, node: &PreparedNode, name: &str) -> Result<Option<Related>> {
        let cached = node.pinned.read().get(name).cloned();
        let pinned = match cached {
            Some(pinned) => {
                trace!(node = %node.to_ref(), relationship = name, "relationship memo hit");
                pinned
            }
            None => {
                let Some(raw) = node.raw_relationships.get(name) else {
                    return Ok(None);
                };
                let pinned = self.pin(raw)?;
                trace!(node = %node.to_ref(), relationship = name, "relationship resolved");
                node.pinned
                    .write()
                    .entry(name.to_owned())
                    .or_insert(pinned)
                    .clone()
            }
        };
        Ok(Some(self.expand(&pinned)))
    }

    fn pin(&self, raw: &RelationshipValue) -> Result<Pinned> {
        match raw {
            RelationshipValue::One(None) => Ok(Pinned::One(None)),
            RelationshipValue::One(Some(target)) => {
                if self.graph.contains(target) {
                    Ok(Pinned::One(Some(target.clone())))
                } else if self.options.tolerate_missing_refs {
                    Ok(Pinned::One(None))
                } else {
                    Err(QuarryError::dangling(target))
                }
            }
            RelationshipValue::Many(targets) => {
                let mut kept = Vec::with_capacity(targets.len());
                for target in targets {
                    if self.graph.contains(target) {
                        kept.push(target.clone());
                    } else if !self.options.tolerate_missing_refs {
                        return Err(QuarryError::dangling(target));
                    }
                }
                Ok(Pinned::Many(kept))
            }
        }
    }

    fn expand(&self, pinned: &Pinned) -> Related {
        match pinned {
            Pinned::One(target) => Related::One(
                target
                    .as_ref()
                    .and_then(|t| self.node(&t.resource_type, &t.id)),
            ),
            Pinned::Many(targets) => Related::Many(
                targets
                    .iter()
                    .filter_map(|t| self.node(&t.resource_type, &t.id))
                    .collect(),
            ),
        }
    }
}
