#![forbid(unsafe_code)]

//! Raw resource graph: `type -> id -> record`, plus the lazily dereferenced
//! [`PreparedGraph`] view the executor walks.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Ref, Result};

/// Lazy, memoized relationship resolution over a raw graph.
pub mod prepared;

pub use prepared::{PrepareOptions, PreparedGraph, PreparedNode, Related};

/// Value stored under a relationship name on a resource record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipValue {
    /// `"many"` relationships are always arrays.
    Many(Vec<Ref>),
    /// `"one"` relationships hold a ref or null.
    One(Option<Ref>),
}

impl RelationshipValue {
    /// Refs held by this value in declaration order.
    pub fn refs(&self) -> Vec<&Ref> {
        match self {
            RelationshipValue::Many(refs) => refs.iter().collect(),
            RelationshipValue::One(Some(target)) => vec![target],
            RelationshipValue::One(None) => Vec::new(),
        }
    }

    /// Renders the refs without dereferencing them.
    pub fn to_value(&self) -> Value {
        match self {
            RelationshipValue::Many(refs) => Value::Array(refs.iter().map(Ref::to_value).collect()),
            RelationshipValue::One(Some(target)) => target.to_value(),
            RelationshipValue::One(None) => Value::Null,
        }
    }
}

/// Attributes and relationship refs of one resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Scalar attribute values.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Relationship refs keyed by relationship name.
    #[serde(default)]
    pub relationships: IndexMap<String, RelationshipValue>,
}

/// In-memory resource graph keyed by type and id, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Graph {
    resources: IndexMap<String, IndexMap<String, Resource>>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a graph document.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Graph::deserialize(value)?)
    }

    /// Looks up a single record.
    pub fn get(&self, resource_type: &str, id: &str) -> Option<&Resource> {
        self.resources.get(resource_type)?.get(id)
    }

    /// Whether `target` resolves to an existing record.
    pub fn contains(&self, target: &Ref) -> bool {
        self.get(&target.resource_type, &target.id).is_some()
    }

    /// Iterates over the records of one type in insertion order.
    pub fn resources_of<'a>(
        &'a self,
        resource_type: &str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .get(resource_type)
            .into_iter()
            .flat_map(|records| records.iter())
    }

    /// Resource type names present in the graph.
    pub fn types(&self) -> impl Iterator<Item = &String> {
        self.resources.keys()
    }

    /// Inserts or replaces a record, returning the previous one.
    pub fn insert(
        &mut self,
        resource_type: impl Into<String>,
        id: impl Into<String>,
        resource: Resource,
    ) -> Option<Resource> {
        self.resources
            .entry(resource_type.into())
            .or_default()
            .insert(id.into(), resource)
    }

    /// Removes a record, keeping the order of the remaining ones.
    pub fn remove(&mut self, resource_type: &str, id: &str) -> Option<Resource> {
        self.resources.get_mut(resource_type)?.shift_remove(id)
    }

    /// Total number of records across all types.
    pub fn len(&self) -> usize {
        self.resources.values().map(IndexMap::len).sum()
    }

    /// Whether the graph holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
