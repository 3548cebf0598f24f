#![forbid(unsafe_code)]

//! Declarative schema: resource types, their attributes, and typed relationships.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{QuarryError, Result};

/// Schema document: `{ "resources": { <type>: ResourceSchema } }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Resource definitions keyed by type name, in declaration order.
    #[serde(default)]
    pub resources: IndexMap<String, ResourceSchema>,
}

/// Definition of a single resource type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    /// Name of the identifying field (defaults to `"id"`).
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Attribute names mapped to their primitive type descriptors.
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    /// Relationship definitions keyed by relationship name.
    #[serde(default)]
    pub relationships: IndexMap<String, RelationshipSchema>,
}

fn default_id_field() -> String {
    "id".to_owned()
}

/// Typed link from one resource type to another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    /// Target resource type.
    #[serde(rename = "type")]
    pub target: String,
    /// Whether the relationship holds one resource or a collection.
    pub cardinality: Cardinality,
    /// Name of the inverse relationship on the target, when declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<String>,
}

/// Relationship cardinality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// `Ref | null`.
    One,
    /// Always an array of refs.
    Many,
}

impl Schema {
    /// Decodes a schema document.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Schema::deserialize(value)?)
    }

    /// Looks up a resource definition, failing on unknown types.
    pub fn resource(&self, resource_type: &str) -> Result<&ResourceSchema> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| QuarryError::UnknownResourceType(resource_type.to_owned()))
    }

    /// Returns the id field for a type, falling back to `"id"` for unknown types.
    pub fn id_field(&self, resource_type: &str) -> &str {
        self.resources
            .get(resource_type)
            .map(|def| def.id_field.as_str())
            .unwrap_or("id")
    }
}

impl ResourceSchema {
    /// Returns the relationship definition named `name`.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipSchema> {
        self.relationships.get(name)
    }

    /// Whether `name` is a declared attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Whether `name` is an attribute, a relationship, or the id field.
    pub fn has_field(&self, name: &str) -> bool {
        name == self.id_field || self.has_attribute(name) || self.relationships.contains_key(name)
    }
}
