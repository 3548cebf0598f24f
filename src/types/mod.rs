#![forbid(unsafe_code)]

//! Shared identifiers and the crate-wide error type.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies a resource by type and id without embedding its data.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Ref {
    /// Resource type name as declared in the schema.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource identifier within its type.
    #[serde(deserialize_with = "serde_id::deserialize")]
    pub id: String,
}

impl Ref {
    /// Builds a reference from its parts.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Renders the reference as a `{type, id}` JSON object.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.resource_type, "id": self.id })
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

pub(crate) mod serde_id {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    /// Accepts ids written either as strings or as integers.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = String;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string or integer resource id")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value.to_string())
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value.to_string())
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value.to_owned())
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value)
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// One structural problem found in a query before execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Human-readable description.
    pub message: String,
    /// Location of the offending value inside the query document.
    pub path: Vec<String>,
    /// The offending value.
    pub value: serde_json::Value,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (at {})", self.message, self.path.join("."))
        }
    }
}

/// Errors raised while normalizing, validating, or executing a query.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// The query failed structural validation and was not executed.
    #[error("query failed validation with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),
    /// An expression operand had the wrong type or arity.
    #[error("evaluation error: {0}")]
    Evaluation(String),
    /// An expression name is not part of the active engine's vocabulary.
    #[error("expression '{name}' is not supported by this engine")]
    UnsupportedExpression {
        /// The rejected operation name, including its `$` prefix.
        name: String,
    },
    /// A relationship points at a resource missing from the graph.
    #[error("dangling reference to {resource_type} '{id}'")]
    DanglingReference {
        /// Target resource type.
        resource_type: String,
        /// Missing target id.
        id: String,
    },
    /// A pagination bound is out of range.
    #[error("range error: {0}")]
    Range(String),
    /// The query document has a shape the normalizer cannot interpret.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The resource type is not declared in the schema.
    #[error("unknown resource type '{0}'")]
    UnknownResourceType(String),
    /// A schema, graph, or query document failed to decode.
    #[error("decode error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl QuarryError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QuarryError::Validation(_) => "ValidationError",
            QuarryError::Evaluation(_) => "EvaluationError",
            QuarryError::UnsupportedExpression { .. } => "UnsupportedExpressionError",
            QuarryError::DanglingReference { .. } => "DanglingReferenceError",
            QuarryError::Range(_) => "RangeError",
            QuarryError::InvalidQuery(_) => "InvalidQuery",
            QuarryError::UnknownResourceType(_) => "UnknownResourceType",
            QuarryError::Serde(_) => "DecodeError",
        }
    }

    pub(crate) fn eval(message: impl Into<String>) -> Self {
        QuarryError::Evaluation(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        QuarryError::InvalidQuery(message.into())
    }

    pub(crate) fn dangling(target: &Ref) -> Self {
        QuarryError::DanglingReference {
            resource_type: target.resource_type.clone(),
            id: target.id.clone(),
        }
    }
}

/// Formats an error together with its code.
pub struct QuarryErrorWithCode<'a>(pub &'a QuarryError);

impl fmt::Display for QuarryErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, QuarryError>;
