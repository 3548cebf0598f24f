//! Declarative queries over in-memory resource graphs.
//!
//! A [`Schema`] declares resource types with attributes and typed
//! relationships. A [`Graph`] holds the records. Queries are JSON documents
//! that select attributes, follow relationships through nested subqueries,
//! filter and compute with a pluggable expression engine, sort, paginate by
//! offset or cursor, and roll rows up into groups.
//!
//! ```
//! use quarry::{Graph, Schema, Store, StoreOptions};
//! use serde_json::json;
//!
//! let schema = Schema::from_value(&json!({
//!     "resources": {
//!         "bears": {
//!             "attributes": { "name": {} },
//!             "relationships": { "home": { "type": "homes", "cardinality": "one" } }
//!         },
//!         "homes": { "attributes": { "name": {} } }
//!     }
//! }))?;
//! let graph = Graph::from_value(&json!({
//!     "bears": { "1": {
//!         "attributes": { "name": "Tenderheart Bear" },
//!         "relationships": { "home": { "type": "homes", "id": "1" } }
//!     } },
//!     "homes": { "1": { "attributes": { "name": "Care-a-Lot" } } }
//! }))?;
//! let store = Store::new(schema, graph, StoreOptions::default());
//! let bear = store.query(&json!({
//!     "type": "bears",
//!     "id": "1",
//!     "select": { "name": "name", "home": { "select": ["name"] } }
//! }))?;
//! assert_eq!(bear, json!({ "name": "Tenderheart Bear", "home": { "name": "Care-a-Lot" } }));
//! # Ok::<(), quarry::QuarryError>(())
//! ```

#![warn(missing_docs)]

pub mod expr;
pub mod graph;
pub mod query;
pub mod schema;
pub mod store;
pub mod types;

pub use expr::{Engine, Operation, OperationSet};
pub use graph::{Graph, PrepareOptions, PreparedGraph, Resource};
pub use query::{normalize, GroupBuilder, NormalQuery, QueryBuilder};
pub use schema::{Cardinality, Schema};
pub use store::{Store, StoreOptions};
pub use types::{QuarryError, Ref, Result, ValidationIssue};
