#![forbid(unsafe_code)]

//! Schema, graph, and engines bundled behind one query entry point.
//!
//! The prepared view of the graph is built on the first query and reused
//! until the graph changes. Every mutation path drops it, so a query never
//! observes a stale dereference.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use crate::graph::{Graph, PrepareOptions, PreparedGraph};
use crate::query::{normalize_with, Engines, Executor, NormalQuery, StructuralValidator, Validator};
use crate::schema::Schema;
use crate::types::{QuarryError, Result, ValidationIssue};

/// Behaviour switches for a [`Store`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Resolve refs to missing records as `null` / dropped entries.
    pub tolerate_missing_refs: bool,
    /// Run the validator before every raw query.
    pub validate: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            tolerate_missing_refs: false,
            validate: true,
        }
    }
}

impl StoreOptions {
    /// Validating store that tolerates dangling refs.
    pub fn tolerant() -> Self {
        Self {
            tolerate_missing_refs: true,
            ..Self::default()
        }
    }

    fn prepare_options(self) -> PrepareOptions {
        PrepareOptions {
            tolerate_missing_refs: self.tolerate_missing_refs,
        }
    }
}

/// Queryable resource graph.
pub struct Store {
    schema: Schema,
    graph: Arc<Graph>,
    options: StoreOptions,
    engines: Engines,
    validator: Box<dyn Validator + Send + Sync>,
    prepared: Mutex<Option<Arc<PreparedGraph>>>,
}

impl Store {
    /// Creates a store with the default engines and the structural validator.
    pub fn new(schema: Schema, graph: Graph, options: StoreOptions) -> Self {
        Self {
            schema,
            graph: Arc::new(graph),
            options,
            engines: Engines::default(),
            validator: Box::new(StructuralValidator),
            prepared: Mutex::new(None),
        }
    }

    /// Replaces the where/select vocabularies.
    pub fn with_engines(mut self, engines: Engines) -> Self {
        self.engines = engines;
        self
    }

    /// Replaces the validator run by [`Store::query`].
    pub fn with_validator(mut self, validator: impl Validator + Send + Sync + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The raw graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Options in effect.
    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Engines used for normalization and execution.
    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    /// Validates, normalizes, and runs a raw query.
    pub fn query(&self, query: &Value) -> Result<Value> {
        if self.options.validate {
            let issues = self.validate(query);
            if !issues.is_empty() {
                debug!(issues = issues.len(), "query rejected by validator");
                return Err(QuarryError::Validation(issues));
            }
        }
        let normal = self.normalize(query)?;
        self.query_normal(&normal)
    }

    /// Runs an already normalized query without validating it.
    pub fn query_normal(&self, query: &NormalQuery) -> Result<Value> {
        let prepared = self.prepared();
        Executor::new(&self.schema, &prepared, &self.engines).run(query)
    }

    /// Normalizes a raw query against this store's schema and engines.
    pub fn normalize(&self, query: &Value) -> Result<NormalQuery> {
        normalize_with(&self.schema, &self.engines, query)
    }

    /// Runs the configured validator regardless of [`StoreOptions::validate`].
    pub fn validate(&self, query: &Value) -> Vec<ValidationIssue> {
        self.validator.validate(&self.schema, query, &self.engines)
    }

    /// The prepared graph, built on first use.
    pub fn prepared(&self) -> Arc<PreparedGraph> {
        let mut slot = self.prepared.lock();
        match &*slot {
            Some(prepared) => Arc::clone(prepared),
            None => {
                let prepared = Arc::new(PreparedGraph::new(
                    Arc::clone(&self.graph),
                    self.options.prepare_options(),
                ));
                info!(records = self.graph.len(), "prepared graph built");
                *slot = Some(Arc::clone(&prepared));
                prepared
            }
        }
    }

    /// Drops the prepared graph; the next query rebuilds it.
    pub fn invalidate(&self) {
        if self.prepared.lock().take().is_some() {
            debug!("prepared graph invalidated");
        }
    }

    /// Swaps in a new graph.
    pub fn replace_graph(&mut self, graph: Graph) {
        self.graph = Arc::new(graph);
        self.invalidate();
    }

    /// Mutable access to the raw graph; the prepared graph is dropped when the
    /// guard goes away.
    pub fn graph_mut(&mut self) -> GraphGuard<'_> {
        self.invalidate();
        GraphGuard { store: self }
    }
}

/// Write access to a [`Store`]'s graph.
///
/// Prepared graphs already handed out keep reading the graph as it was.
pub struct GraphGuard<'a> {
    store: &'a mut Store,
}

impl Deref for GraphGuard<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.store.graph
    }
}

impl DerefMut for GraphGuard<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        Arc::make_mut(&mut self.store.graph)
    }
}

impl Drop for GraphGuard<'_> {
    fn drop(&mut self) {
        self.store.invalidate();
    }
}
