#![forbid(unsafe_code)]

//! Query normalization, validation, and execution.
//!
//! Raw query documents are checked by a [`Validator`], rewritten into a
//! [`NormalQuery`] by [`normalize`], and run against a prepared graph by the
//! [`Executor`].

/// Normalized query representation.
///
/// Every shorthand accepted in raw documents has exactly one form here.
pub mod ast;

/// Fluent construction of raw query documents.
pub mod builder;

/// Query execution over a prepared graph.
pub mod executor;

/// Group-by rollups over filtered rows.
pub mod group;

/// Rewrites raw query documents into normal form.
pub mod normalize;

/// Sorting and pagination windows.
pub mod order;

/// Performance profiling for query stages.
///
/// Collects timing and count statistics when `QUARRY_PROFILE` is set.
pub mod profile;

/// Structural checks run before normalization.
pub mod validate;

pub use ast::{Direction, NormalQuery};
pub use builder::{GroupBuilder, QueryBuilder};
pub use executor::{Engines, Executor};
pub use normalize::{normalize, normalize_with, IntoNormalQuery};
pub use validate::{StructuralValidator, Validator};
