//! Built-in operation families.
//!
//! Each family exposes a `register` function that adds its operations to an
//! [`OperationSet`](crate::expr::OperationSet).

pub mod aggregative;
pub mod base;
pub mod comparative;
pub mod generative;
pub mod iterative;
pub mod logical;
pub mod temporal;
