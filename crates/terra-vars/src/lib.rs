//! Variable resolution and aggregation for the Terra operator
//!
//! Turns the ordered `varsFrom` list of a Terraform resource into the
//! single variables file consumed by the terraform binary. The reconciler
//! calls [`aggregate_vars`] once per attempt with the declared reference
//! list, then hands the result to [`write_vars_file`] inside the plan's
//! working directory.
//!
//! The engine is deliberately sequential: the declared list order is the
//! precedence contract (last reference wins for any shared key), so
//! references are fetched and merged strictly in order.

#![deny(missing_docs)]

pub mod aggregate;
pub mod materialize;
pub mod source;

pub use aggregate::aggregate_vars;
pub use materialize::write_vars_file;
pub use source::{FetchError, KubeVarsSource, VarsSource};
