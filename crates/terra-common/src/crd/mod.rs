//! Custom resource supporting types for Terra
//!
//! These types are embedded in the Terraform CRD spec; the CRD itself and
//! its reconciler live in the operator crates.

mod reference;

pub use reference::{SourceKind, SourceReference, VarsReference, VarsStoreKind};
