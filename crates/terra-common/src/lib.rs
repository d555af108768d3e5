//! Common types for Terra: reference types, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Name of the variables file handed to the terraform binary
///
/// Written into the working directory before every plan/apply; the
/// `.auto.tfvars.json` suffix makes terraform load it without `-var-file`.
pub const GENERATED_VARS_FILENAME: &str = "generated.auto.tfvars.json";
