//! Error types for the Terra operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Variants that originate from a vars reference carry the reference's
//! canonical label so the reconciler can render a precise diagnostic.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Terra operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A referenced Secret or ConfigMap does not exist
    ///
    /// Suppressed into a no-op only when the originating vars reference is
    /// marked `optional`.
    #[error("vars reference {reference} not found")]
    VarsReferenceNotFound {
        /// Canonical label of the missing reference (kind/namespace/name)
        reference: String,
    },

    /// A referenced object exists but lacks a key requested via `varsKeys`
    ///
    /// Never suppressed, including for `optional` references: a requested
    /// key that does not exist is operator misconfiguration.
    #[error("vars reference {reference} has no key {key:?}")]
    VarsKeyMissing {
        /// Canonical label of the reference (kind/namespace/name)
        reference: String,
        /// The requested key absent from the object's data
        key: String,
    },

    /// A referenced object's payload cannot be represented as variables
    #[error("vars reference {reference}, key {key:?}: {message}")]
    VarsPayload {
        /// Canonical label of the reference (kind/namespace/name)
        reference: String,
        /// The key whose value could not be decoded
        key: String,
        /// Description of what is wrong with the value
        message: String,
    },

    /// The generated variables file could not be written
    #[error("failed to write vars file {}: {source}", path.display())]
    VarsWrite {
        /// Destination path of the variables file
        path: PathBuf,
        /// The underlying filesystem error
        source: std::io::Error,
    },

    /// Validation error for spec fields
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.varsFrom.name")
        field: Option<String>,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Canonical label of the vars reference this error originated from,
    /// if any
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::VarsReferenceNotFound { reference }
            | Self::VarsKeyMissing { reference, .. }
            | Self::VarsPayload { reference, .. } => Some(reference),
            _ => None,
        }
    }
}
