//! References from a Terraform resource to other cluster objects
//!
//! A Terraform resource points at the source artifact holding its root
//! module ([`SourceReference`]) and at an ordered list of Secrets and
//! ConfigMaps supplying its input variables ([`VarsReference`]).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default API group/version for source references that omit `apiVersion`
pub const DEFAULT_SOURCE_API_VERSION: &str = "source.toolkit.fluxcd.io/v1";

/// Maximum length of a referenced object name (DNS subdomain limit)
pub const MAX_REFERENCE_NAME_LEN: usize = 253;

/// Kinds of source artifact a Terraform resource can be built from
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A Flux GitRepository source
    #[default]
    GitRepository,
    /// A Flux Bucket (object storage) source
    Bucket,
}

impl SourceKind {
    /// Returns true if this is a valid source kind string
    pub fn is_valid(s: &str) -> bool {
        matches!(s, "GitRepository" | "Bucket")
    }
}

impl std::str::FromStr for SourceKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GitRepository" => Ok(Self::GitRepository),
            "Bucket" => Ok(Self::Bucket),
            _ => Err(crate::Error::validation(format!(
                "invalid source kind: {s}, expected one of: GitRepository, Bucket"
            ))),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitRepository => write!(f, "GitRepository"),
            Self::Bucket => write!(f, "Bucket"),
        }
    }
}

/// Reference to the typed source object holding the Terraform root module
///
/// The namespace defaults to the namespace of the resource containing the
/// reference; that default is applied by the caller via
/// [`SourceReference::with_default_namespace`], the stored fields hold
/// exactly what the user declared.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    /// API version of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of the referent
    pub kind: SourceKind,

    /// Name of the referent
    pub name: String,

    /// Namespace of the referent, defaults to the namespace of the
    /// referring resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SourceReference {
    /// Return the reference with `namespace` filled in from the owner's
    /// namespace if it was empty
    ///
    /// Pure; the declared reference is left untouched when it already
    /// names a namespace.
    pub fn with_default_namespace(mut self, owner_namespace: &str) -> Self {
        if self.namespace.as_deref().is_none_or(str::is_empty) {
            self.namespace = Some(owner_namespace.to_string());
        }
        self
    }

    /// API version of the referent, falling back to
    /// [`DEFAULT_SOURCE_API_VERSION`] when none was declared
    pub fn api_version_or_default(&self) -> &str {
        self.api_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_SOURCE_API_VERSION)
    }

    /// Check the reference is well formed
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::Error::validation_for_field(
                "spec.sourceRef.name",
                "name must not be empty",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for SourceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            _ => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Kinds of key/value store a [`VarsReference`] can point at
///
/// Both kinds carry an opaque string-keyed payload and are treated
/// identically by variable aggregation; they differ only in how the
/// payload is fetched.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum VarsStoreKind {
    /// A core/v1 Secret
    Secret,
    /// A core/v1 ConfigMap
    ConfigMap,
}

impl VarsStoreKind {
    /// Returns true if this is a valid vars store kind string
    pub fn is_valid(s: &str) -> bool {
        matches!(s, "Secret" | "ConfigMap")
    }
}

impl std::str::FromStr for VarsStoreKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Secret" => Ok(Self::Secret),
            "ConfigMap" => Ok(Self::ConfigMap),
            _ => Err(crate::Error::validation(format!(
                "invalid vars store kind: {s}, expected one of: Secret, ConfigMap"
            ))),
        }
    }
}

impl std::fmt::Display for VarsStoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secret => write!(f, "Secret"),
            Self::ConfigMap => write!(f, "ConfigMap"),
        }
    }
}

/// Reference to a Secret or ConfigMap supplying Terraform input variables
///
/// References are declared as an ordered list; later entries overwrite
/// variables contributed by earlier ones. The referent must reside in the
/// same namespace as the referring resource, so this type carries no
/// namespace field of its own.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VarsReference {
    /// Kind of the values referent
    pub kind: VarsStoreKind,

    /// Name of the values referent
    pub name: String,

    /// Keys to select from the referent's data; defaults to all keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars_keys: Vec<String>,

    /// Marks this reference as optional
    ///
    /// When set, a not-found error for the referent is ignored; a missing
    /// key from `varsKeys` or a transient fetch error still fails
    /// reconciliation.
    #[serde(default)]
    pub optional: bool,
}

impl VarsReference {
    /// Canonical label naming this reference in logs and errors
    ///
    /// The namespace is the owner's, supplied at resolution time.
    pub fn label(&self, namespace: &str) -> String {
        format!("{}/{}/{}", self.kind, namespace, self.name)
    }

    /// Check the reference is well formed
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::Error::validation_for_field(
                "spec.varsFrom.name",
                "name must not be empty",
            ));
        }
        if self.name.len() > MAX_REFERENCE_NAME_LEN {
            return Err(crate::Error::validation_for_field(
                "spec.varsFrom.name",
                format!(
                    "name must be at most {MAX_REFERENCE_NAME_LEN} characters, got {}",
                    self.name.len()
                ),
            ));
        }
        Ok(())
    }
}
