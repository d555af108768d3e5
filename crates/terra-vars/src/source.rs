//! Fetching the key/value payload of a vars reference
//!
//! Aggregation only needs one capability from the cluster: "give me the
//! full string-keyed data of this Secret or ConfigMap". [`VarsSource`] is
//! that seam; [`KubeVarsSource`] is the production implementation over the
//! Kubernetes API, and tests substitute an in-memory one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};
use thiserror::Error;
use tracing::trace;

use terra_common::crd::VarsStoreKind;

/// Failure fetching a vars reference payload
///
/// `NotFound` is a distinct variant because the aggregation algorithm
/// treats it specially: it is the only failure an `optional` reference
/// may suppress. Every other variant always fails the run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The referenced object does not exist
    #[error("not found")]
    NotFound,

    /// Any other Kubernetes API failure (access, connectivity, server)
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The object exists but a value cannot be decoded to a string
    #[error("invalid value for key {key:?}: {message}")]
    Payload {
        /// The data key whose value could not be decoded
        key: String,
        /// Description of what is wrong with the value
        message: String,
    },
}

/// Capability to fetch the full string-keyed payload of a vars referent
#[async_trait]
pub trait VarsSource: Send + Sync {
    /// Fetch the data of the object of `kind` at `namespace`/`name`
    async fn fetch(
        &self,
        kind: VarsStoreKind,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, FetchError>;
}

/// [`VarsSource`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeVarsSource {
    client: Client,
}

impl KubeVarsSource {
    /// Create a source over the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VarsSource for KubeVarsSource {
    async fn fetch(
        &self,
        kind: VarsStoreKind,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, FetchError> {
        trace!(kind = %kind, namespace = %namespace, name = %name, "Fetching vars payload");
        match kind {
            VarsStoreKind::Secret => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
                match api.get(name).await {
                    Ok(secret) => secret_payload(secret),
                    Err(kube::Error::Api(ae)) if ae.code == 404 => Err(FetchError::NotFound),
                    Err(e) => Err(e.into()),
                }
            }
            VarsStoreKind::ConfigMap => {
                let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
                match api.get(name).await {
                    Ok(cm) => Ok(cm.data.unwrap_or_default()),
                    Err(kube::Error::Api(ae)) if ae.code == 404 => Err(FetchError::NotFound),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Flatten a Secret into string key/value pairs
///
/// `data` values arrive as raw bytes and must be valid UTF-8 to serve as
/// terraform variables; `string_data` entries (if the server ever returns
/// them) take precedence over their `data` counterparts.
fn secret_payload(secret: Secret) -> Result<BTreeMap<String, String>, FetchError> {
    let mut payload = BTreeMap::new();
    for (key, value) in secret.data.unwrap_or_default() {
        let value = String::from_utf8(value.0).map_err(|_| FetchError::Payload {
            key: key.clone(),
            message: "secret value is not valid UTF-8".to_string(),
        })?;
        payload.insert(key, value);
    }
    if let Some(string_data) = secret.string_data {
        payload.extend(string_data);
    }
    Ok(payload)
}
