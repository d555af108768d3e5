//! Resolving an ordered list of vars references into one mapping
//!
//! References are processed strictly in declared order because order is
//! the precedence contract: the last reference contributing a key wins.
//! Fetches are therefore sequential, never concurrent.

use std::collections::BTreeMap;

use tracing::debug;

use terra_common::crd::VarsReference;
use terra_common::{Error, Result};

use crate::source::{FetchError, VarsSource};

/// Resolve the declared `varsFrom` list into the final variable mapping
///
/// Each reference is fetched from `source` in the owner's namespace and
/// merged into the accumulated mapping. A not-found referent is skipped
/// when the reference is `optional` and fails the run otherwise; any other
/// fetch failure, and any key requested via `varsKeys` but absent from the
/// payload, fails the run regardless of `optional`. The first fatal error
/// aborts the scan; a partial mapping is never returned.
pub async fn aggregate_vars(
    refs: &[VarsReference],
    source: &dyn VarsSource,
    owner_namespace: &str,
) -> Result<BTreeMap<String, String>> {
    debug!(
        count = refs.len(),
        namespace = %owner_namespace,
        "Aggregating vars references"
    );

    let mut vars = BTreeMap::new();
    for reference in refs {
        reference.validate()?;
        let label = reference.label(owner_namespace);

        let payload = match source
            .fetch(reference.kind, owner_namespace, &reference.name)
            .await
        {
            Ok(payload) => payload,
            Err(FetchError::NotFound) if reference.optional => {
                debug!(reference = %label, "Optional vars reference not found, skipping");
                continue;
            }
            Err(FetchError::NotFound) => {
                return Err(Error::VarsReferenceNotFound { reference: label });
            }
            Err(FetchError::Kube(source)) => return Err(Error::Kube { source }),
            Err(FetchError::Payload { key, message }) => {
                return Err(Error::VarsPayload {
                    reference: label,
                    key,
                    message,
                });
            }
        };

        if reference.vars_keys.is_empty() {
            debug!(reference = %label, keys = payload.len(), "Merging all keys");
            vars.extend(payload);
        } else {
            debug!(reference = %label, keys = reference.vars_keys.len(), "Merging selected keys");
            for key in &reference.vars_keys {
                match payload.get(key) {
                    Some(value) => {
                        vars.insert(key.clone(), value.clone());
                    }
                    None => {
                        return Err(Error::VarsKeyMissing {
                            reference: label,
                            key: key.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use kube::core::ErrorResponse;

    use terra_common::crd::VarsStoreKind;

    use super::*;

    const OWNER_NS: &str = "flux-system";

    /// In-memory stand-in for the cluster: objects keyed by kind+name,
    /// plus a set of names that simulate an unavailable API server.
    #[derive(Default)]
    struct FakeSource {
        objects: HashMap<(VarsStoreKind, String), BTreeMap<String, String>>,
        broken: Vec<String>,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn with_object(mut self, kind: VarsStoreKind, name: &str, data: &[(&str, &str)]) -> Self {
            self.objects.insert(
                (kind, name.to_string()),
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
            self
        }

        fn with_broken(mut self, name: &str) -> Self {
            self.broken.push(name.to_string());
            self
        }
    }

    #[async_trait]
    impl VarsSource for FakeSource {
        async fn fetch(
            &self,
            kind: VarsStoreKind,
            namespace: &str,
            name: &str,
        ) -> std::result::Result<BTreeMap<String, String>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            assert_eq!(namespace, OWNER_NS, "references resolve in the owner namespace");
            if self.broken.iter().any(|b| b == name) {
                return Err(FetchError::Kube(kube::Error::Api(ErrorResponse {
                    status: "Failure".to_string(),
                    message: "etcdserver: request timed out".to_string(),
                    reason: "InternalError".to_string(),
                    code: 500,
                })));
            }
            self.objects
                .get(&(kind, name.to_string()))
                .cloned()
                .ok_or(FetchError::NotFound)
        }
    }

    fn vref(kind: VarsStoreKind, name: &str) -> VarsReference {
        VarsReference {
            kind,
            name: name.to_string(),
            vars_keys: Vec::new(),
            optional: false,
        }
    }

    fn keyed(mut r: VarsReference, keys: &[&str]) -> VarsReference {
        r.vars_keys = keys.iter().map(|k| k.to_string()).collect();
        r
    }

    fn optional(mut r: VarsReference) -> VarsReference {
        r.optional = true;
        r
    }

    fn expect(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Two fixture objects sharing key-1; the second declares value-4.
    fn two_config_maps() -> FakeSource {
        FakeSource::default()
            .with_object(
                VarsStoreKind::ConfigMap,
                "config-map-1",
                &[("key-1", "value-1"), ("key-2", "value-2")],
            )
            .with_object(
                VarsStoreKind::ConfigMap,
                "config-map-2",
                &[("key-3", "value-3"), ("key-1", "value-4")],
            )
    }

    #[tokio::test]
    async fn last_supplied_key_wins_across_the_list() {
        let source = two_config_maps();
        let refs = vec![
            vref(VarsStoreKind::ConfigMap, "config-map-1"),
            vref(VarsStoreKind::ConfigMap, "config-map-2"),
        ];

        let vars = aggregate_vars(&refs, &source, OWNER_NS).await.unwrap();
        assert_eq!(
            vars,
            expect(&[("key-1", "value-4"), ("key-2", "value-2"), ("key-3", "value-3")])
        );
    }

    #[tokio::test]
    async fn secrets_follow_the_same_precedence() {
        let source = FakeSource::default()
            .with_object(
                VarsStoreKind::Secret,
                "secret-1",
                &[("key-1", "value-1"), ("key-2", "value-2")],
            )
            .with_object(
                VarsStoreKind::Secret,
                "secret-2",
                &[("key-3", "value-3"), ("key-1", "value-4")],
            );
        let refs = vec![
            vref(VarsStoreKind::Secret, "secret-1"),
            vref(VarsStoreKind::Secret, "secret-2"),
        ];

        let vars = aggregate_vars(&refs, &source, OWNER_NS).await.unwrap();
        assert_eq!(
            vars,
            expect(&[("key-1", "value-4"), ("key-2", "value-2"), ("key-3", "value-3")])
        );
    }

    #[tokio::test]
    async fn vars_keys_select_only_requested_keys() {
        let source = two_config_maps();
        let refs = vec![
            vref(VarsStoreKind::ConfigMap, "config-map-1"),
            keyed(vref(VarsStoreKind::ConfigMap, "config-map-2"), &["key-1"]),
        ];

        // key-3 exists in config-map-2 but was never selected
        let vars = aggregate_vars(&refs, &source, OWNER_NS).await.unwrap();
        assert_eq!(vars, expect(&[("key-1", "value-4"), ("key-2", "value-2")]));
    }

    #[tokio::test]
    async fn optional_missing_reference_contributes_nothing() {
        let source = two_config_maps();
        let refs = vec![
            vref(VarsStoreKind::ConfigMap, "config-map-1"),
            optional(vref(VarsStoreKind::ConfigMap, "does-not-exist")),
            vref(VarsStoreKind::ConfigMap, "config-map-2"),
        ];

        let vars = aggregate_vars(&refs, &source, OWNER_NS).await.unwrap();
        assert_eq!(
            vars,
            expect(&[("key-1", "value-4"), ("key-2", "value-2"), ("key-3", "value-3")])
        );
    }

    #[tokio::test]
    async fn required_missing_reference_fails_with_its_label() {
        let source = two_config_maps();
        let refs = vec![
            vref(VarsStoreKind::ConfigMap, "config-map-1"),
            vref(VarsStoreKind::ConfigMap, "does-not-exist"),
        ];

        match aggregate_vars(&refs, &source, OWNER_NS).await {
            Err(Error::VarsReferenceNotFound { reference }) => {
                assert_eq!(reference, "ConfigMap/flux-system/does-not-exist");
            }
            other => panic!("expected VarsReferenceNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn optional_does_not_mask_a_missing_requested_key() {
        let source = two_config_maps();
        let refs = vec![keyed(
            optional(vref(VarsStoreKind::ConfigMap, "config-map-1")),
            &["key-1", "no-such-key"],
        )];

        match aggregate_vars(&refs, &source, OWNER_NS).await {
            Err(Error::VarsKeyMissing { reference, key }) => {
                assert_eq!(reference, "ConfigMap/flux-system/config-map-1");
                assert_eq!(key, "no-such-key");
            }
            other => panic!("expected VarsKeyMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn optional_does_not_mask_transient_errors() {
        let source = two_config_maps().with_broken("flaky");
        let refs = vec![optional(vref(VarsStoreKind::ConfigMap, "flaky"))];

        match aggregate_vars(&refs, &source, OWNER_NS).await {
            Err(Error::Kube { source }) => {
                assert!(source.to_string().contains("etcdserver"));
            }
            other => panic!("expected Kube error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_stops_at_the_first_fatal_error() {
        let source = two_config_maps().with_broken("flaky");
        let refs = vec![
            vref(VarsStoreKind::ConfigMap, "flaky"),
            vref(VarsStoreKind::ConfigMap, "config-map-1"),
        ];

        assert!(aggregate_vars(&refs, &source, OWNER_NS).await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_reference_list_yields_empty_mapping() {
        let source = FakeSource::default();
        let vars = aggregate_vars(&[], &source, OWNER_NS).await.unwrap();
        assert!(vars.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rerunning_with_identical_inputs_is_deterministic() {
        let source = two_config_maps();
        let refs = vec![
            vref(VarsStoreKind::ConfigMap, "config-map-1"),
            keyed(vref(VarsStoreKind::ConfigMap, "config-map-2"), &["key-1"]),
        ];

        let first = aggregate_vars(&refs, &source, OWNER_NS).await.unwrap();
        let second = aggregate_vars(&refs, &source, OWNER_NS).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn invalid_reference_is_rejected_before_fetching() {
        let source = two_config_maps();
        let refs = vec![vref(VarsStoreKind::ConfigMap, "")];

        assert!(matches!(
            aggregate_vars(&refs, &source, OWNER_NS).await,
            Err(Error::Validation { .. })
        ));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }
}
