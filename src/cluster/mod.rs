//! Cluster API seam
//!
//! Everything the fact collectors read from the API server goes through
//! [`ClusterApi`], so the collectors can be exercised against mocks while
//! [`KubeClusterApi`] talks to a real cluster.

mod client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::DynamicObject;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use client::{KubeClusterApi, DEFAULT_CALL_TIMEOUT};

/// API group of the OpenShift cluster configuration objects
pub const CONFIG_API_GROUP: &str = "config.openshift.io";
pub const CONFIG_API_VERSION: &str = "v1";
pub const CLUSTER_VERSION_KIND: &str = "ClusterVersion";
pub const CLUSTER_VERSION_NAME: &str = "version";
pub const PROXY_KIND: &str = "Proxy";

/// One record of the cluster version history, newest first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub state: String,
}

impl VersionHistoryEntry {
    pub fn new(version: &str, state: &str) -> Self {
        Self {
            version: version.to_string(),
            state: state.to_string(),
        }
    }
}

/// Read access to the cluster state the runtime snapshot is built from
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List nodes matching every `key=value` pair of the selector
    async fn list_nodes(&self, selector: &BTreeMap<String, String>) -> Result<Vec<Node>>;

    /// Status history of the cluster version object
    async fn cluster_version_history(&self) -> Result<Vec<VersionHistoryEntry>>;

    /// Names of all secrets in a namespace, in listing order
    async fn list_secret_names(&self, namespace: &str) -> Result<Vec<String>>;

    /// All cluster-scoped proxy configuration objects
    async fn list_proxies(&self) -> Result<Vec<DynamicObject>>;

    /// `data` of a ConfigMap, `None` if the ConfigMap does not exist
    async fn get_config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>>;
}

/// Render a label selector map as `k1=v1,k2=v2`
pub fn label_selector(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector_rendering() {
        let mut selector = BTreeMap::new();
        assert_eq!(label_selector(&selector), "");

        selector.insert(
            "feature.node.kubernetes.io/pci-10de.present".to_string(),
            "true".to_string(),
        );
        selector.insert("node-role.kubernetes.io/worker".to_string(), "".to_string());
        assert_eq!(
            label_selector(&selector),
            "feature.node.kubernetes.io/pci-10de.present=true,node-role.kubernetes.io/worker="
        );
    }

    #[test]
    fn test_history_entry_ignores_unknown_fields() {
        let entry: VersionHistoryEntry = serde_json::from_value(serde_json::json!({
            "version": "4.10.0",
            "state": "Completed",
            "image": "quay.io/openshift-release-dev/ocp-release@sha256:abc",
            "verified": false
        }))
        .unwrap();
        assert_eq!(entry, VersionHistoryEntry::new("4.10.0", "Completed"));
    }
}
