use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Node, Secret};
use kube::{
    api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams},
    Client,
};
use tracing::debug;

use super::{
    label_selector, ClusterApi, VersionHistoryEntry, CLUSTER_VERSION_KIND, CLUSTER_VERSION_NAME,
    CONFIG_API_GROUP, CONFIG_API_VERSION, PROXY_KIND,
};
use crate::error::{Error, Result};

/// Default upper bound for a single API call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ClusterApi`] backed by a live `kube::Client`.
///
/// Every request is bounded by `call_timeout`; an expired call surfaces as
/// [`Error::Timeout`] and the in-flight request is dropped.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    call_timeout: Duration,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|e| Error::api(operation, e)),
            Err(_) => Err(Error::Timeout {
                operation: operation.to_string(),
            }),
        }
    }

    fn config_api(&self, kind: &str) -> Api<DynamicObject> {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(
            CONFIG_API_GROUP,
            CONFIG_API_VERSION,
            kind,
        ));
        Api::all_with(self.client.clone(), &resource)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_nodes(&self, selector: &BTreeMap<String, String>) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let selector = label_selector(selector);
        let params = if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(&selector)
        };

        let list = self.bounded("list nodes", nodes.list(&params)).await?;
        debug!(selector = %selector, count = list.items.len(), "Listed nodes");
        Ok(list.items)
    }

    async fn cluster_version_history(&self) -> Result<Vec<VersionHistoryEntry>> {
        let api = self.config_api(CLUSTER_VERSION_KIND);
        let version = self
            .bounded("get clusterversion", api.get(CLUSTER_VERSION_NAME))
            .await?;

        match version.data.pointer("/status/history") {
            Some(history) => Ok(serde_json::from_value(history.clone())?),
            None => Ok(Vec::new()),
        }
    }

    async fn list_secret_names(&self, namespace: &str) -> Result<Vec<String>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded(
                "list secrets",
                secrets.list_metadata(&ListParams::default()),
            )
            .await?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|secret| secret.metadata.name)
            .collect())
    }

    async fn list_proxies(&self) -> Result<Vec<DynamicObject>> {
        let api = self.config_api(PROXY_KIND);
        let list = self
            .bounded("list proxies", api.list(&ListParams::default()))
            .await?;
        Ok(list.items)
    }

    async fn get_config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = self
            .bounded("get configmap", config_maps.get_opt(name))
            .await?;

        Ok(config_map.map(|cm| cm.data.unwrap_or_default()))
    }
}
