//! Upgrade flow: per-node version state for the selected nodes

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
#[cfg(test)]
use mockall::automock;
use tracing::{info, instrument};

use super::facts::{kernel_facts_from_labels, os_facts_from_labels};
use super::snapshot::{NodeUpgradeVersion, RuntimeSnapshot};
use crate::cluster::{label_selector, ClusterApi};
use crate::error::{Error, Result};

/// Source of per-node upgrade state
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterInfo: Send + Sync {
    async fn cluster_info(&self, nodes: &[Node]) -> Result<BTreeMap<String, NodeUpgradeVersion>>;
}

/// [`ClusterInfo`] derived from each node's NFD labels and kubelet version
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeLabelClusterInfo;

#[async_trait]
impl ClusterInfo for NodeLabelClusterInfo {
    async fn cluster_info(&self, nodes: &[Node]) -> Result<BTreeMap<String, NodeUpgradeVersion>> {
        nodes
            .iter()
            .map(|node| -> Result<(String, NodeUpgradeVersion)> {
                let os = os_facts_from_labels(node.labels())?;
                let kernel = kernel_facts_from_labels(node.labels())?;
                let kubelet_version = node
                    .status
                    .as_ref()
                    .and_then(|status| status.node_info.as_ref())
                    .map(|info| info.kubelet_version.clone())
                    .unwrap_or_default();

                Ok((
                    node.name_any(),
                    NodeUpgradeVersion {
                        os_version: os.major_minor,
                        kernel_full_version: kernel.full_version,
                        kernel_patch_version: kernel.patch_version,
                        kubelet_version,
                    },
                ))
            })
            .collect()
    }
}

/// Upgrade info for an already listed node set; zero nodes is fatal
pub async fn upgrade_info_for<I: ClusterInfo + ?Sized>(
    cluster_info: &I,
    nodes: &[Node],
    selector: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, NodeUpgradeVersion>> {
    if nodes.is_empty() {
        return Err(Error::NoMatchingNodes {
            selector: label_selector(selector),
        });
    }

    cluster_info.cluster_info(nodes).await
}

/// List the nodes matching `selector` and merge their upgrade info into `snapshot`.
///
/// Returns the number of nodes merged.
#[instrument(skip_all, fields(selector = %label_selector(selector)))]
pub async fn collect_upgrade_info<A, I>(
    api: &A,
    cluster_info: &I,
    selector: &BTreeMap<String, String>,
    snapshot: &mut RuntimeSnapshot,
) -> Result<usize>
where
    A: ClusterApi + ?Sized,
    I: ClusterInfo + ?Sized,
{
    let nodes = api.list_nodes(selector).await?;
    let info = upgrade_info_for(cluster_info, &nodes, selector).await?;
    let count = info.len();

    snapshot.merge_upgrade_info(info);
    info!(nodes = count, "Merged cluster upgrade info");

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockClusterApi;
    use crate::runtime::facts::{
        KERNEL_FULL_VERSION_LABEL, OS_RELEASE_ID_LABEL, OS_RELEASE_MAJOR_LABEL,
        OS_RELEASE_MINOR_LABEL,
    };
    use k8s_openapi::api::core::v1::{NodeStatus, NodeSystemInfo};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn gpu_node(name: &str, kernel: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(BTreeMap::from([
                    (OS_RELEASE_ID_LABEL.to_string(), "rhel".to_string()),
                    (OS_RELEASE_MAJOR_LABEL.to_string(), "8".to_string()),
                    (OS_RELEASE_MINOR_LABEL.to_string(), "6".to_string()),
                    (KERNEL_FULL_VERSION_LABEL.to_string(), kernel.to_string()),
                ])),
                ..Default::default()
            },
            status: Some(NodeStatus {
                node_info: Some(NodeSystemInfo {
                    kubelet_version: "v1.24.0+9546431".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn selector() -> BTreeMap<String, String> {
        BTreeMap::from([(
            "feature.node.kubernetes.io/pci-10de.present".to_string(),
            "true".to_string(),
        )])
    }

    #[tokio::test]
    async fn test_label_cluster_info_per_node() {
        let nodes = vec![
            gpu_node("worker-0", "4.18.0-372.9.1.el8.x86_64"),
            gpu_node("worker-1", "4.18.0-305.19.1.el8_4.x86_64"),
        ];
        let info = NodeLabelClusterInfo.cluster_info(&nodes).await.unwrap();

        assert_eq!(info.len(), 2);
        assert_eq!(info["worker-0"].os_version, "rhel8.6");
        assert_eq!(info["worker-0"].kernel_patch_version, "4-372");
        assert_eq!(info["worker-1"].kernel_patch_version, "4-305");
        assert_eq!(info["worker-1"].kubelet_version, "v1.24.0+9546431");
    }

    #[tokio::test]
    async fn test_selector_matching_no_nodes_is_fatal() {
        let mut api = MockClusterApi::new();
        api.expect_list_nodes().times(1).returning(|_| Ok(vec![]));
        let mut info = MockClusterInfo::new();
        info.expect_cluster_info().never();

        let mut snapshot = RuntimeSnapshot::default();
        let err = collect_upgrade_info(&api, &info, &selector(), &mut snapshot)
            .await
            .unwrap_err();

        match err {
            Error::NoMatchingNodes { selector } => {
                assert_eq!(selector, "feature.node.kubernetes.io/pci-10de.present=true")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(snapshot.cluster_upgrade_info.is_empty());
    }

    #[tokio::test]
    async fn test_upgrade_info_is_merged_unchanged() {
        let mut api = MockClusterApi::new();
        api.expect_list_nodes()
            .times(1)
            .returning(|_| Ok(vec![gpu_node("worker-0", "4.18.0-372.9.1.el8.x86_64")]));

        let record = NodeUpgradeVersion {
            os_version: "rhel8.6".to_string(),
            kernel_full_version: "4.18.0-372.9.1.el8.x86_64".to_string(),
            kernel_patch_version: "4-372".to_string(),
            kubelet_version: String::new(),
        };
        let expected = record.clone();
        let mut info = MockClusterInfo::new();
        info.expect_cluster_info()
            .times(1)
            .returning(move |_| Ok(BTreeMap::from([("worker-0".to_string(), record.clone())])));

        let mut snapshot = RuntimeSnapshot::default();
        let merged = collect_upgrade_info(&api, &info, &selector(), &mut snapshot)
            .await
            .unwrap();

        assert_eq!(merged, 1);
        assert_eq!(snapshot.cluster_upgrade_info["worker-0"], expected);
    }
}
