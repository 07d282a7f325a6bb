//! One reconciliation pass: collect every fact into a fresh snapshot

use chrono::Utc;
use tracing::{info, instrument};

use super::facts::{collect_kernel_facts, collect_os_facts, resolve_cluster_version};
use super::proxy::resolve_proxy;
use super::secret::find_push_secret;
use super::snapshot::RuntimeSnapshot;
use super::upgrade::{upgrade_info_for, ClusterInfo};
use crate::cluster::{label_selector, ClusterApi};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

pub const OS_IMAGE_URL_NAMESPACE: &str = "openshift-machine-config-operator";
pub const OS_IMAGE_URL_CONFIGMAP: &str = "machine-config-osimageurl";
pub const OS_IMAGE_URL_KEY: &str = "osImageURL";

/// Machine OS image URL published by the machine-config operator
pub async fn fetch_os_image_url<A: ClusterApi + ?Sized>(api: &A) -> Result<String> {
    let data = api
        .get_config_map_data(OS_IMAGE_URL_NAMESPACE, OS_IMAGE_URL_CONFIGMAP)
        .await?
        .ok_or_else(|| {
            Error::missing_fact(format!(
                "configmap {OS_IMAGE_URL_NAMESPACE}/{OS_IMAGE_URL_CONFIGMAP}"
            ))
        })?;

    data.get(OS_IMAGE_URL_KEY)
        .filter(|url| !url.is_empty())
        .cloned()
        .ok_or_else(|| {
            Error::missing_fact(format!("{OS_IMAGE_URL_CONFIGMAP}.data.{OS_IMAGE_URL_KEY}"))
        })
}

/// Build the runtime snapshot for one pass.
///
/// Steps run strictly in sequence and the first fatal error aborts the pass;
/// the outer control loop is expected to requeue.
#[instrument(skip_all, fields(namespace = %config.namespace))]
pub async fn collect_runtime_snapshot<A, I>(
    api: &A,
    cluster_info: &I,
    config: &RuntimeConfig,
) -> Result<RuntimeSnapshot>
where
    A: ClusterApi + ?Sized,
    I: ClusterInfo + ?Sized,
{
    let nodes = api.list_nodes(&config.node_selector).await?;
    if nodes.is_empty() {
        return Err(Error::NoMatchingNodes {
            selector: label_selector(&config.node_selector),
        });
    }
    info!(nodes = nodes.len(), "Collecting runtime information");

    let os = collect_os_facts(&nodes)?;
    let kernel = collect_kernel_facts(&nodes)?;

    let history = api.cluster_version_history().await?;
    let cluster = resolve_cluster_version(&history)?;

    let upgrade_info = upgrade_info_for(cluster_info, &nodes, &config.node_selector).await?;
    let push_secret_name = find_push_secret(api, &config.namespace, &config.secret_retry).await?;
    let os_image_url = fetch_os_image_url(api).await?;
    let proxy = resolve_proxy(api).await?;

    let snapshot = RuntimeSnapshot {
        operating_system_id: os.id,
        operating_system_major: os.major,
        operating_system_major_minor: os.major_minor,
        operating_system_decimal: os.decimal,
        kernel_full_version: kernel.full_version,
        kernel_patch_version: kernel.patch_version,
        cluster_version: cluster.version,
        cluster_version_major_minor: cluster.major_minor,
        cluster_upgrade_info: upgrade_info,
        push_secret_name,
        os_image_url,
        proxy: proxy.config,
        collected_at: Utc::now(),
        ..Default::default()
    };

    snapshot.log_summary();
    Ok(snapshot)
}
