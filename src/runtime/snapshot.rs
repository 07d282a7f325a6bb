//! Runtime snapshot handed to the chart renderer

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::proxy::ProxyConfiguration;

/// Per-node version state used by the upgrade flow
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpgradeVersion {
    /// OS id with major.minor, e.g. `rhel8.4`
    pub os_version: String,
    pub kernel_full_version: String,
    pub kernel_patch_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubelet_version: String,
}

/// Names of the chart resource groups, one per installation stage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupName {
    pub driver_build: String,
    pub driver_container: String,
    pub runtime_enablement: String,
    pub device_plugin: String,
    pub device_monitoring: String,
    pub device_dashboard: String,
    pub device_feature_discovery: String,
    pub csi_driver: String,
}

impl Default for ResourceGroupName {
    fn default() -> Self {
        Self {
            driver_build: "driver-build".to_string(),
            driver_container: "driver-container".to_string(),
            runtime_enablement: "runtime-enablement".to_string(),
            device_plugin: "device-plugin".to_string(),
            device_monitoring: "device-monitoring".to_string(),
            device_dashboard: "device-dashboard".to_string(),
            device_feature_discovery: "device-feature-discovery".to_string(),
            csi_driver: "csi-driver".to_string(),
        }
    }
}

const STATE_LABEL_PREFIX: &str = "specialresource.openshift.io";

/// Node label prefixes marking a stage as ready on a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStateName {
    pub driver_container: String,
    pub runtime_enablement: String,
    pub device_plugin: String,
    pub device_monitoring: String,
}

impl Default for ResourceStateName {
    fn default() -> Self {
        Self {
            driver_container: format!("{STATE_LABEL_PREFIX}/driver-container"),
            runtime_enablement: format!("{STATE_LABEL_PREFIX}/runtime-enablement"),
            device_plugin: format!("{STATE_LABEL_PREFIX}/device-plugin"),
            device_monitoring: format!("{STATE_LABEL_PREFIX}/device-monitoring"),
        }
    }
}

/// All facts gathered in one reconciliation pass.
///
/// Built from scratch by `collect_runtime_snapshot` and passed by value to
/// the renderer; it is never mutated across passes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub operating_system_id: String,
    pub operating_system_major: String,
    pub operating_system_major_minor: String,
    pub operating_system_decimal: String,
    pub kernel_full_version: String,
    pub kernel_patch_version: String,
    pub cluster_version: String,
    pub cluster_version_major_minor: String,
    pub cluster_upgrade_info: BTreeMap<String, NodeUpgradeVersion>,
    pub push_secret_name: String,
    #[serde(rename = "osImageURL")]
    pub os_image_url: String,
    pub proxy: ProxyConfiguration,
    pub group_name: ResourceGroupName,
    pub state_name: ResourceStateName,
    pub collected_at: DateTime<Utc>,
}

impl RuntimeSnapshot {
    /// Merge per-node upgrade info; entries for the same node are replaced
    pub fn merge_upgrade_info(&mut self, info: BTreeMap<String, NodeUpgradeVersion>) {
        self.cluster_upgrade_info.extend(info);
    }

    pub fn log_summary(&self) {
        info!(
            os = %self.operating_system_major_minor,
            os_decimal = %self.operating_system_decimal,
            kernel = %self.kernel_full_version,
            kernel_patch = %self.kernel_patch_version,
            cluster_version = %self.cluster_version,
            cluster_major_minor = %self.cluster_version_major_minor,
            nodes = self.cluster_upgrade_info.len(),
            push_secret = %self.push_secret_name,
            os_image_url = %self.os_image_url,
            proxy_configured = !self.proxy.is_empty(),
            "Runtime information collected"
        );
    }
}
