//! Node and cluster fact collection
//!
//! OS and kernel facts come from labels that node-feature-discovery (NFD)
//! attaches to every node. The fleet is assumed homogeneous, so only the
//! first node of the list is consulted.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::version::{parse_cluster_major_minor, parse_kernel_patch, parse_os_release, OsRelease};
use crate::cluster::VersionHistoryEntry;
use crate::error::{Error, Result};

pub const OS_RELEASE_ID_LABEL: &str = "feature.node.kubernetes.io/system-os_release.ID";
pub const OS_RELEASE_MAJOR_LABEL: &str =
    "feature.node.kubernetes.io/system-os_release.VERSION_ID.major";
pub const OS_RELEASE_MINOR_LABEL: &str =
    "feature.node.kubernetes.io/system-os_release.VERSION_ID.minor";
pub const KERNEL_FULL_VERSION_LABEL: &str = "feature.node.kubernetes.io/kernel-version.full";

/// History state marking a finished upgrade
pub const COMPLETED_STATE: &str = "Completed";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelFacts {
    pub full_version: String,
    pub patch_version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionFacts {
    pub version: String,
    pub major_minor: String,
}

fn first_node(nodes: &[Node]) -> Result<&Node> {
    nodes.first().ok_or_else(|| Error::NoMatchingNodes {
        selector: "<empty node list>".to_string(),
    })
}

fn required_label<'a>(labels: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    match labels.get(key).map(|value| value.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::missing_label(key)),
    }
}

/// OS release facts from a single node's labels
pub fn os_facts_from_labels(labels: &BTreeMap<String, String>) -> Result<OsRelease> {
    let id = required_label(labels, OS_RELEASE_ID_LABEL)?;
    let major = required_label(labels, OS_RELEASE_MAJOR_LABEL)?;
    let minor = labels
        .get(OS_RELEASE_MINOR_LABEL)
        .map(String::as_str)
        .unwrap_or_default();

    parse_os_release(id, major, minor)
}

/// Kernel facts from a single node's labels
pub fn kernel_facts_from_labels(labels: &BTreeMap<String, String>) -> Result<KernelFacts> {
    let full_version = required_label(labels, KERNEL_FULL_VERSION_LABEL)?;
    let patch_version = parse_kernel_patch(full_version)?;

    Ok(KernelFacts {
        full_version: full_version.to_string(),
        patch_version,
    })
}

pub fn collect_os_facts(nodes: &[Node]) -> Result<OsRelease> {
    let node = first_node(nodes)?;
    let os = os_facts_from_labels(node.labels())?;
    debug!(node = %node.name_any(), os = %os.major_minor, "Read OS release from node labels");
    Ok(os)
}

pub fn collect_kernel_facts(nodes: &[Node]) -> Result<KernelFacts> {
    let node = first_node(nodes)?;
    let kernel = kernel_facts_from_labels(node.labels())?;
    debug!(node = %node.name_any(), kernel = %kernel.full_version, "Read kernel version from node labels");
    Ok(kernel)
}

/// Pick the cluster version: the first `Completed` entry of a newest-first history
pub fn resolve_cluster_version(history: &[VersionHistoryEntry]) -> Result<ClusterVersionFacts> {
    let entry = history
        .iter()
        .find(|entry| entry.state == COMPLETED_STATE)
        .ok_or(Error::UndefinedClusterVersion)?;

    Ok(ClusterVersionFacts {
        version: entry.version.clone(),
        major_minor: parse_cluster_major_minor(&entry.version),
    })
}
