//! Runtime fact collection
//!
//! Builds the [`RuntimeSnapshot`] for one reconciliation pass: node OS and
//! kernel, cluster version, per-node upgrade state, push secret, machine OS
//! image and proxy configuration.

pub mod collector;
pub mod facts;
pub mod proxy;
pub mod secret;
pub mod snapshot;
pub mod upgrade;
pub mod version;

pub use collector::{collect_runtime_snapshot, fetch_os_image_url};
pub use facts::{
    collect_kernel_facts, collect_os_facts, resolve_cluster_version, ClusterVersionFacts,
    KernelFacts,
};
pub use proxy::{resolve_proxy, FieldError, ProxyConfiguration, ProxyFieldIssue, ProxyResolution};
pub use secret::{find_push_secret, RetryPolicy, PUSH_SECRET_PATTERN};
pub use snapshot::{NodeUpgradeVersion, ResourceGroupName, ResourceStateName, RuntimeSnapshot};
pub use upgrade::{collect_upgrade_info, ClusterInfo, NodeLabelClusterInfo};
pub use version::{parse_cluster_major_minor, parse_kernel_patch, parse_os_release, OsRelease};
