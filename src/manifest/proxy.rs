//! Proxy environment injection into workload manifests
//!
//! Where the container list lives depends on the workload kind. The lookup is
//! the [`CONTAINER_PATHS`] table; supporting another kind means adding a row.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::runtime::ProxyConfiguration;

const POD_TEMPLATE_CONTAINERS: &[&str] = &["spec", "template", "spec", "containers"];

/// Workload kind to container list path
pub const CONTAINER_PATHS: &[(&str, &[&str])] = &[
    ("Pod", &["spec", "containers"]),
    ("DaemonSet", POD_TEMPLATE_CONTAINERS),
    ("Deployment", POD_TEMPLATE_CONTAINERS),
    ("StatefulSet", POD_TEMPLATE_CONTAINERS),
];

pub const HTTP_PROXY_ENV: &str = "HTTP_PROXY";
pub const HTTPS_PROXY_ENV: &str = "HTTPS_PROXY";
pub const NO_PROXY_ENV: &str = "NO_PROXY";

/// Container list path for a workload kind, if the kind carries containers
pub fn container_path(kind: &str) -> Option<&'static [&'static str]> {
    CONTAINER_PATHS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, path)| *path)
}

/// Which containers of a workload receive the proxy variables
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContainerScope {
    #[default]
    AllContainers,
    /// Only the first entry of the container list
    FirstContainerOnly,
}

/// A `{name, value}` container environment entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEnvEntry {
    pub name: String,
    pub value: String,
}

impl ContainerEnvEntry {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn to_value(&self) -> Value {
        json!({ "name": self.name, "value": self.value })
    }
}

/// The three proxy variables for a resolved configuration; empty values are kept
pub fn proxy_env_entries(proxy: &ProxyConfiguration) -> [ContainerEnvEntry; 3] {
    [
        ContainerEnvEntry::new(HTTP_PROXY_ENV, &proxy.http_proxy),
        ContainerEnvEntry::new(HTTPS_PROXY_ENV, &proxy.https_proxy),
        ContainerEnvEntry::new(NO_PROXY_ENV, &proxy.no_proxy),
    ]
}

/// Where a checked manifest keeps its container list
struct Target {
    kind: String,
    name: String,
    pointer: String,
}

/// Appends proxy variables to the containers of workload manifests.
///
/// Appending is unconditional: injecting the same manifest twice leaves two
/// copies of each variable.
#[derive(Clone, Debug)]
pub struct ProxyInjector {
    entries: [ContainerEnvEntry; 3],
    scope: ContainerScope,
}

impl ProxyInjector {
    pub fn new(proxy: &ProxyConfiguration) -> Self {
        Self {
            entries: proxy_env_entries(proxy),
            scope: ContainerScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: ContainerScope) -> Self {
        self.scope = scope;
        self
    }

    /// Inject into one manifest, returning how many containers were updated.
    ///
    /// Kinds without a table entry are left untouched. The manifest is only
    /// modified once every container in scope has been checked, so an `Err`
    /// leaves it as it was.
    pub fn inject(&self, manifest: &mut Value) -> Result<usize> {
        match self.check(manifest)? {
            Some(target) => Ok(self.apply(manifest, &target)),
            None => Ok(0),
        }
    }

    /// Inject into every manifest of a rendered set.
    ///
    /// All manifests are checked before any is modified.
    pub fn inject_all(&self, manifests: &mut [Value]) -> Result<usize> {
        let targets = manifests
            .iter()
            .map(|manifest| self.check(manifest))
            .collect::<Result<Vec<_>>>()?;

        Ok(manifests
            .iter_mut()
            .zip(targets)
            .map(|(manifest, target)| target.map_or(0, |target| self.apply(manifest, &target)))
            .sum())
    }

    fn in_scope(&self) -> usize {
        match self.scope {
            ContainerScope::AllContainers => usize::MAX,
            ContainerScope::FirstContainerOnly => 1,
        }
    }

    /// Locate the container list and verify every `env` in scope can be appended to
    fn check(&self, manifest: &Value) -> Result<Option<Target>> {
        let kind = manifest
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = manifest
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();

        let Some(path) = container_path(&kind) else {
            debug!(kind = %kind, name = %name, "Kind has no container path, skipping proxy setup");
            return Ok(None);
        };
        let pointer = format!("/{}", path.join("/"));

        let containers = manifest
            .pointer(&pointer)
            .ok_or_else(|| {
                Error::InvalidManifest(format!("{kind} '{name}' has no {}", path.join(".")))
            })?
            .as_array()
            .ok_or_else(|| {
                Error::InvalidManifest(format!("{kind} '{name}' {} is not a list", path.join(".")))
            })?;

        for container in containers.iter().take(self.in_scope()) {
            match container.get("env") {
                None | Some(Value::Null) | Some(Value::Array(_)) => {}
                Some(_) => {
                    return Err(Error::InvalidManifest(format!(
                        "{kind} '{name}' has a container env that is not a list"
                    )))
                }
            }
        }

        Ok(Some(Target {
            kind,
            name,
            pointer,
        }))
    }

    fn apply(&self, manifest: &mut Value, target: &Target) -> usize {
        let Some(containers) = manifest
            .pointer_mut(&target.pointer)
            .and_then(Value::as_array_mut)
        else {
            return 0;
        };

        let mut injected = 0;
        for (index, container) in containers.iter_mut().take(self.in_scope()).enumerate() {
            match container.as_object_mut() {
                Some(container) => {
                    self.append_env(container);
                    injected += 1;
                }
                None => {
                    warn!(kind = %target.kind, name = %target.name, index, "Container entry is not an object, skipping");
                }
            }
        }

        debug!(kind = %target.kind, name = %target.name, containers = injected, "Injected proxy environment");
        injected
    }

    fn append_env(&self, container: &mut Map<String, Value>) {
        let env = container
            .entry("env")
            .or_insert_with(|| Value::Array(Vec::new()));
        if env.is_null() {
            *env = Value::Array(Vec::new());
        }

        if let Some(env) = env.as_array_mut() {
            env.extend(self.entries.iter().map(ContainerEnvEntry::to_value));
        }
    }
}
