//! Post-processing of rendered workload manifests before submission

mod proxy;

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

pub use proxy::{
    container_path, proxy_env_entries, ContainerEnvEntry, ContainerScope, ProxyInjector,
    CONTAINER_PATHS, HTTPS_PROXY_ENV, HTTP_PROXY_ENV, NO_PROXY_ENV,
};

/// Parse a multi-document YAML stream into manifest trees, skipping empty documents
pub fn parse_manifests(yaml: &str) -> Result<Vec<Value>> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let manifest = Value::deserialize(document)?;
        if !manifest.is_null() {
            manifests.push(manifest);
        }
    }
    Ok(manifests)
}

pub fn load_manifests(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let yaml = std::fs::read_to_string(path)?;
    parse_manifests(&yaml)
}

/// Render manifests back into a multi-document YAML stream
pub fn render_manifests(manifests: &[Value]) -> Result<String> {
    let mut out = String::new();
    for manifest in manifests {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(manifest)?);
    }
    Ok(out)
}
