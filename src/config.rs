//! Configuration for a fact collection pass

use std::collections::BTreeMap;
use std::time::Duration;

use crate::cluster::DEFAULT_CALL_TIMEOUT;
use crate::error::{Error, Result};
use crate::manifest::ContainerScope;
use crate::runtime::RetryPolicy;

/// Settings for one reconciliation pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Namespace the chart is installed into; the push secret lives here
    pub namespace: String,
    /// Nodes the software stack targets
    pub node_selector: BTreeMap<String, String>,
    pub secret_retry: RetryPolicy,
    pub call_timeout: Duration,
    pub container_scope: ContainerScope,
}

impl RuntimeConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            node_selector: BTreeMap::new(),
            secret_retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            container_scope: ContainerScope::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::ConfigError("namespace must not be empty".to_string()));
        }
        if self.call_timeout.is_zero() {
            return Err(Error::ConfigError(
                "call timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a `k1=v1,k2=v2` node selector. Empty input selects every node.
pub fn parse_node_selector(raw: &str) -> Result<BTreeMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(Error::ConfigError(format!(
                "invalid node selector entry '{pair}', expected key=value"
            ))),
        })
        .collect()
}
