//! Error types for fact collection and manifest mutation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required fact (node label, ConfigMap key) is absent or empty
    #[error("Missing required fact '{key}'{hint}")]
    MissingFact { key: String, hint: String },

    /// No `Completed` entry in the cluster version history
    #[error("Undefined cluster version: no Completed entry in version history")]
    UndefinedClusterVersion,

    /// A node selector matched zero nodes
    #[error("No nodes matched the node selector: {selector}")]
    NoMatchingNodes { selector: String },

    /// A list/get call against the API server failed
    #[error("API call '{operation}' failed: {source}")]
    ApiCallFailed {
        operation: String,
        #[source]
        source: kube::Error,
    },

    /// The push secret never showed up within the retry budget
    #[error("Cannot find Secret {pattern} in namespace {namespace}")]
    SecretNotFound { pattern: String, namespace: String },

    /// An API call exceeded the configured per-call timeout
    #[error("API call '{operation}' timed out")]
    Timeout { operation: String },

    /// The manifest tree does not have the shape its kind requires
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

const NFD_HINT: &str = ", is NFD running? Check node labels";

impl Error {
    /// A missing fact that is not a node label
    pub fn missing_fact(key: impl Into<String>) -> Self {
        Error::MissingFact {
            key: key.into(),
            hint: String::new(),
        }
    }

    /// A missing or empty NFD node label
    pub fn missing_label(label: impl Into<String>) -> Self {
        Error::MissingFact {
            key: label.into(),
            hint: NFD_HINT.to_string(),
        }
    }

    /// Wrap a kube error with the operation that produced it
    pub fn api(operation: impl Into<String>, source: kube::Error) -> Self {
        Error::ApiCallFailed {
            operation: operation.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fact_messages() {
        assert_eq!(
            Error::missing_label("feature.node.kubernetes.io/kernel-version.full").to_string(),
            "Missing required fact 'feature.node.kubernetes.io/kernel-version.full', is NFD running? Check node labels"
        );
        assert_eq!(
            Error::missing_fact("machine-config-osimageurl.data.osImageURL").to_string(),
            "Missing required fact 'machine-config-osimageurl.data.osImageURL'"
        );
    }
}
