//! Cluster-wide proxy configuration
//!
//! Every field of the proxy object is optional. A field that is missing or
//! has the wrong type degrades to an empty string and is reported as a
//! [`ProxyFieldIssue`]; only a failing list call aborts the pass.

use kube::{api::DynamicObject, ResourceExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cluster::ClusterApi;
use crate::error::Result;

/// Proxy objects are selected by this substring of their name
pub const CLUSTER_PROXY_NAME_PATTERN: &str = "cluster";

/// Resolved outbound proxy settings; all-empty means no proxy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfiguration {
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
    #[serde(rename = "trustedCA")]
    pub trusted_ca: String,
}

impl ProxyConfiguration {
    pub fn is_empty(&self) -> bool {
        self.http_proxy.is_empty()
            && self.https_proxy.is_empty()
            && self.no_proxy.is_empty()
            && self.trusted_ca.is_empty()
    }
}

/// Why a single proxy field could not be read
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field not found")]
    NotFound,

    #[error("expected a string, found {0}")]
    NotAString(String),
}

/// A degraded field: logged, defaulted to empty, and kept for the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyFieldIssue {
    pub object: String,
    pub field: String,
    pub error: FieldError,
}

/// Outcome of proxy resolution
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyResolution {
    pub config: ProxyConfiguration,
    pub issues: Vec<ProxyFieldIssue>,
}

impl ProxyResolution {
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Read a string at a nested path of a JSON tree
pub fn nested_string(value: &Value, path: &[&str]) -> std::result::Result<String, FieldError> {
    let mut cursor = value;
    for segment in path {
        cursor = cursor.get(*segment).ok_or(FieldError::NotFound)?;
    }

    match cursor {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Err(FieldError::NotFound),
        other => Err(FieldError::NotAString(json_type_name(other).to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_field(
    object: &str,
    data: &Value,
    path: &[&str],
    issues: &mut Vec<ProxyFieldIssue>,
) -> String {
    nested_string(data, path).unwrap_or_else(|error| {
        let field = path.join(".");
        warn!(object, field = %field, %error, "Proxy field unavailable, defaulting to empty");
        issues.push(ProxyFieldIssue {
            object: object.to_string(),
            field,
            error,
        });
        String::new()
    })
}

/// Extract the proxy configuration from one proxy object
pub fn proxy_from_object(
    object: &DynamicObject,
    issues: &mut Vec<ProxyFieldIssue>,
) -> ProxyConfiguration {
    let name = object.name_any();
    let data = &object.data;

    ProxyConfiguration {
        http_proxy: read_field(&name, data, &["spec", "httpProxy"], issues),
        https_proxy: read_field(&name, data, &["spec", "httpsProxy"], issues),
        no_proxy: read_field(&name, data, &["spec", "noProxy"], issues),
        trusted_ca: read_field(&name, data, &["spec", "trustedCA", "name"], issues),
    }
}

/// Resolve the cluster proxy configuration.
///
/// Objects whose name contains `cluster` are applied in listing order, so a
/// later match overwrites an earlier one field by field.
#[instrument(skip_all)]
pub async fn resolve_proxy<A: ClusterApi + ?Sized>(api: &A) -> Result<ProxyResolution> {
    let objects = api.list_proxies().await?;

    let matching: Vec<&DynamicObject> = objects
        .iter()
        .filter(|object| object.name_any().contains(CLUSTER_PROXY_NAME_PATTERN))
        .collect();

    if matching.len() > 1 {
        let names: Vec<String> = matching.iter().map(|object| object.name_any()).collect();
        warn!(
            objects = ?names,
            "Multiple cluster proxy objects found, the last one wins"
        );
    }

    let mut resolution = ProxyResolution::default();
    for object in matching {
        resolution.config = proxy_from_object(object, &mut resolution.issues);
    }

    if resolution.config.is_empty() {
        debug!("No cluster proxy configured");
    }

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockClusterApi;
    use crate::error::Error;
    use kube::api::{ApiResource, GroupVersionKind};
    use serde_json::json;

    fn proxy_object(name: &str, data: Value) -> DynamicObject {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(
            "config.openshift.io",
            "v1",
            "Proxy",
        ));
        DynamicObject::new(name, &resource).data(data)
    }

    fn api_returning(objects: Vec<DynamicObject>) -> MockClusterApi {
        let mut api = MockClusterApi::new();
        api.expect_list_proxies()
            .times(1)
            .return_once(move || Ok(objects));
        api
    }

    #[test]
    fn test_nested_string_outcomes() {
        let tree = json!({"spec": {"httpProxy": "http://p:3128", "noProxy": 5, "trustedCA": null}});

        assert_eq!(
            nested_string(&tree, &["spec", "httpProxy"]),
            Ok("http://p:3128".to_string())
        );
        assert_eq!(
            nested_string(&tree, &["spec", "httpsProxy"]),
            Err(FieldError::NotFound)
        );
        assert_eq!(
            nested_string(&tree, &["spec", "noProxy"]),
            Err(FieldError::NotAString("number".to_string()))
        );
        assert_eq!(
            nested_string(&tree, &["spec", "trustedCA", "name"]),
            Err(FieldError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_empty_proxy_list_is_no_proxy() {
        let api = api_returning(vec![]);
        let resolution = resolve_proxy(&api).await.unwrap();

        assert_eq!(resolution.config, ProxyConfiguration::default());
        assert!(resolution.config.is_empty());
        assert!(!resolution.is_degraded());
    }

    #[tokio::test]
    async fn test_full_cluster_proxy() {
        let api = api_returning(vec![proxy_object(
            "cluster",
            json!({"spec": {
                "httpProxy": "http://p:3128",
                "httpsProxy": "https://p:3129",
                "noProxy": "localhost,.svc",
                "trustedCA": {"name": "user-ca-bundle"}
            }}),
        )]);
        let resolution = resolve_proxy(&api).await.unwrap();

        assert_eq!(
            resolution.config,
            ProxyConfiguration {
                http_proxy: "http://p:3128".to_string(),
                https_proxy: "https://p:3129".to_string(),
                no_proxy: "localhost,.svc".to_string(),
                trusted_ca: "user-ca-bundle".to_string(),
            }
        );
        assert!(!resolution.is_degraded());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_fields_degrade() {
        let api = api_returning(vec![proxy_object(
            "cluster",
            json!({"spec": {"httpProxy": "http://p:3128", "noProxy": ["a", "b"]}}),
        )]);
        let resolution = resolve_proxy(&api).await.unwrap();

        assert_eq!(resolution.config.http_proxy, "http://p:3128");
        assert_eq!(resolution.config.https_proxy, "");
        assert_eq!(resolution.config.no_proxy, "");
        assert_eq!(resolution.config.trusted_ca, "");

        let fields: Vec<&str> = resolution.issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["spec.httpsProxy", "spec.noProxy", "spec.trustedCA.name"]
        );
        assert_eq!(
            resolution.issues[1].error,
            FieldError::NotAString("array".to_string())
        );
    }

    #[tokio::test]
    async fn test_non_cluster_objects_are_ignored() {
        let api = api_returning(vec![proxy_object(
            "staging",
            json!({"spec": {"httpProxy": "http://ignored:3128"}}),
        )]);
        let resolution = resolve_proxy(&api).await.unwrap();

        assert!(resolution.config.is_empty());
        assert!(resolution.issues.is_empty());
    }

    #[tokio::test]
    async fn test_last_matching_object_wins() {
        let api = api_returning(vec![
            proxy_object(
                "cluster",
                json!({"spec": {"httpProxy": "http://first:3128", "noProxy": "first"}}),
            ),
            proxy_object(
                "cluster-secondary",
                json!({"spec": {"httpProxy": "http://second:3128"}}),
            ),
        ]);
        let resolution = resolve_proxy(&api).await.unwrap();

        assert_eq!(resolution.config.http_proxy, "http://second:3128");
        // Overwritten field by field, including fields the later object lacks
        assert_eq!(resolution.config.no_proxy, "");
    }

    #[tokio::test]
    async fn test_list_failure_is_fatal() {
        let mut api = MockClusterApi::new();
        api.expect_list_proxies().times(1).returning(|| {
            Err(Error::Timeout {
                operation: "list proxies".to_string(),
            })
        });

        assert!(matches!(
            resolve_proxy(&api).await,
            Err(Error::Timeout { .. })
        ));
    }
}
