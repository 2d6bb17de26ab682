//! Upstream-compatible metric backend.
//!
//! Federates another custom-metrics / external-metrics API server: metrics
//! are discovered by listing the API group-versions' resources, and fetches
//! are forwarded to the upstream with the response translated field by
//! field into the core value shapes.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::backends::MetricBackend;
use crate::config::{HttpClientConfig, MetricServer, Namer};
use crate::error::{HuginError, Result};
use crate::types::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValueList, GroupResource, MetricValue,
    MetricValueList, NamespacedName, Selector,
};

const CUSTOM_METRICS_API: &str = "apis/custom.metrics.k8s.io/v1beta2";
const EXTERNAL_METRICS_API: &str = "apis/external.metrics.k8s.io/v1beta1";

pub struct UpstreamBackend {
    cfg: MetricServer,
    client_cfg: HttpClientConfig,
    http: reqwest::Client,
    base_url: String,
    // Alias map for custom metrics, rebuilt on each discovery.
    namer: RwLock<Namer>,
}

impl UpstreamBackend {
    pub fn new(cfg: MetricServer) -> Result<Self> {
        let client_cfg = cfg.client_config()?.clone();
        let http = client_cfg.build_client()?;
        let base_url = client_cfg.expanded_host();
        let namer = Namer::new(cfg.rename.as_ref())?;
        Ok(Self {
            cfg,
            client_cfg,
            http,
            base_url,
            namer: RwLock::new(namer),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.client_cfg.authenticate(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body: wire::Status = response.json().await.unwrap_or_default();
            let message = if body.message.is_empty() {
                format!("request to {url} failed")
            } else {
                body.message
            };
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(HuginError::MetricNotFound(message));
            }
            return Err(HuginError::Upstream {
                status: status.as_u16(),
                kind: body.reason,
                reason: message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| HuginError::Http(format!("error parsing response body: {e}")))
    }

    fn custom_metric_url(&self, info: &CustomMetricInfo, scope: Scope<'_>, metric: &str) -> String {
        let gr = &info.group_resource;
        match scope {
            Scope::Namespaced { namespace, object } => format!(
                "{}/{CUSTOM_METRICS_API}/namespaces/{namespace}/{gr}/{object}/{metric}",
                self.base_url
            ),
            Scope::Root { object } => {
                format!("{}/{CUSTOM_METRICS_API}/{gr}/{object}/{metric}", self.base_url)
            }
        }
    }

    fn resolve_custom_alias(&self, exported: &str) -> Result<String> {
        self.namer
            .read()
            .expect("namer lock poisoned")
            .lookup(exported)
            .ok_or_else(|| {
                HuginError::AliasNotFound(format!(
                    "alias for custom metric {exported} not found"
                ))
            })
    }
}

enum Scope<'a> {
    Namespaced { namespace: &'a str, object: &'a str },
    Root { object: &'a str },
}

#[async_trait]
impl MetricBackend for UpstreamBackend {
    fn configuration(&self) -> &MetricServer {
        &self.cfg
    }

    async fn list_custom_metrics(&self) -> Result<HashSet<CustomMetricInfo>> {
        let list: wire::ApiResourceList = self
            .get_json(format!("{}/{CUSTOM_METRICS_API}", self.base_url), &[])
            .await?;

        let mut namer = Namer::new(self.cfg.rename.as_ref())?;
        let mut infos = HashSet::with_capacity(list.resources.len());
        for resource in list.resources {
            // Resource names come as `<groupResource>/<metric>`.
            let Some((group_resource, metric)) = resource.name.split_once('/') else {
                debug!(backend = %self.name(), resource = %resource.name, "upstream returned a malformed metric resource");
                continue;
            };
            infos.insert(CustomMetricInfo {
                group_resource: GroupResource::parse(group_resource),
                namespaced: resource.namespaced,
                metric: namer.register(metric),
            });
        }
        *self.namer.write().expect("namer lock poisoned") = namer;
        Ok(infos)
    }

    async fn get_metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValue> {
        let metric = self.resolve_custom_alias(&info.metric)?;
        let scope = if info.namespaced {
            Scope::Namespaced {
                namespace: &name.namespace,
                object: &name.name,
            }
        } else {
            Scope::Root { object: &name.name }
        };
        let mut query = Vec::new();
        if !metric_selector.is_empty() {
            query.push(("metricLabelSelector", metric_selector.to_string()));
        }
        let list: wire::MetricValueList = self
            .get_json(self.custom_metric_url(info, scope, &metric), &query)
            .await?;
        let item = list.items.into_iter().next().ok_or_else(|| {
            HuginError::MetricNotFound(format!(
                "custom metric {} not found for {}",
                info.metric, name
            ))
        })?;
        Ok(item.into())
    }

    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        selector: &Selector,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValueList> {
        let metric = self.resolve_custom_alias(&info.metric)?;
        let scope = if info.namespaced {
            Scope::Namespaced {
                namespace,
                object: "*",
            }
        } else {
            Scope::Root { object: "*" }
        };
        let mut query = Vec::new();
        if !selector.is_empty() {
            query.push(("labelSelector", selector.to_string()));
        }
        if !metric_selector.is_empty() {
            query.push(("metricLabelSelector", metric_selector.to_string()));
        }
        let list: wire::MetricValueList = self
            .get_json(self.custom_metric_url(info, scope, &metric), &query)
            .await?;
        Ok(MetricValueList {
            items: list.items.into_iter().map(Into::into).collect(),
        })
    }

    async fn list_external_metrics(&self) -> Result<HashSet<ExternalMetricInfo>> {
        let list: wire::ApiResourceList = self
            .get_json(format!("{}/{EXTERNAL_METRICS_API}", self.base_url), &[])
            .await?;
        Ok(list
            .resources
            .into_iter()
            .map(|resource| ExternalMetricInfo {
                metric: resource.name,
            })
            .collect())
    }

    async fn get_external_metric(
        &self,
        namespace: &str,
        name: &str,
        selector: &Selector,
    ) -> Result<ExternalMetricValueList> {
        let mut query = Vec::new();
        if !selector.is_empty() {
            query.push(("labelSelector", selector.to_string()));
        }
        let list: wire::ExternalMetricValueList = self
            .get_json(
                format!(
                    "{}/{EXTERNAL_METRICS_API}/namespaces/{namespace}/{name}",
                    self.base_url
                ),
                &query,
            )
            .await?;
        Ok(ExternalMetricValueList {
            items: list.items.into_iter().map(Into::into).collect(),
        })
    }
}

/// Versioned wire shapes of the upstream APIs, translated field by field
/// into the core types so upstream schema drift stays contained here.
mod wire {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    use crate::types;
    use crate::types::Quantity;

    #[derive(Debug, Default, Deserialize)]
    pub struct ApiResourceList {
        #[serde(default)]
        pub resources: Vec<ApiResource>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ApiResource {
        pub name: String,
        #[serde(default)]
        pub namespaced: bool,
    }

    /// Failure body in the platform's status shape.
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Status {
        #[serde(default)]
        pub message: String,
        #[serde(default)]
        pub reason: String,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MetricValueList {
        #[serde(default)]
        pub items: Vec<MetricValue>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MetricValue {
        pub described_object: ObjectReference,
        pub metric: MetricIdentifier,
        pub timestamp: DateTime<Utc>,
        #[serde(default)]
        pub window_seconds: Option<i64>,
        pub value: Quantity,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ObjectReference {
        #[serde(default)]
        pub kind: String,
        #[serde(default)]
        pub namespace: String,
        #[serde(default)]
        pub name: String,
        #[serde(default)]
        pub api_version: String,
        #[serde(default)]
        pub resource_version: String,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MetricIdentifier {
        #[serde(default)]
        pub name: String,
        #[serde(default)]
        pub selector: Option<types::LabelSelector>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExternalMetricValueList {
        #[serde(default)]
        pub items: Vec<ExternalMetricValue>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExternalMetricValue {
        pub metric_name: String,
        #[serde(default)]
        pub metric_labels: BTreeMap<String, String>,
        pub timestamp: DateTime<Utc>,
        #[serde(default)]
        pub window_seconds: Option<i64>,
        pub value: Quantity,
    }

    impl From<MetricValue> for types::MetricValue {
        fn from(v: MetricValue) -> Self {
            types::MetricValue {
                described_object: types::ObjectReference {
                    kind: v.described_object.kind,
                    namespace: v.described_object.namespace,
                    name: v.described_object.name,
                    api_version: v.described_object.api_version,
                    resource_version: v.described_object.resource_version,
                },
                metric: types::MetricIdentifier {
                    name: v.metric.name,
                    selector: v.metric.selector,
                },
                timestamp: v.timestamp,
                window_seconds: v.window_seconds,
                value: v.value,
            }
        }
    }

    impl From<ExternalMetricValue> for types::ExternalMetricValue {
        fn from(v: ExternalMetricValue) -> Self {
            types::ExternalMetricValue {
                metric_name: v.metric_name,
                metric_labels: v.metric_labels,
                timestamp: v.timestamp,
                window_seconds: v.window_seconds,
                value: v.value,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_metric_value_converts_field_by_field() {
        let raw = serde_json::json!({
            "describedObject": {
                "kind": "Pod",
                "namespace": "default",
                "name": "web-0",
                "apiVersion": "v1"
            },
            "metric": { "name": "requests-per-second" },
            "timestamp": "2024-01-02T03:04:05Z",
            "windowSeconds": 60,
            "value": "250m"
        });
        let wire: wire::MetricValue = serde_json::from_value(raw).unwrap();
        let value: MetricValue = wire.into();
        assert_eq!(value.described_object.kind, "Pod");
        assert_eq!(value.metric.name, "requests-per-second");
        assert_eq!(value.window_seconds, Some(60));
        assert_eq!(value.value.to_string(), "250m");
    }
}
