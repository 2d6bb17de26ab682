//! Metric backend contract and adapters.
//!
//! A backend is one upstream metric source: an Elasticsearch cluster
//! queried with the search DSL, or another custom-metrics-compatible API
//! server whose answers are forwarded verbatim. All backends expose the
//! same interface so the scheduler, registry and aggregation façade never
//! care which kind they are talking to.

pub mod elasticsearch;
pub mod upstream;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MetricServer;
use crate::error::{HuginError, Result};
use crate::types::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValueList, MetricValue, MetricValueList,
    NamespacedName, Selector,
};

pub use elasticsearch::ElasticsearchBackend;
pub use upstream::UpstreamBackend;

impl std::fmt::Debug for dyn MetricBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricBackend").field("name", &self.name()).finish()
    }
}

/// The per-backend contract: discovery plus fetch, for both metric types.
///
/// Discovery methods re-enumerate what the backend can serve and are called
/// by the scheduler on every tick; fetch methods answer a single user query
/// and are called by the aggregation façade through the registry.
#[async_trait]
pub trait MetricBackend: Send + Sync {
    /// The configuration entry this backend was built from.
    fn configuration(&self) -> &MetricServer;

    fn name(&self) -> &str {
        &self.configuration().name
    }

    async fn list_custom_metrics(&self) -> Result<HashSet<CustomMetricInfo>>;

    async fn get_metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValue>;

    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        selector: &Selector,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValueList>;

    async fn list_external_metrics(&self) -> Result<HashSet<ExternalMetricInfo>>;

    async fn get_external_metric(
        &self,
        namespace: &str,
        name: &str,
        selector: &Selector,
    ) -> Result<ExternalMetricValueList>;
}

/// Resolves a label selector to the names of the matching objects.
///
/// Selector queries against the doc store need the concrete peer objects
/// (e.g. the other pods of a deployment) to fill query templates; listing
/// them is the platform's job, abstracted here so adapters stay testable.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    async fn list_object_names(
        &self,
        namespace: &str,
        selector: &Selector,
        info: &CustomMetricInfo,
    ) -> Result<Vec<String>>;
}

/// `ObjectLister` backed by the Kubernetes API over plain HTTP.
pub struct ApiObjectLister {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiObjectLister {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let base_url: String = base_url.into();
        Ok(Self {
            http: reqwest::Client::builder()
                .build()
                .map_err(|e| HuginError::Configuration(format!("failed to build HTTP client: {e}")))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build from the in-cluster service-account environment.
    pub fn in_cluster() -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| HuginError::Configuration("KUBERNETES_SERVICE_HOST is not set".into()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
        let token =
            std::fs::read_to_string("/var/run/secrets/kubernetes.io/serviceaccount/token").ok();
        Self::new(format!("https://{host}:{port}"), token.map(|t| t.trim().to_string()))
    }

    fn url_for(&self, namespace: &str, info: &CustomMetricInfo) -> String {
        let gr = &info.group_resource;
        let prefix = if gr.group.is_empty() {
            format!("{}/api/v1", self.base_url)
        } else {
            format!("{}/apis/{}/v1", self.base_url, gr.group)
        };
        if info.namespaced {
            format!("{prefix}/namespaces/{namespace}/{}", gr.resource)
        } else {
            format!("{prefix}/{}", gr.resource)
        }
    }
}

#[async_trait]
impl ObjectLister for ApiObjectLister {
    async fn list_object_names(
        &self,
        namespace: &str,
        selector: &Selector,
        info: &CustomMetricInfo,
    ) -> Result<Vec<String>> {
        #[derive(serde::Deserialize)]
        struct ObjectList {
            #[serde(default)]
            items: Vec<Item>,
        }
        #[derive(serde::Deserialize)]
        struct Item {
            metadata: Metadata,
        }
        #[derive(serde::Deserialize)]
        struct Metadata {
            name: String,
        }

        let mut request = self.http.get(self.url_for(namespace, info));
        if !selector.is_empty() {
            request = request.query(&[("labelSelector", selector.to_string())]);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HuginError::Upstream {
                status: status.as_u16(),
                kind: "object_list".into(),
                reason: format!("failed to list {}", info.group_resource),
            });
        }
        let list: ObjectList = response
            .json()
            .await
            .map_err(|e| HuginError::Http(format!("error parsing object list: {e}")))?;
        Ok(list.items.into_iter().map(|i| i.metadata.name).collect())
    }
}

/// Placeholder lister for deployments without platform API access.
pub struct NoObjectLister;

#[async_trait]
impl ObjectLister for NoObjectLister {
    async fn list_object_names(
        &self,
        _namespace: &str,
        _selector: &Selector,
        _info: &CustomMetricInfo,
    ) -> Result<Vec<String>> {
        Err(HuginError::Configuration(
            "selector queries require platform API access, none configured".into(),
        ))
    }
}

/// Convenience alias used throughout the scheduler and registry.
pub type SharedBackend = Arc<dyn MetricBackend>;
