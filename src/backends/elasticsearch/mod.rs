//! Elasticsearch metric backend.
//!
//! Serves custom metrics from document fields: discovery walks the index
//! mappings to find numeric fields (plus any configured static fields with
//! their own search), queries fetch the latest sample for a pod either via
//! the configured search template or a default single-document query.
//!
//! The discovered catalog (metrics, query metadata, alias map) is rebuilt
//! from scratch on every discovery cycle and swapped in atomically; a query
//! that started against the previous catalog finishes against it.

mod discovery;
mod path;
mod query;
mod template;

pub use path::PathExpr;
pub use template::{BodyTemplate, SearchContext};

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use self::discovery::{Catalog, StaticField};
use crate::backends::{MetricBackend, ObjectLister};
use crate::config::{HttpClientConfig, MetricServer, Namer};
use crate::error::{HuginError, Result};
use crate::types::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValueList, MetricIdentifier, MetricValue,
    MetricValueList, NamespacedName, ObjectReference, Quantity, Selector,
};

pub struct ElasticsearchBackend {
    cfg: MetricServer,
    client_cfg: HttpClientConfig,
    http: reqwest::Client,
    base_url: String,
    object_lister: Arc<dyn ObjectLister>,
    static_fields: Vec<StaticField>,
    catalog: RwLock<Arc<Catalog>>,
}

impl ElasticsearchBackend {
    pub fn new(cfg: MetricServer, object_lister: Arc<dyn ObjectLister>) -> Result<Self> {
        let client_cfg = cfg.client_config()?.clone();
        let http = client_cfg.build_client()?;
        let base_url = client_cfg.expanded_host();
        let static_fields = discovery::compile_static_fields(&cfg)?;
        let namer = Namer::new(cfg.rename.as_ref())?;
        Ok(Self {
            cfg,
            client_cfg,
            http,
            base_url,
            object_lister,
            static_fields,
            catalog: RwLock::new(Arc::new(Catalog::new(namer))),
        })
    }

    fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().expect("catalog lock poisoned").clone()
    }

    /// Rebuild the catalog from configuration and live index mappings, then
    /// publish it.
    async fn discover(&self) -> Result<()> {
        let mut catalog = Catalog::new(Namer::new(self.cfg.rename.as_ref())?);
        for field in &self.static_fields {
            catalog.record_static_field(field);
        }

        for metric_set in &self.cfg.metric_sets {
            let mapping = self.get_mapping(&metric_set.indices).await?;
            let Some(indexes) = mapping.as_object() else {
                return Err(HuginError::MalformedResponse(format!(
                    "mapping response for {} is not an object",
                    metric_set.indices.join(",")
                )));
            };
            if indexes.is_empty() {
                debug!(indices = %metric_set.indices.join(","), "mapping is empty");
                continue;
            }
            for (index_name, index_mapping) in indexes {
                let mappings = index_mapping.get("mappings").ok_or_else(|| {
                    HuginError::MalformedResponse(format!(
                        "no mappings object for index {index_name}"
                    ))
                })?;
                catalog.process_mapping_document(mappings, &metric_set.fields, &metric_set.indices);
            }
        }

        *self.catalog.write().expect("catalog lock poisoned") = Arc::new(catalog);
        Ok(())
    }

    async fn get_mapping(&self, indices: &[String]) -> Result<Value> {
        let url = format!("{}/{}/_mapping", self.base_url, indices.join(","));
        let request = self.client_cfg.authenticate(self.http.get(&url));
        self.send(request).await
    }

    async fn search(&self, indices: &[String], body: String) -> Result<Value> {
        let url = format!("{}/{}/_search", self.base_url, indices.join(","));
        let request = self
            .http
            .post(&url)
            .query(&[("track_total_hits", "true")])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(self.client_cfg.authenticate(request)).await
    }

    /// Issue a request and decode the JSON body; non-2xx responses surface
    /// the document store's `error.type` / `error.reason`.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HuginError::Http(format!("error reading response body: {e}")))?;
        if !status.is_success() {
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Err(HuginError::Upstream {
                status: status.as_u16(),
                kind: body["error"]["type"].as_str().unwrap_or("unknown").to_string(),
                reason: body["error"]["reason"]
                    .as_str()
                    .unwrap_or(text.as_str())
                    .to_string(),
            });
        }
        serde_json::from_str(&text)
            .map_err(|e| HuginError::Http(format!("error parsing response body: {e}")))
    }

    /// Fetch just the sample for one object.
    async fn value_for(
        &self,
        info: &CustomMetricInfo,
        name: &NamespacedName,
        original_selector: &Selector,
        objects: &[String],
    ) -> Result<(Quantity, DateTime<Utc>)> {
        let snapshot = self.snapshot();
        let local = snapshot.namer.lookup(&info.metric).ok_or_else(|| {
            HuginError::AliasNotFound(format!(
                "alias for custom metric {} not found",
                info.metric
            ))
        })?;
        let metadata = snapshot.indexed_metrics.get(&local).ok_or_else(|| {
            HuginError::MetricNotFound(format!("no metadata for metric {local}"))
        })?;

        let body = match &metadata.search {
            Some(search) => search.body.render(&SearchContext {
                metric: &local,
                pod: &name.name,
                namespace: &name.namespace,
                pod_selectors: original_selector.first_values(),
                objects,
            }),
            None => query::default_query(&local, name),
        };

        let response = self.search(&metadata.indices, body).await?;

        let (value, timestamp) = match &metadata.search {
            Some(search) => (
                query::extract_value(search.metric_path.eval(&response)?)?,
                query::extract_timestamp(search.timestamp_path.eval(&response)?)?,
            ),
            None => (
                query::extract_value(query::hits_source_path(&local).eval(&response)?)?,
                query::extract_timestamp(query::hits_timestamp_path().eval(&response)?)?,
            ),
        };

        Ok((Quantity::from_value(value), timestamp))
    }

    fn metric_for(
        &self,
        info: &CustomMetricInfo,
        name: &NamespacedName,
        value: Quantity,
        timestamp: DateTime<Utc>,
        metric_selector: &Selector,
    ) -> MetricValue {
        MetricValue {
            described_object: reference_for(info, name),
            metric: MetricIdentifier {
                name: info.metric.clone(),
                selector: metric_selector.to_label_selector(),
            },
            timestamp,
            window_seconds: None,
            value,
        }
    }
}

#[async_trait]
impl MetricBackend for ElasticsearchBackend {
    fn configuration(&self) -> &MetricServer {
        &self.cfg
    }

    async fn list_custom_metrics(&self) -> Result<HashSet<CustomMetricInfo>> {
        self.discover().await?;
        let snapshot = self.snapshot();
        Ok(snapshot.metrics.values().cloned().collect())
    }

    async fn get_metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValue> {
        debug!(backend = %self.name(), metric = %info.metric, object = %name, "get_metric_by_name");
        let (value, timestamp) = self
            .value_for(info, name, &Selector::everything(), &[])
            .await?;
        Ok(self.metric_for(info, name, value, timestamp, metric_selector))
    }

    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        selector: &Selector,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValueList> {
        debug!(backend = %self.name(), metric = %info.metric, %namespace, selector = %selector, "get_metric_by_selector");
        let names = self
            .object_lister
            .list_object_names(namespace, selector, info)
            .await?;

        let mut items = Vec::with_capacity(names.len());
        for object_name in &names {
            let name = NamespacedName::new(namespace, object_name.clone());
            match self.value_for(info, &name, selector, &names).await {
                Ok((value, timestamp)) => {
                    items.push(self.metric_for(info, &name, value, timestamp, metric_selector));
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(MetricValueList { items })
    }

    async fn list_external_metrics(&self) -> Result<HashSet<ExternalMetricInfo>> {
        debug!(backend = %self.name(), "external metrics are not served by the elasticsearch backend");
        Ok(HashSet::new())
    }

    async fn get_external_metric(
        &self,
        _namespace: &str,
        name: &str,
        _selector: &Selector,
    ) -> Result<ExternalMetricValueList> {
        Err(HuginError::MetricNotFound(format!(
            "external metric {name} is not served by the elasticsearch backend"
        )))
    }
}

/// Best-effort object reference for a sample; the platform side holds the
/// authoritative resource mapping.
fn reference_for(info: &CustomMetricInfo, name: &NamespacedName) -> ObjectReference {
    let resource = &info.group_resource.resource;
    let singular = resource.strip_suffix('s').unwrap_or(resource);
    let mut kind = String::with_capacity(singular.len());
    let mut chars = singular.chars();
    if let Some(first) = chars.next() {
        kind.extend(first.to_uppercase());
        kind.push_str(chars.as_str());
    }
    ObjectReference {
        kind,
        namespace: name.namespace.clone(),
        name: name.name.clone(),
        api_version: if info.group_resource.group.is_empty() {
            "v1".to_string()
        } else {
            String::new()
        },
        resource_version: String::new(),
    }
}
