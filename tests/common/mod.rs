//! Shared test fixtures: a programmable in-memory metric backend.

// Not every test crate uses every fixture.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hugin::backends::{MetricBackend, SharedBackend};
use hugin::config::{MetricServer, MetricType, MetricTypes, ServerType};
use hugin::types::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValue, ExternalMetricValueList,
    GroupResource, MetricValue, MetricValueList, NamespacedName, ObjectReference, Quantity,
    Selector,
};
use hugin::{HuginError, Result};

pub fn custom_info(metric: &str) -> CustomMetricInfo {
    CustomMetricInfo {
        group_resource: GroupResource::new("", "pods"),
        namespaced: true,
        metric: metric.to_string(),
    }
}

pub fn external_info(metric: &str) -> ExternalMetricInfo {
    ExternalMetricInfo {
        metric: metric.to_string(),
    }
}

pub fn custom_set(metrics: &[&str]) -> HashSet<CustomMetricInfo> {
    metrics.iter().map(|m| custom_info(m)).collect()
}

pub fn external_set(metrics: &[&str]) -> HashSet<ExternalMetricInfo> {
    metrics.iter().map(|m| external_info(m)).collect()
}

fn test_timestamp() -> DateTime<Utc> {
    "2024-01-02T03:04:05Z".parse().unwrap()
}

/// In-memory backend whose discovery answers are set by the test.
pub struct FakeBackend {
    cfg: MetricServer,
    custom: Mutex<std::result::Result<HashSet<CustomMetricInfo>, String>>,
    external: Mutex<std::result::Result<HashSet<ExternalMetricInfo>, String>>,
}

impl FakeBackend {
    pub fn new(name: &str, priority: i32) -> Self {
        Self::with_metric_types(name, priority, MetricTypes::default())
    }

    pub fn with_metric_types(name: &str, priority: i32, metric_types: MetricTypes) -> Self {
        Self {
            cfg: MetricServer {
                name: name.to_string(),
                server_type: ServerType::Custom,
                priority,
                metric_types,
                client_config: None,
                metric_sets: Vec::new(),
                rename: None,
            },
            custom: Mutex::new(Ok(HashSet::new())),
            external: Mutex::new(Ok(HashSet::new())),
        }
    }

    pub fn only(name: &str, priority: i32, metric_type: MetricType) -> Self {
        Self::with_metric_types(name, priority, MetricTypes(vec![metric_type]))
    }

    pub fn shared(self) -> Arc<FakeBackend> {
        Arc::new(self)
    }

    pub fn serve_custom(&self, metrics: &[&str]) {
        *self.custom.lock().unwrap() = Ok(custom_set(metrics));
    }

    pub fn fail_custom(&self, message: &str) {
        *self.custom.lock().unwrap() = Err(message.to_string());
    }

    pub fn serve_external(&self, metrics: &[&str]) {
        *self.external.lock().unwrap() = Ok(external_set(metrics));
    }

    pub fn fail_external(&self, message: &str) {
        *self.external.lock().unwrap() = Err(message.to_string());
    }
}

pub fn as_backend(backend: &Arc<FakeBackend>) -> SharedBackend {
    backend.clone()
}

#[async_trait]
impl MetricBackend for FakeBackend {
    fn configuration(&self) -> &MetricServer {
        &self.cfg
    }

    async fn list_custom_metrics(&self) -> Result<HashSet<CustomMetricInfo>> {
        self.custom
            .lock()
            .unwrap()
            .clone()
            .map_err(HuginError::Http)
    }

    async fn get_metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValue> {
        let served = self.custom.lock().unwrap().clone().map_err(HuginError::Http)?;
        if !served.contains(info) {
            return Err(HuginError::MetricNotFound(format!(
                "custom metric {} not found",
                info.metric
            )));
        }
        Ok(MetricValue {
            described_object: ObjectReference {
                kind: "Pod".into(),
                namespace: name.namespace.clone(),
                name: name.name.clone(),
                api_version: "v1".into(),
                resource_version: String::new(),
            },
            metric: hugin::types::MetricIdentifier {
                name: info.metric.clone(),
                selector: metric_selector.to_label_selector(),
            },
            timestamp: test_timestamp(),
            window_seconds: None,
            value: Quantity::from_value(1.0),
        })
    }

    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        _selector: &Selector,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValueList> {
        let item = self
            .get_metric_by_name(
                &NamespacedName::new(namespace, "fake-0"),
                info,
                metric_selector,
            )
            .await?;
        Ok(MetricValueList { items: vec![item] })
    }

    async fn list_external_metrics(&self) -> Result<HashSet<ExternalMetricInfo>> {
        self.external
            .lock()
            .unwrap()
            .clone()
            .map_err(HuginError::Http)
    }

    async fn get_external_metric(
        &self,
        _namespace: &str,
        name: &str,
        _selector: &Selector,
    ) -> Result<ExternalMetricValueList> {
        let served = self
            .external
            .lock()
            .unwrap()
            .clone()
            .map_err(HuginError::Http)?;
        if !served.contains(&external_info(name)) {
            return Err(HuginError::MetricNotFound(format!(
                "external metric {name} not found"
            )));
        }
        Ok(ExternalMetricValueList {
            items: vec![ExternalMetricValue {
                metric_name: name.to_string(),
                metric_labels: Default::default(),
                timestamp: test_timestamp(),
                window_seconds: None,
                value: Quantity::from_value(1.0),
            }],
        })
    }
}
