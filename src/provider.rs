//! Aggregation façade.
//!
//! [`AggregationProvider`] implements the platform-facing
//! [`MetricsProvider`] contract by looking up the best backend for each
//! query in the registry and forwarding the call. It holds no state of
//! its own.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::error::Result;
use crate::registry::Registry;
use crate::types::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValueList, MetricValue, MetricValueList,
    NamespacedName, Selector,
};

/// The contract the platform's metrics API server calls into.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
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

    async fn get_external_metric(
        &self,
        namespace: &str,
        info: &ExternalMetricInfo,
        metric_selector: &Selector,
    ) -> Result<ExternalMetricValueList>;

    fn list_all_custom_metrics(&self) -> Vec<CustomMetricInfo>;

    fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo>;
}

/// Routes each query to the registry-selected backend.
pub struct AggregationProvider {
    registry: Arc<Registry>,
}

impl AggregationProvider {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MetricsProvider for AggregationProvider {
    #[instrument(skip(self, metric_selector), fields(metric = %info, object = %name))]
    async fn get_metric_by_name(
        &self,
        name: &NamespacedName,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValue> {
        let backend = self.registry.get_custom_metric_backend(info)?;
        backend
            .get_metric_by_name(name, info, metric_selector)
            .await
            .map_err(|e| e.into_not_found())
    }

    #[instrument(skip(self, metric_selector), fields(metric = %info, %namespace, selector = %selector))]
    async fn get_metric_by_selector(
        &self,
        namespace: &str,
        selector: &Selector,
        info: &CustomMetricInfo,
        metric_selector: &Selector,
    ) -> Result<MetricValueList> {
        let backend = self.registry.get_custom_metric_backend(info)?;
        backend
            .get_metric_by_selector(namespace, selector, info, metric_selector)
            .await
            .map_err(|e| e.into_not_found())
    }

    #[instrument(skip(self, metric_selector), fields(metric = %info, %namespace))]
    async fn get_external_metric(
        &self,
        namespace: &str,
        info: &ExternalMetricInfo,
        metric_selector: &Selector,
    ) -> Result<ExternalMetricValueList> {
        let backend = self.registry.get_external_metric_backend(info)?;
        backend
            .get_external_metric(namespace, &info.metric, metric_selector)
            .await
            .map_err(|e| e.into_not_found())
    }

    fn list_all_custom_metrics(&self) -> Vec<CustomMetricInfo> {
        self.registry.list_all_custom_metrics()
    }

    fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo> {
        self.registry.list_all_external_metrics()
    }
}
