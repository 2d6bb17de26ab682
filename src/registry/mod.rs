//! Metric catalog.
//!
//! The registry caches which backend serves which metric, so user queries
//! never trigger upstream round-trips to figure out routing. Discovery
//! jobs push full per-backend metric sets; the registry diffs them against
//! what the backend previously served and keeps, per metric, a ranked list
//! of capable backends.
//!
//! # Concurrency
//!
//! One reader-writer lock guards the whole catalog. Discovery updates take
//! the write lock and are atomic per backend and metric type: a reader
//! either sees the backend's previous set fully, or its new set fully,
//! never a partial diff. The lock is only ever held for in-memory work.

mod backends;

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use self::backends::RankedBackends;
use crate::backends::SharedBackend;
use crate::error::{HuginError, Result};
use crate::scheduler::MetricListener;
use crate::types::{CustomMetricInfo, ExternalMetricInfo};

#[derive(Default)]
struct Catalog {
    custom: HashMap<CustomMetricInfo, RankedBackends>,
    external: HashMap<ExternalMetricInfo, RankedBackends>,
}

/// Concurrent catalog mapping metric identity to ranked backends.
#[derive(Default)]
pub struct Registry {
    catalog: RwLock<Catalog>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of custom metrics served by one backend.
    ///
    /// Metrics the backend no longer reports are removed from their entries
    /// (entries whose backend list empties are deleted); reported metrics
    /// are added or re-ranked.
    pub fn update_custom_metrics(
        &self,
        backend: &SharedBackend,
        metrics: &HashSet<CustomMetricInfo>,
    ) {
        let mut catalog = self.catalog.write().expect("catalog lock poisoned");
        let backend_name = backend.name().to_string();

        let previous: Vec<CustomMetricInfo> = catalog
            .custom
            .iter()
            .filter(|(info, list)| list.contains(&backend_name) && !metrics.contains(info))
            .map(|(info, _)| info.clone())
            .collect();
        for removed in previous {
            if let Some(list) = catalog.custom.get_mut(&removed) {
                if list.remove(&backend_name) {
                    catalog.custom.remove(&removed);
                }
            }
        }

        for info in metrics {
            catalog
                .custom
                .entry(info.clone())
                .or_insert_with(RankedBackends::new)
                .add_or_update(backend);
        }
        debug!(backend = %backend_name, count = metrics.len(), "custom metric catalog updated");
    }

    /// Replace the set of external metrics served by one backend.
    pub fn update_external_metrics(
        &self,
        backend: &SharedBackend,
        metrics: &HashSet<ExternalMetricInfo>,
    ) {
        let mut catalog = self.catalog.write().expect("catalog lock poisoned");
        let backend_name = backend.name().to_string();

        let previous: Vec<ExternalMetricInfo> = catalog
            .external
            .iter()
            .filter(|(info, list)| list.contains(&backend_name) && !metrics.contains(info))
            .map(|(info, _)| info.clone())
            .collect();
        for removed in previous {
            if let Some(list) = catalog.external.get_mut(&removed) {
                if list.remove(&backend_name) {
                    catalog.external.remove(&removed);
                }
            }
        }

        for info in metrics {
            catalog
                .external
                .entry(info.clone())
                .or_insert_with(RankedBackends::new)
                .add_or_update(backend);
        }
        debug!(backend = %backend_name, count = metrics.len(), "external metric catalog updated");
    }

    /// Best backend currently serving a custom metric.
    pub fn get_custom_metric_backend(&self, info: &CustomMetricInfo) -> Result<SharedBackend> {
        let catalog = self.catalog.read().expect("catalog lock poisoned");
        let backend = catalog
            .custom
            .get(info)
            .and_then(RankedBackends::best)
            .ok_or_else(|| {
                HuginError::MetricNotFound(format!(
                    "custom metric {} is not served by any metric backend",
                    info.metric
                ))
            })?;
        debug!(metric = %info, backend = %backend.name(), "custom metric routed");
        Ok(backend.clone())
    }

    /// Best backend currently serving an external metric.
    pub fn get_external_metric_backend(&self, info: &ExternalMetricInfo) -> Result<SharedBackend> {
        let catalog = self.catalog.read().expect("catalog lock poisoned");
        let backend = catalog
            .external
            .get(info)
            .and_then(RankedBackends::best)
            .ok_or_else(|| {
                HuginError::MetricNotFound(format!(
                    "external metric {} is not served by any metric backend",
                    info.metric
                ))
            })?;
        debug!(metric = %info, backend = %backend.name(), "external metric routed");
        Ok(backend.clone())
    }

    pub fn list_all_custom_metrics(&self) -> Vec<CustomMetricInfo> {
        let catalog = self.catalog.read().expect("catalog lock poisoned");
        catalog.custom.keys().cloned().collect()
    }

    pub fn list_all_external_metrics(&self) -> Vec<ExternalMetricInfo> {
        let catalog = self.catalog.read().expect("catalog lock poisoned");
        catalog.external.keys().cloned().collect()
    }
}

impl MetricListener for Registry {
    fn update_custom_metrics(&self, backend: &SharedBackend, metrics: &HashSet<CustomMetricInfo>) {
        Registry::update_custom_metrics(self, backend, metrics);
    }

    fn update_external_metrics(
        &self,
        backend: &SharedBackend,
        metrics: &HashSet<ExternalMetricInfo>,
    ) {
        Registry::update_external_metrics(self, backend, metrics);
    }
}
