//! Listener contracts for discovery events.

use std::collections::HashSet;

use crate::backends::SharedBackend;
use crate::config::MetricType;
use crate::error::HuginError;
use crate::types::{CustomMetricInfo, ExternalMetricInfo};

/// Receives the full metric set of a backend after each successful
/// discovery. Implementations must be fast and non-blocking; they are
/// invoked inline from every discovery job.
pub trait MetricListener: Send + Sync {
    fn update_custom_metrics(&self, backend: &SharedBackend, metrics: &HashSet<CustomMetricInfo>);

    fn update_external_metrics(
        &self,
        backend: &SharedBackend,
        metrics: &HashSet<ExternalMetricInfo>,
    );
}

/// Receives discovery failures, tagged with the metric type that failed.
pub trait ErrorListener: Send + Sync {
    fn on_error(&self, backend: &SharedBackend, metric_type: MetricType, error: &HuginError);
}
