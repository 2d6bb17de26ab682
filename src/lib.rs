//! Hugin - federating metrics adapter for horizontal autoscaling
//!
//! This crate implements the platform's custom-metrics and external-metrics
//! API contracts on top of several heterogeneous metric backends - an
//! Elasticsearch cluster queried with the search DSL, or other
//! API-compatible metrics servers - federated into a single metric
//! namespace.
//!
//! Per backend, a [`scheduler::DiscoveryJob`] periodically re-discovers the
//! served metrics and fans the sets out to listeners: the
//! [`registry::Registry`] (which keeps the metric -> ranked backends
//! catalog) and the [`monitoring::HealthServer`] (which derives readiness
//! from discovery successes and failures). User queries enter through the
//! [`provider::AggregationProvider`], which routes each one to the
//! highest-priority backend serving that metric.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hugin::backends::{ElasticsearchBackend, NoObjectLister, SharedBackend};
//! use hugin::config::Config;
//! use hugin::provider::{AggregationProvider, MetricsProvider};
//! use hugin::registry::Registry;
//! use hugin::scheduler::{MetricListener, Scheduler};
//!
//! #[tokio::main]
//! async fn main() -> hugin::Result<()> {
//!     let config = Config::load(std::path::Path::new("/etc/hugin/hugin.yaml"))?;
//!
//!     let registry = Arc::new(Registry::new());
//!     let mut scheduler = Scheduler::new();
//!     for server in &config.metric_servers {
//!         let backend: SharedBackend = Arc::new(ElasticsearchBackend::new(
//!             server.clone(),
//!             Arc::new(NoObjectLister),
//!         )?);
//!         scheduler.add_backend(backend);
//!     }
//!     scheduler.with_metric_listeners(vec![registry.clone() as Arc<dyn MetricListener>]);
//!     scheduler.start();
//!     scheduler.await_initial_sync().await;
//!
//!     let provider = AggregationProvider::new(registry);
//!     println!("{} metrics", provider.list_all_custom_metrics().len());
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use error::{HuginError, Result};
pub use provider::{AggregationProvider, MetricsProvider};
pub use registry::Registry;
pub use scheduler::Scheduler;

// Re-export version info
pub use version::{version_string, PKG_VERSION};

// Re-export core identities and value shapes
pub use types::{
    CustomMetricInfo, ExternalMetricInfo, ExternalMetricValue, ExternalMetricValueList,
    GroupResource, LabelSelector, MetricValue, MetricValueList, NamespacedName, Quantity, Selector,
};
