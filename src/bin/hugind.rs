//! hugind: the federating metrics adapter daemon.
//!
//! Wires the configured backends into the discovery scheduler, the metric
//! registry and the health server, then serves the monitoring endpoints.
//! The platform's metrics API server consumes the resulting
//! [`AggregationProvider`](hugin::AggregationProvider).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hugin::backends::{
    ApiObjectLister, ElasticsearchBackend, NoObjectLister, ObjectLister, SharedBackend,
    UpstreamBackend,
};
use hugin::config::{Config, ServerType};
use hugin::monitoring::{self, HealthServer};
use hugin::provider::MetricsProvider;
use hugin::scheduler::{ErrorListener, MetricListener, Scheduler};
use hugin::{AggregationProvider, Registry};

/// Federating custom/external metrics adapter daemon.
#[derive(Parser)]
#[command(name = "hugind")]
#[command(version = hugin::PKG_VERSION)]
#[command(about = "Federating metrics adapter for horizontal autoscaling")]
struct Args {
    /// Path to the adapter configuration file.
    #[arg(short, long, default_value = "/etc/hugin/hugin.yaml")]
    config: PathBuf,

    /// Port to expose readiness and Prometheus metrics.
    #[arg(long, default_value_t = 9090)]
    monitoring_port: u16,

    /// Enable the Prometheus metrics endpoint /metrics on the monitoring port.
    #[arg(long)]
    enable_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if hugin::telemetry::tracing_enabled() {
        info!("request tracing enabled via ELASTIC_APM_SERVER_URL");
    }

    // Configuration problems are the only fatal error class.
    let config = Config::load(&args.config)?;
    info!(version = hugin::version_string(), config = %args.config.display(), "hugind starting");

    let prometheus = if args.enable_metrics {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let object_lister: Arc<dyn ObjectLister> = match ApiObjectLister::in_cluster() {
        Ok(lister) => Arc::new(lister),
        Err(err) => {
            warn!(error = %err, "platform API unavailable, selector queries will fail");
            Arc::new(NoObjectLister)
        }
    };

    let registry = Arc::new(Registry::new());
    let health = Arc::new(HealthServer::new(&config));

    let mut scheduler = Scheduler::new();
    for server in &config.metric_servers {
        let backend: SharedBackend = match server.server_type {
            ServerType::Elasticsearch => Arc::new(ElasticsearchBackend::new(
                server.clone(),
                object_lister.clone(),
            )?),
            ServerType::Custom => Arc::new(UpstreamBackend::new(server.clone())?),
        };
        info!(backend = %server.name, priority = server.priority, "backend configured");
        scheduler.add_backend(backend);
    }
    scheduler.with_metric_listeners(vec![
        registry.clone() as Arc<dyn MetricListener>,
        health.clone() as Arc<dyn MetricListener>,
    ]);
    scheduler.with_error_listeners(vec![health.clone() as Arc<dyn ErrorListener>]);
    scheduler.start();

    let monitoring = tokio::spawn(monitoring::serve(
        health.clone(),
        prometheus,
        args.monitoring_port,
    ));

    scheduler.await_initial_sync().await;

    let provider = AggregationProvider::new(registry);
    info!(
        custom_metrics = provider.list_all_custom_metrics().len(),
        external_metrics = provider.list_all_external_metrics().len(),
        "initial sync complete, adapter ready"
    );

    tokio::select! {
        result = monitoring => result??,
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }
    Ok(())
}
