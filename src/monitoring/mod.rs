//! Monitoring surface: readiness probe and instrumentation counters.
//!
//! The health server consumes the same discovery events as the registry.
//! Per backend and metric type it tracks how many discoveries succeeded in
//! total and how many failed consecutively; readiness requires every
//! configured backend/type pair to have synced at least once and to be
//! under the failure threshold.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::backends::SharedBackend;
use crate::config::{Config, MetricType, DEFAULT_FAILURE_THRESHOLD};
use crate::error::{HuginError, Result};
use crate::scheduler::{ErrorListener, MetricListener};
use crate::telemetry;
use crate::types::{CustomMetricInfo, ExternalMetricInfo};

type Counters = BTreeMap<MetricType, BTreeMap<String, u64>>;

/// Counter state reported by `/readyz`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub consecutive_failures: Counters,
    pub success_total: Counters,
}

pub struct HealthServer {
    failure_threshold: u64,
    state: RwLock<HealthResponse>,
}

impl HealthServer {
    /// Initialise counters to zero for every configured backend and every
    /// metric type it supports.
    pub fn new(config: &Config) -> Self {
        let mut threshold = config.readiness_probe.failure_threshold as u64;
        if threshold == 0 {
            threshold = DEFAULT_FAILURE_THRESHOLD as u64;
        }
        let mut state = HealthResponse::default();
        for server in &config.metric_servers {
            for metric_type in server.metric_types.supported() {
                for counters in [&mut state.consecutive_failures, &mut state.success_total] {
                    counters
                        .entry(metric_type)
                        .or_default()
                        .insert(server.name.clone(), 0);
                }
            }
        }
        Self {
            failure_threshold: threshold,
            state: RwLock::new(state),
        }
    }

    /// Readiness decision plus the counter snapshot backing it.
    pub fn check(&self) -> (bool, HealthResponse) {
        let state = self.state.read().expect("health lock poisoned");
        let mut ready = !state.success_total.is_empty();
        'outer: for (metric_type, backends) in &state.success_total {
            for (backend, success) in backends {
                if *success == 0 {
                    error!(%backend, r#type = %metric_type, "backend has not retrieved an initial set of metrics yet");
                    ready = false;
                    break 'outer;
                }
                let failures = state
                    .consecutive_failures
                    .get(metric_type)
                    .and_then(|c| c.get(backend))
                    .copied()
                    .unwrap_or(0);
                if failures >= self.failure_threshold {
                    error!(%backend, r#type = %metric_type, failures, "backend reached the consecutive failure threshold");
                    ready = false;
                    break 'outer;
                }
            }
        }
        (ready, state.clone())
    }

    pub fn ready(&self) -> bool {
        self.check().0
    }

    fn record_success(&self, backend: &SharedBackend, metric_type: MetricType, count: usize) {
        let name = backend.name().to_string();
        {
            let mut state = self.state.write().expect("health lock poisoned");
            state
                .consecutive_failures
                .entry(metric_type)
                .or_default()
                .insert(name.clone(), 0);
            *state
                .success_total
                .entry(metric_type)
                .or_default()
                .entry(name.clone())
                .or_default() += 1;
        }
        metrics::counter!(telemetry::CLIENT_SUCCESS_TOTAL,
            "client" => name.clone(),
            "type" => metric_type.as_str(),
        )
        .increment(1);
        metrics::gauge!(telemetry::METRICS_COUNT,
            "client" => name,
            "type" => metric_type.as_str(),
        )
        .set(count as f64);
    }
}

impl MetricListener for HealthServer {
    fn update_custom_metrics(
        &self,
        backend: &SharedBackend,
        metrics: &std::collections::HashSet<CustomMetricInfo>,
    ) {
        self.record_success(backend, MetricType::Custom, metrics.len());
    }

    fn update_external_metrics(
        &self,
        backend: &SharedBackend,
        metrics: &std::collections::HashSet<ExternalMetricInfo>,
    ) {
        self.record_success(backend, MetricType::External, metrics.len());
    }
}

impl ErrorListener for HealthServer {
    fn on_error(&self, backend: &SharedBackend, metric_type: MetricType, _error: &HuginError) {
        let name = backend.name().to_string();
        {
            let mut state = self.state.write().expect("health lock poisoned");
            *state
                .consecutive_failures
                .entry(metric_type)
                .or_default()
                .entry(name.clone())
                .or_default() += 1;
        }
        metrics::counter!(telemetry::CLIENT_ERRORS_TOTAL,
            "client" => name,
            "type" => metric_type.as_str(),
        )
        .increment(1);
    }
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthServer>,
    prometheus: Option<PrometheusHandle>,
}

/// Build the monitoring router: `/readyz` always, `/metrics` when a
/// prometheus handle is supplied.
pub fn router(health: Arc<HealthServer>, prometheus: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new().route("/readyz", get(readyz));
    if prometheus.is_some() {
        router = router.route("/metrics", get(render_metrics));
    }
    router
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { health, prometheus })
}

/// Serve the monitoring endpoints until the process exits.
pub async fn serve(
    health: Arc<HealthServer>,
    prometheus: Option<PrometheusHandle>,
    port: u16,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| HuginError::Configuration(format!("failed to bind monitoring port {addr}: {e}")))?;
    info!(%addr, "monitoring server listening");
    axum::serve(listener, router(health, prometheus))
        .await
        .map_err(|e| HuginError::Http(format!("monitoring server error: {e}")))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (ready, body) = state.health.check();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
