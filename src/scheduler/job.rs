//! Per-backend discovery job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::listeners::{ErrorListener, MetricListener};
use super::SyncBarrier;
use crate::backends::SharedBackend;
use crate::config::MetricType;
use crate::error::HuginError;

/// Interval between discovery refreshes.
pub(crate) const REFRESH_PERIOD: Duration = Duration::from_secs(60);

/// Bounded retry for the very first refresh, so a backend that is still
/// coming up does not have to wait a full period to be retried.
const STARTUP_SYNC_ATTEMPTS: u32 = 10;
const STARTUP_SYNC_DELAY: Duration = Duration::from_secs(5);

/// One long-lived poller for one backend.
///
/// Each tick re-runs discovery for every metric type the backend supports
/// and fans the result (or the typed failure) out to the listeners. The
/// first time any supported type succeeds, the job counts down the shared
/// initial-sync barrier, exactly once.
#[derive(Clone)]
pub struct DiscoveryJob {
    inner: Arc<JobInner>,
}

struct JobInner {
    backend: SharedBackend,
    barrier: SyncBarrier,
    listeners: RwLock<Vec<Arc<dyn MetricListener>>>,
    error_listeners: RwLock<Vec<Arc<dyn ErrorListener>>>,
    sync_done: AtomicBool,
}

impl DiscoveryJob {
    pub(crate) fn new(backend: SharedBackend, barrier: SyncBarrier) -> Self {
        Self {
            inner: Arc::new(JobInner {
                backend,
                barrier,
                listeners: RwLock::new(Vec::new()),
                error_listeners: RwLock::new(Vec::new()),
                sync_done: AtomicBool::new(false),
            }),
        }
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.inner.backend
    }

    pub(crate) fn add_metric_listener(&self, listener: Arc<dyn MetricListener>) {
        self.inner
            .listeners
            .write()
            .expect("listener lock poisoned")
            .push(listener);
    }

    pub(crate) fn add_error_listener(&self, listener: Arc<dyn ErrorListener>) {
        self.inner
            .error_listeners
            .write()
            .expect("listener lock poisoned")
            .push(listener);
    }

    /// Launch the ticker loop on the runtime.
    pub(crate) fn start(&self) {
        let job = self.clone();
        tokio::spawn(async move {
            job.run().await;
        });
    }

    async fn run(&self) {
        // Startup: retry quickly until the backend answers once.
        let mut attempt = 1;
        while !self.refresh().await && attempt < STARTUP_SYNC_ATTEMPTS {
            attempt += 1;
            debug!(
                backend = %self.inner.backend.name(),
                attempt,
                "initial metric discovery failed, retrying"
            );
            tokio::time::sleep(STARTUP_SYNC_DELAY).await;
        }

        let mut ticker = tokio::time::interval(REFRESH_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // completes immediately
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }

    /// Run one discovery pass; returns whether any supported type succeeded.
    pub(crate) async fn refresh(&self) -> bool {
        let backend = &self.inner.backend;
        let metric_types = backend.configuration().metric_types.clone();
        let mut synced = false;

        if metric_types.has_type(MetricType::Custom) {
            match backend.list_custom_metrics().await {
                Ok(metrics) => {
                    debug!(
                        backend = %backend.name(),
                        count = metrics.len(),
                        "custom metrics discovered"
                    );
                    for listener in self.metric_listeners() {
                        listener.update_custom_metrics(backend, &metrics);
                    }
                    synced = true;
                }
                Err(err) => {
                    error!(
                        backend = %backend.name(),
                        error = %err,
                        "failed to update custom metric list"
                    );
                    self.publish_error(MetricType::Custom, &err);
                }
            }
        }

        if metric_types.has_type(MetricType::External) {
            match backend.list_external_metrics().await {
                Ok(metrics) => {
                    debug!(
                        backend = %backend.name(),
                        count = metrics.len(),
                        "external metrics discovered"
                    );
                    for listener in self.metric_listeners() {
                        listener.update_external_metrics(backend, &metrics);
                    }
                    synced = true;
                }
                Err(err) => {
                    error!(
                        backend = %backend.name(),
                        error = %err,
                        "failed to update external metric list"
                    );
                    self.publish_error(MetricType::External, &err);
                }
            }
        }

        if synced && !self.inner.sync_done.swap(true, Ordering::SeqCst) {
            info!(backend = %backend.name(), "first metric sync successful");
            self.inner.barrier.count_down();
        }
        synced
    }

    fn metric_listeners(&self) -> Vec<Arc<dyn MetricListener>> {
        self.inner
            .listeners
            .read()
            .expect("listener lock poisoned")
            .clone()
    }

    fn publish_error(&self, metric_type: MetricType, error: &HuginError) {
        let listeners = self
            .inner
            .error_listeners
            .read()
            .expect("listener lock poisoned")
            .clone();
        for listener in listeners {
            listener.on_error(&self.inner.backend, metric_type, error);
        }
    }
}
