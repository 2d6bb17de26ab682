//! Discovery scheduling.
//!
//! The scheduler owns one [`DiscoveryJob`] per backend and the shared
//! initial-sync barrier. It never talks to backends itself; it wires jobs
//! to listeners and launches them. `await_initial_sync` is the readiness
//! gate: it opens once every job has completed at least one successful
//! discovery.

mod job;
mod listeners;

pub use job::DiscoveryJob;
pub use listeners::{ErrorListener, MetricListener};

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::info;

use crate::backends::SharedBackend;

/// Countdown latch: opens when every registered party has counted down.
#[derive(Clone)]
pub(crate) struct SyncBarrier {
    inner: Arc<BarrierState>,
}

struct BarrierState {
    remaining: Mutex<usize>,
    released: Notify,
}

impl SyncBarrier {
    fn new() -> Self {
        Self {
            inner: Arc::new(BarrierState {
                remaining: Mutex::new(0),
                released: Notify::new(),
            }),
        }
    }

    fn add(&self, n: usize) {
        *self.inner.remaining.lock().expect("barrier lock poisoned") += n;
    }

    pub(crate) fn count_down(&self) {
        let mut remaining = self.inner.remaining.lock().expect("barrier lock poisoned");
        if *remaining > 0 {
            *remaining -= 1;
        }
        if *remaining == 0 {
            self.inner.released.notify_waiters();
        }
    }

    async fn wait(&self) {
        loop {
            let released = self.inner.released.notified();
            if *self.inner.remaining.lock().expect("barrier lock poisoned") == 0 {
                return;
            }
            released.await;
        }
    }
}

/// Owns the discovery jobs and orchestrates their lifecycle.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<DiscoveryJob>,
    barrier: Option<SyncBarrier>,
    metric_listeners: Vec<Arc<dyn MetricListener>>,
    error_listeners: Vec<Arc<dyn ErrorListener>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            barrier: None,
            metric_listeners: Vec::new(),
            error_listeners: Vec::new(),
        }
    }

    fn barrier(&mut self) -> SyncBarrier {
        self.barrier.get_or_insert_with(SyncBarrier::new).clone()
    }

    /// Add a backend: creates its job, extends the barrier by one, and
    /// attaches the listeners registered so far.
    pub fn add_backend(&mut self, backend: SharedBackend) -> &mut Self {
        let barrier = self.barrier();
        barrier.add(1);
        let job = DiscoveryJob::new(backend, barrier);
        for listener in &self.metric_listeners {
            job.add_metric_listener(listener.clone());
        }
        for listener in &self.error_listeners {
            job.add_error_listener(listener.clone());
        }
        self.jobs.push(job);
        self
    }

    /// Attach metric listeners to every job, present and future.
    pub fn with_metric_listeners(
        &mut self,
        listeners: Vec<Arc<dyn MetricListener>>,
    ) -> &mut Self {
        for listener in listeners {
            for job in &self.jobs {
                job.add_metric_listener(listener.clone());
            }
            self.metric_listeners.push(listener);
        }
        self
    }

    /// Attach error listeners to every job, present and future.
    pub fn with_error_listeners(&mut self, listeners: Vec<Arc<dyn ErrorListener>>) -> &mut Self {
        for listener in listeners {
            for job in &self.jobs {
                job.add_error_listener(listener.clone());
            }
            self.error_listeners.push(listener);
        }
        self
    }

    pub fn jobs(&self) -> &[DiscoveryJob] {
        &self.jobs
    }

    /// Launch every job's ticker loop.
    pub fn start(&self) -> &Self {
        for job in &self.jobs {
            job.start();
        }
        self
    }

    /// Block until every job has synced successfully at least once.
    pub async fn await_initial_sync(&self) {
        info!(
            jobs = self.jobs.len(),
            "waiting for an initial metric list from every backend"
        );
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        info!(jobs = self.jobs.len(), "initial metric list received from every backend");
    }
}
