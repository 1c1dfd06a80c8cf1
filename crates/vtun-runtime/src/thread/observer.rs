//! Lifecycle observability sink
//!
//! Workers and pools report what happens to them through an injected
//! [`LifecycleObserver`] instead of writing to a global stream. The default
//! [`TracingObserver`] forwards events to `tracing`.

use super::pool::MonitorReport;

/// Something that happened to a worker or pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Thread spawned after a successful setup
    WorkerStarted { worker: usize },
    /// Running on its own thread
    ThreadRunning { worker: usize, thread_id: u64 },
    /// Task loop returned an error, panicked, or exited on its own
    WorkerFailed { worker: usize, reason: String },
    /// Thread body finished
    ThreadExited { worker: usize, thread_id: u64 },
    /// `start` refused (already running, setup or spawn failure)
    StartRejected { worker: usize, reason: String },
    /// `stop` completed (cleanup ran)
    WorkerStopped { worker: usize },
    PoolStarted { workers: usize },
    PoolStopped { workers: usize },
    /// Pool lifecycle call made in the wrong state
    PoolMisuse { reason: &'static str },
    /// Result of one `monitor_pool` pass
    Monitor(MonitorReport),
}

/// Injected sink for lifecycle events
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

/// Forwards lifecycle events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::WorkerStarted { worker } => {
                tracing::debug!(worker, "worker started");
            }
            LifecycleEvent::ThreadRunning { worker, thread_id } => {
                tracing::info!(worker, thread_id, "thread start");
            }
            LifecycleEvent::WorkerFailed { worker, reason } => {
                tracing::error!(worker, %reason, "worker terminated");
            }
            LifecycleEvent::ThreadExited { worker, thread_id } => {
                tracing::info!(worker, thread_id, "thread stop");
            }
            LifecycleEvent::StartRejected { worker, reason } => {
                tracing::error!(worker, %reason, "worker start rejected");
            }
            LifecycleEvent::WorkerStopped { worker } => {
                tracing::debug!(worker, "worker stopped");
            }
            LifecycleEvent::PoolStarted { workers } => {
                tracing::info!(workers, "worker pool started");
            }
            LifecycleEvent::PoolStopped { workers } => {
                tracing::info!(workers, "worker pool stopped");
            }
            LifecycleEvent::PoolMisuse { reason } => {
                tracing::error!(%reason, "worker pool misuse");
            }
            LifecycleEvent::Monitor(report) => {
                if report.dead == 0 {
                    tracing::debug!(live = report.live(), "worker pool healthy");
                } else {
                    tracing::warn!(
                        live = report.live(),
                        dead = report.dead,
                        recovered = report.recovered,
                        failed = report.failed,
                        "worker pool recovery"
                    );
                }
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {
    fn on_event(&self, _event: &LifecycleEvent) {}
}

/// Keeps every event, for assertions
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: parking_lot::Mutex<Vec<LifecycleEvent>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

#[cfg(test)]
impl LifecycleObserver for RecordingObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}
