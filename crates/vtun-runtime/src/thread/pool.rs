//! Fixed-size worker pool with restart-on-failure monitoring

use super::observer::{LifecycleEvent, LifecycleObserver};
use super::worker::{Worker, WorkerTask};
use std::sync::Arc;
use vtun_core::error::PoolError;

/// Outcome of one [`WorkerPool::monitor_pool`] pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorReport {
    /// Workers in the pool
    pub total: usize,
    /// Workers found terminated
    pub dead: usize,
    /// Dead workers restarted successfully
    pub recovered: usize,
    /// Dead workers whose restart failed
    pub failed: usize,
}

impl MonitorReport {
    /// Workers running after the pass
    ///
    /// Zero when a restart failed: the pass then stops the whole pool.
    #[inline]
    pub fn live(&self) -> usize {
        if self.failed > 0 {
            0
        } else {
            self.total
        }
    }
}

/// N workers started and stopped as a unit
pub struct WorkerPool<T: WorkerTask> {
    workers: Vec<Worker<T>>,
    started: bool,
    observer: Arc<dyn LifecycleObserver>,
}

impl<T: WorkerTask> WorkerPool<T> {
    /// One worker per task, indexed in iteration order
    pub fn new<I>(tasks: I, observer: Arc<dyn LifecycleObserver>) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let workers = tasks
            .into_iter()
            .enumerate()
            .map(|(id, task)| Worker::new(id, task, Arc::clone(&observer)))
            .collect();
        Self {
            workers,
            started: false,
            observer,
        }
    }

    /// Start every worker, or none
    ///
    /// On the first failure the workers already started are stopped again
    /// and the pool stays in the not-started state.
    pub fn start_pool(&mut self) -> Result<(), PoolError> {
        if self.started {
            self.misuse("start_pool on a started pool");
            return Err(PoolError::AlreadyStarted);
        }

        for index in 0..self.workers.len() {
            if let Err(source) = self.workers[index].start() {
                for worker in self.workers[..index].iter_mut().rev() {
                    worker.stop();
                }
                return Err(PoolError::StartFailed { index, source });
            }
        }

        self.started = true;
        self.observer.on_event(&LifecycleEvent::PoolStarted {
            workers: self.workers.len(),
        });
        Ok(())
    }

    /// Stop every worker; no-op when not started
    pub fn stop_pool(&mut self) {
        if !self.started {
            return;
        }
        for worker in self.workers.iter_mut() {
            worker.stop();
        }
        self.started = false;
        self.observer.on_event(&LifecycleEvent::PoolStopped {
            workers: self.workers.len(),
        });
    }

    /// Restart every terminated worker
    ///
    /// Intended to be called periodically. If any restart fails the whole
    /// pool is stopped and `RecoveryFailed` is returned.
    pub fn monitor_pool(&mut self) -> Result<MonitorReport, PoolError> {
        if !self.started {
            self.misuse("monitor_pool on a stopped pool");
            return Err(PoolError::NotStarted);
        }

        let mut report = MonitorReport {
            total: self.workers.len(),
            ..MonitorReport::default()
        };

        for worker in self.workers.iter_mut() {
            if !worker.is_terminated() {
                continue;
            }
            report.dead += 1;
            worker.stop();
            match worker.start() {
                Ok(()) => report.recovered += 1,
                Err(_) => report.failed += 1,
            }
        }

        self.observer.on_event(&LifecycleEvent::Monitor(report));

        if report.failed > 0 {
            self.stop_pool();
            return Err(PoolError::RecoveryFailed {
                dead: report.dead,
                failed: report.failed,
            });
        }
        Ok(report)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn worker(&self, index: usize) -> Option<&Worker<T>> {
        self.workers.get(index)
    }

    pub fn workers(&self) -> impl Iterator<Item = &Worker<T>> {
        self.workers.iter()
    }

    fn misuse(&self, reason: &'static str) {
        self.observer.on_event(&LifecycleEvent::PoolMisuse { reason });
    }
}

impl<T: WorkerTask> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.stop_pool();
    }
}

impl<T: WorkerTask> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("started", &self.started)
            .finish()
    }
}
