//! Single worker thread lifecycle
//!
//! `start`:
//! 1. Refuse if a thread is still attached (join it with `stop` first)
//! 2. Run the task's `setup` hook
//! 3. Spawn the thread with a fresh termination token
//!
//! If setup or spawn fails, `cleanup` runs and `start` reports the error.
//!
//! `stop` is idempotent: cancel the token, interrupt the task until its
//! thread has exited, join it, and run `cleanup` every time.

use super::current_thread_id;
use super::observer::{LifecycleEvent, LifecycleObserver};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use vtun_core::error::{TaskError, WorkerError, WorkerResult};
use vtun_core::CancellationToken;

/// Pause between `interrupt` calls while `stop` waits for the thread
const INTERRUPT_INTERVAL: Duration = Duration::from_millis(1);

/// Unit of work driven by a [`Worker`]
///
/// The task object outlives individual threads: a restarted worker runs
/// `setup` and `run` again on the same task.
pub trait WorkerTask: Send + Sync + 'static {
    /// Called on the starting thread before spawning
    fn setup(&self) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called after the thread is joined, and after a failed start
    ///
    /// Runs on every `stop`, so it must tolerate repeated calls.
    fn cleanup(&self) {}

    /// Unblock a `run` loop that may be asleep, e.g. in `dequeue_wait`
    ///
    /// Called by `stop` after the termination flag is set, repeatedly until
    /// the thread exits, so a wake that lands before the loop goes back to
    /// sleep is retried.
    fn interrupt(&self) {}

    /// The worker loop
    ///
    /// Must poll [`WorkerContext::should_stop`] regularly and return once it
    /// is set; `stop` blocks until it does. Returning an error, panicking,
    /// or returning early marks the worker as terminated.
    fn run(&self, ctx: &WorkerContext) -> Result<(), TaskError>;
}

/// Per-thread handle given to [`WorkerTask::run`]
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: usize,
    token: CancellationToken,
}

impl WorkerContext {
    /// Worker index within its pool
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// True once termination was requested (by `stop` or by the task)
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Mark this worker as terminated; the pool monitor will restart it
    #[inline]
    pub fn terminate(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// A [`WorkerTask`] bound to at most one live OS thread
pub struct Worker<T: WorkerTask> {
    id: usize,
    task: Arc<T>,
    observer: Arc<dyn LifecycleObserver>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    thread_id: Arc<AtomicU64>,
}

impl<T: WorkerTask> Worker<T> {
    pub fn new(id: usize, task: T, observer: Arc<dyn LifecycleObserver>) -> Self {
        Self {
            id,
            task: Arc::new(task),
            observer,
            token: CancellationToken::new(),
            handle: None,
            thread_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn start(&mut self) -> WorkerResult<()> {
        if self.handle.is_some() {
            self.reject("already started thread");
            return Err(WorkerError::AlreadyRunning);
        }

        if let Err(e) = self.task.setup() {
            self.task.cleanup();
            self.reject(&format!("setup failed: {}", e));
            return Err(WorkerError::SetupFailed(e));
        }

        // Fresh token: a restarted worker must not inherit the old termination
        self.token = CancellationToken::new();
        self.thread_id.store(0, Ordering::Relaxed);
        let ctx = WorkerContext {
            id: self.id,
            token: self.token.clone(),
        };
        let task = Arc::clone(&self.task);
        let observer = Arc::clone(&self.observer);
        let thread_id = Arc::clone(&self.thread_id);

        let builder = thread::Builder::new().name(format!("vtun-worker-{}", self.id));
        match builder.spawn(move || thread_main(task, ctx, observer, thread_id)) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.observer.on_event(&LifecycleEvent::WorkerStarted { worker: self.id });
                Ok(())
            }
            Err(e) => {
                self.task.cleanup();
                self.reject(&format!("thread spawn failed: {}", e));
                Err(WorkerError::SpawnFailed(e))
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.token.cancel();
            while !handle.is_finished() {
                self.task.interrupt();
                thread::sleep(INTERRUPT_INTERVAL);
            }
            // thread_main catches task panics, so a join error is unexpected
            if handle.join().is_err() {
                self.observer.on_event(&LifecycleEvent::WorkerFailed {
                    worker: self.id,
                    reason: "thread join failed".to_string(),
                });
            }
        }
        self.thread_id.store(0, Ordering::Relaxed);
        self.task.cleanup();
        self.observer.on_event(&LifecycleEvent::WorkerStopped { worker: self.id });
    }

    /// True once termination was requested or the task loop died
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A thread is attached and has not finished
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// OS thread id of the running thread, 0 when none
    ///
    /// Set by the thread itself, so it may read 0 for a moment after `start`.
    pub fn thread_id(&self) -> u64 {
        self.thread_id.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    fn reject(&self, reason: &str) {
        self.observer.on_event(&LifecycleEvent::StartRejected {
            worker: self.id,
            reason: reason.to_string(),
        });
    }
}

impl<T: WorkerTask> Drop for Worker<T> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

impl<T: WorkerTask> std::fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .field("terminated", &self.is_terminated())
            .field("thread_id", &self.thread_id())
            .finish()
    }
}

/// Thread body: run the task and turn any failure into the termination flag
fn thread_main<T: WorkerTask>(
    task: Arc<T>,
    ctx: WorkerContext,
    observer: Arc<dyn LifecycleObserver>,
    thread_id: Arc<AtomicU64>,
) {
    let tid = current_thread_id();
    thread_id.store(tid, Ordering::Relaxed);
    observer.on_event(&LifecycleEvent::ThreadRunning { worker: ctx.id, thread_id: tid });

    let failure = match panic::catch_unwind(AssertUnwindSafe(|| task.run(&ctx))) {
        Ok(Ok(())) if ctx.should_stop() => None,
        Ok(Ok(())) => Some("run loop exited without a stop request".to_string()),
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(TaskError::Panicked(panic_message(payload.as_ref())).to_string()),
    };

    if let Some(reason) = failure {
        ctx.terminate();
        observer.on_event(&LifecycleEvent::WorkerFailed { worker: ctx.id, reason });
    }
    observer.on_event(&LifecycleEvent::ThreadExited { worker: ctx.id, thread_id: tid });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
