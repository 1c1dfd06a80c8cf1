//! Worker threads and their supervising pool
//!
//! A [`Worker`] runs one [`WorkerTask`] on a dedicated OS thread:
//! `idle -> running -> (terminated | stopped)`. Termination is cooperative
//! through the worker's [`CancellationToken`](vtun_core::CancellationToken);
//! failures inside the task loop are caught at the thread boundary and
//! turned into that same flag, which [`WorkerPool::monitor_pool`] picks up.

mod observer;
mod pool;
mod worker;

pub use observer::{LifecycleEvent, LifecycleObserver, NoopObserver, TracingObserver};
pub use pool::{MonitorReport, WorkerPool};
pub use worker::{Worker, WorkerContext, WorkerTask};

#[cfg(test)]
pub(crate) use observer::RecordingObserver;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// Kernel thread id of the calling thread
        pub fn current_thread_id() -> u64 {
            // Safety: gettid takes no arguments and cannot fail
            unsafe { libc::syscall(libc::SYS_gettid) as u64 }
        }
    } else {
        /// Stable per-thread id derived from `std::thread::ThreadId`
        pub fn current_thread_id() -> u64 {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::thread::current().id().hash(&mut hasher);
            hasher.finish().max(1)
        }
    }
}
