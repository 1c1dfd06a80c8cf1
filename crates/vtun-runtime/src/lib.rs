//! # vtun-runtime
//!
//! Concurrency substrate for a user-space tunnel endpoint.
//!
//! This crate provides:
//! - Wake strategies turning the non-blocking byte queue into a blocking
//!   multi-consumer channel (atomic wait/notify, condvar, Linux futex)
//! - The bidirectional session table with its virtual address pool
//! - Worker threads and a self-healing worker pool
//! - Environment-driven configuration

pub mod config;
pub mod session;
pub mod thread;
pub mod wake;

// Re-exports
pub use config::RuntimeConfig;
pub use session::{ForwardKey, ReverseKey, Session, SessionRef, SessionSnapshot, SessionTable};
pub use thread::{
    LifecycleEvent, LifecycleObserver, MonitorReport, NoopObserver, TracingObserver, Worker,
    WorkerContext, WorkerPool, WorkerTask,
};
pub use wake::{new_wake_strategy, AtomicWake, CondvarWake, WakeKind, WakeStrategy};

#[cfg(target_os = "linux")]
pub use wake::FutexWake;
