//! # vtun - tunnel endpoint concurrency substrate
//!
//! Building blocks for the packet path of a user-space tunnel server.
//!
//! ## Features
//!
//! - **Blocking byte queue**: one producer, many consumers, with three
//!   interchangeable wake primitives (atomic wait/notify, condvar, futex)
//! - **Session table**: client endpoint <-> virtual IP mapping with an
//!   address pool, consistent under concurrent add/delete/lookup
//! - **Worker supervision**: dedicated OS threads with cooperative
//!   termination and periodic restart of dead workers
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vtun::{RuntimeConfig, TracingObserver, WorkerPool};
//!
//! vtun::init_logging();
//! let config = RuntimeConfig::from_env();
//! config.validate()?;
//!
//! let queue: Arc<dyn vtun::WakeStrategy> = Arc::from(config.wake_strategy()?);
//! let sessions = Arc::new(config.session_table()?);
//!
//! let tasks = (0..config.num_workers).map(|_| MyConsumer::new(&queue, &sessions));
//! let mut pool = WorkerPool::new(tasks, Arc::new(TracingObserver));
//! pool.start_pool()?;
//! loop {
//!     std::thread::sleep(config.monitor_interval);
//!     pool.monitor_pool()?;
//! }
//! ```

// Re-export core types
pub use vtun_core::{
    ByteQueue,
    CancellationToken,
    ConfigError,
    Ip,
    PoolError,
    QueueError,
    RwSpinLock,
    SessionError,
    SessionResult,
    SpinLock,
    SpmcRing,
    TaskError,
    WorkerError,
    WorkerResult,
};

// Re-export env utilities
pub use vtun_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

// Re-export runtime types
pub use vtun_runtime::{
    new_wake_strategy,
    AtomicWake,
    CondvarWake,
    ForwardKey,
    LifecycleEvent,
    LifecycleObserver,
    MonitorReport,
    NoopObserver,
    ReverseKey,
    RuntimeConfig,
    Session,
    SessionRef,
    SessionSnapshot,
    SessionTable,
    TracingObserver,
    WakeKind,
    WakeStrategy,
    Worker,
    WorkerContext,
    WorkerPool,
    WorkerTask,
};

#[cfg(target_os = "linux")]
pub use vtun_runtime::FutexWake;

pub use vtun_runtime::{config, session, thread, wake};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "VTUN_LOG";

/// Install a `fmt` subscriber filtered by `VTUN_LOG` (default `info`)
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_once() {
        init_logging();
        assert!(!init_logging());
    }

    #[test]
    fn test_facade_wiring() {
        let config = RuntimeConfig::new().queue_capacity(16).wake_kind(WakeKind::Condvar);
        let queue = config.wake_strategy().unwrap();
        assert_eq!(queue.enqueue_wake(b"ping"), Ok(4));
        let mut out = [0u8; 16];
        assert_eq!(queue.dequeue_wait(&mut out), Ok(4));
        assert_eq!(&out[..4], b"ping");
    }
}
