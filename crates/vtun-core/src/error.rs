//! Error types for the vtun substrate
//!
//! Every failure mode here is expected and recoverable at the component
//! boundary. Nothing in the queue, table or worker code panics on these.

use thiserror::Error;

/// Result type for session table operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for worker and pool lifecycle operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors from the byte queue and wake strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Not enough free space for the whole write
    #[error("queue full")]
    Full,

    /// Nothing to read (non-blocking dequeue)
    #[error("queue empty")]
    Empty,

    /// Queue was empty; the caller slept until a wake and must retry
    #[error("queue empty, woke up - retry")]
    WouldBlock,
}

/// Errors from the session table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Forward key is already mapped to a live session
    #[error("session already exists")]
    Duplicate,

    /// No free virtual address left in the pool
    #[error("address pool exhausted")]
    PoolExhausted,

    /// Forward or reverse key is not mapped
    #[error("session not found")]
    NotFound,
}

/// Invalid construction parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("queue capacity must be at least 1 byte")]
    ZeroCapacity,

    #[error("address range start {start} is above end {end}")]
    InvalidRange { start: String, end: String },

    #[error("unknown wake strategy `{0}`")]
    UnknownStrategy(String),

    #[error("wake strategy `{0}` is not supported on this platform")]
    Unsupported(&'static str),

    #[error("{0}")]
    Invalid(&'static str),
}

/// Failure reported by user task code running on a worker
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Convenience constructor for ad-hoc failures
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Message(message.into())
    }
}

/// Worker lifecycle errors
#[derive(Debug, Error)]
pub enum WorkerError {
    /// `start` called while the worker thread is still alive
    #[error("worker already running")]
    AlreadyRunning,

    /// The task's setup hook refused to start
    #[error("worker setup failed: {0}")]
    SetupFailed(#[source] TaskError),

    /// The OS refused to create the thread
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(#[source] std::io::Error),
}

/// Worker pool errors
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool already started")]
    AlreadyStarted,

    #[error("worker pool not started")]
    NotStarted,

    /// A worker failed to start; every previously started worker was stopped
    #[error("worker {index} failed to start: {source}")]
    StartFailed {
        index: usize,
        #[source]
        source: WorkerError,
    },

    /// Monitoring found dead workers that could not be restarted; the pool is stopped
    #[error("{failed} of {dead} dead workers could not be restarted")]
    RecoveryFailed { dead: usize, failed: usize },
}
