//! # vtun-core
//!
//! Core types for the vtun packet-processing substrate.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Wake strategies, the session table and worker supervision live in
//! `vtun-runtime`.
//!
//! ## Modules
//!
//! - `spinlock` - `SpinLock` and `RwSpinLock` for short critical sections
//! - `ip` - IPv4 address type used in session keys
//! - `queue` - `ByteQueue` contract and the `SpmcRing` implementation
//! - `cancel` - Cancellation token for cooperative worker termination
//! - `error` - Error types
//! - `env` - Environment variable utilities

pub mod spinlock;
pub mod ip;
pub mod queue;
pub mod cancel;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use spinlock::{RwSpinLock, SpinLock};
pub use ip::Ip;
pub use queue::{ByteQueue, SpmcRing};
pub use cancel::CancellationToken;
pub use error::{
    ConfigError, PoolError, QueueError, SessionError, SessionResult, TaskError, WorkerError,
    WorkerResult,
};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
