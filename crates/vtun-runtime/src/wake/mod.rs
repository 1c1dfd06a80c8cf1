//! Blocking wake strategies over a non-blocking byte queue
//!
//! A producer calls `enqueue_wake()`; consumers call `dequeue_wait()` and
//! sleep when the queue is empty. Three primitives are available:
//!
//! - [`AtomicWake`] - address-keyed atomic wait/notify (`parking_lot_core`)
//! - [`CondvarWake`] - mutex + condition variable + generation counter
//! - [`FutexWake`] - raw Linux futex on a 4-byte word (Linux only)
//!
//! All of them guarantee that a consumer which has registered its wait
//! state observes any later successful enqueue. Spurious returns of
//! `Err(WouldBlock)` are allowed; callers simply retry.

use std::fmt;
use std::str::FromStr;

use vtun_core::error::{ConfigError, QueueError};
use vtun_core::queue::{ByteQueue, SpmcRing};

mod atomic;
mod condvar;

pub use atomic::AtomicWake;
pub use condvar::CondvarWake;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexWake;
    }
}

/// Blocking layer over a [`ByteQueue`]
pub trait WakeStrategy: Send + Sync {
    /// Non-blocking enqueue; on a non-empty write, wake at least one waiter
    ///
    /// Returns `Err(Full)` if the queue rejected the write.
    fn enqueue_wake(&self, data: &[u8]) -> Result<usize, QueueError>;

    /// Wake every currently blocked consumer (shutdown / drain)
    ///
    /// Safe with zero waiters.
    fn wake_all(&self);

    /// Dequeue into `out`, or sleep until the next wake if the queue is empty
    ///
    /// Returns:
    /// - `Ok(n)` if bytes were available
    /// - `Err(WouldBlock)` after sleeping; the caller retries
    ///
    /// Does not loop internally.
    fn dequeue_wait(&self, out: &mut [u8]) -> Result<usize, QueueError>;

    /// Number of consumers currently asleep (hint, may be stale)
    fn waiters(&self) -> usize;

    fn kind(&self) -> WakeKind;
}

/// Selector for the wake primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeKind {
    Atomic,
    Condvar,
    Futex,
}

impl WakeKind {
    /// Kinds usable on the current target
    pub fn available() -> &'static [WakeKind] {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                &[WakeKind::Atomic, WakeKind::Condvar, WakeKind::Futex]
            } else {
                &[WakeKind::Atomic, WakeKind::Condvar]
            }
        }
    }

    /// Futex on Linux, atomic wait/notify elsewhere
    pub fn platform_default() -> Self {
        if cfg!(target_os = "linux") {
            WakeKind::Futex
        } else {
            WakeKind::Atomic
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WakeKind::Atomic => "atomic",
            WakeKind::Condvar => "condvar",
            WakeKind::Futex => "futex",
        }
    }
}

impl fmt::Display for WakeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WakeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atomic" | "atomic-notify" => Ok(WakeKind::Atomic),
            "condvar" | "cv" => Ok(WakeKind::Condvar),
            "futex" => Ok(WakeKind::Futex),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Wrap `queue` in the requested wake strategy
pub fn new_wake_strategy<Q>(kind: WakeKind, queue: Q) -> Result<Box<dyn WakeStrategy>, ConfigError>
where
    Q: ByteQueue + 'static,
{
    match kind {
        WakeKind::Atomic => Ok(Box::new(AtomicWake::new(queue))),
        WakeKind::Condvar => Ok(Box::new(CondvarWake::new(queue))),
        #[cfg(target_os = "linux")]
        WakeKind::Futex => Ok(Box::new(FutexWake::new(queue))),
        #[cfg(not(target_os = "linux"))]
        WakeKind::Futex => Err(ConfigError::Unsupported("futex")),
    }
}

/// Build an [`SpmcRing`] of `capacity` bytes wrapped in the requested strategy
pub fn with_capacity(kind: WakeKind, capacity: usize) -> Result<Box<dyn WakeStrategy>, ConfigError> {
    new_wake_strategy(kind, SpmcRing::new(capacity)?)
}
