//! Compiled defaults, overridable through `VTUN_*` environment variables

use vtun_core::Ip;

/// Ring capacity in bytes
pub const QUEUE_CAPACITY: usize = 64 * 1024;

/// Upper bound for the default worker count
pub const MAX_DEFAULT_WORKERS: usize = 16;

/// Hard upper bound for `num_workers`
pub const MAX_WORKERS: usize = 256;

pub const MONITOR_INTERVAL_MS: u64 = 1000;

/// Virtual address range (both ends excluded from the pool)
pub const POOL_START: Ip = Ip::from_octets(10, 8, 0, 0);
pub const POOL_END: Ip = Ip::from_octets(10, 8, 0, 255);

/// Local tunnel address, never handed out
pub const POOL_OWN: Ip = Ip::from_octets(10, 8, 0, 1);

/// Initial map capacity of the session table
pub const SESSION_HINT: usize = 1024;

pub const SESSION_IDLE_SECS: u64 = 300;

/// min(cpus, MAX_DEFAULT_WORKERS)
pub fn num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(MAX_DEFAULT_WORKERS)
}
