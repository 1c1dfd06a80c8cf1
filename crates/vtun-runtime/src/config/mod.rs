//! Runtime configuration
//!
//! Compiled defaults with environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use vtun_runtime::config::RuntimeConfig;
//! use vtun_runtime::wake::WakeKind;
//!
//! let config = RuntimeConfig::from_env()
//!     .num_workers(4)
//!     .wake_kind(WakeKind::Condvar);
//! config.validate()?;
//! let wake = config.wake_strategy()?;
//! let table = config.session_table()?;
//! ```

pub mod defaults;

use crate::session::SessionTable;
use crate::wake::{self, WakeKind, WakeStrategy};
use std::time::Duration;
use vtun_core::env::{env_get, env_get_opt};
use vtun_core::error::ConfigError;
use vtun_core::Ip;

/// Tunnel runtime configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Byte ring capacity
    pub queue_capacity: usize,
    /// How consumers sleep on an empty queue
    pub wake_kind: WakeKind,
    /// Consumer worker threads
    pub num_workers: usize,
    /// Period between `monitor_pool` passes
    pub monitor_interval: Duration,
    pub pool_start: Ip,
    pub pool_end: Ip,
    /// Local tunnel address, excluded from the pool
    pub pool_own: Ip,
    /// Initial session map capacity
    pub session_hint: usize,
    /// Sessions idle this long are expired
    pub session_idle: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `VTUN_QUEUE_CAPACITY` - Ring capacity in bytes
    /// - `VTUN_WAKE_STRATEGY` - `atomic`, `condvar` or `futex`
    /// - `VTUN_NUM_WORKERS` - Consumer workers
    /// - `VTUN_MONITOR_INTERVAL_MS` - Monitor period in milliseconds
    /// - `VTUN_POOL_START` / `VTUN_POOL_END` / `VTUN_POOL_OWN` - Dotted-quad addresses
    /// - `VTUN_SESSION_HINT` - Session map capacity hint
    /// - `VTUN_SESSION_IDLE_SECS` - Idle expiry threshold in seconds
    ///
    /// Values that fail to parse fall back to the default.
    pub fn from_env() -> Self {
        Self {
            queue_capacity: env_get("VTUN_QUEUE_CAPACITY", defaults::QUEUE_CAPACITY),
            wake_kind: wake_kind_from_env(),
            num_workers: env_get("VTUN_NUM_WORKERS", defaults::num_workers()),
            monitor_interval: Duration::from_millis(env_get(
                "VTUN_MONITOR_INTERVAL_MS",
                defaults::MONITOR_INTERVAL_MS,
            )),
            pool_start: env_get("VTUN_POOL_START", defaults::POOL_START),
            pool_end: env_get("VTUN_POOL_END", defaults::POOL_END),
            pool_own: env_get("VTUN_POOL_OWN", defaults::POOL_OWN),
            session_hint: env_get("VTUN_SESSION_HINT", defaults::SESSION_HINT),
            session_idle: Duration::from_secs(env_get(
                "VTUN_SESSION_IDLE_SECS",
                defaults::SESSION_IDLE_SECS,
            )),
        }
    }

    /// Compiled defaults only, no env override.
    pub fn new() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_CAPACITY,
            wake_kind: WakeKind::platform_default(),
            num_workers: defaults::num_workers(),
            monitor_interval: Duration::from_millis(defaults::MONITOR_INTERVAL_MS),
            pool_start: defaults::POOL_START,
            pool_end: defaults::POOL_END,
            pool_own: defaults::POOL_OWN,
            session_hint: defaults::SESSION_HINT,
            session_idle: Duration::from_secs(defaults::SESSION_IDLE_SECS),
        }
    }

    // Builder methods

    pub fn queue_capacity(mut self, bytes: usize) -> Self {
        self.queue_capacity = bytes;
        self
    }

    pub fn wake_kind(mut self, kind: WakeKind) -> Self {
        self.wake_kind = kind;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn monitor_interval(mut self, d: Duration) -> Self {
        self.monitor_interval = d;
        self
    }

    pub fn address_range(mut self, start: Ip, end: Ip, own: Ip) -> Self {
        self.pool_start = start;
        self.pool_end = end;
        self.pool_own = own;
        self
    }

    pub fn session_hint(mut self, n: usize) -> Self {
        self.session_hint = n;
        self
    }

    pub fn session_idle(mut self, d: Duration) -> Self {
        self.session_idle = d;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.num_workers == 0 {
            return Err(ConfigError::Invalid("num_workers must be > 0"));
        }
        if self.num_workers > defaults::MAX_WORKERS {
            return Err(ConfigError::Invalid("num_workers must be <= 256"));
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::Invalid("monitor_interval must be > 0"));
        }
        if self.pool_start > self.pool_end {
            return Err(ConfigError::InvalidRange {
                start: self.pool_start.to_string(),
                end: self.pool_end.to_string(),
            });
        }
        if !WakeKind::available().contains(&self.wake_kind) {
            return Err(ConfigError::Unsupported(self.wake_kind.as_str()));
        }
        Ok(())
    }

    /// Byte ring of `queue_capacity` behind the configured wake strategy
    pub fn wake_strategy(&self) -> Result<Box<dyn WakeStrategy>, ConfigError> {
        wake::with_capacity(self.wake_kind, self.queue_capacity)
    }

    /// Empty session table over the configured address range
    pub fn session_table(&self) -> Result<SessionTable, ConfigError> {
        SessionTable::new(self.pool_start, self.pool_end, self.pool_own, self.session_hint)
    }

    /// Log the effective configuration
    pub fn log(&self) {
        tracing::info!(
            queue_capacity = self.queue_capacity,
            wake = %self.wake_kind,
            num_workers = self.num_workers,
            monitor_interval_ms = self.monitor_interval.as_millis() as u64,
            pool = %format_args!("{}-{}", self.pool_start, self.pool_end),
            own = %self.pool_own,
            session_hint = self.session_hint,
            session_idle_secs = self.session_idle.as_secs(),
            "runtime configuration"
        );
    }
}

fn wake_kind_from_env() -> WakeKind {
    let default = WakeKind::platform_default();
    match env_get_opt::<String>("VTUN_WAKE_STRATEGY") {
        None => default,
        Some(raw) => raw.parse::<WakeKind>().unwrap_or_else(|e| {
            tracing::warn!(error = %e, fallback = %default, "ignoring VTUN_WAKE_STRATEGY");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert_eq!(config.queue_capacity, 65536);
        assert_eq!(config.monitor_interval, Duration::from_secs(1));
        assert_eq!(config.pool_own, Ip::from_octets(10, 8, 0, 1));
        assert!(config.num_workers >= 1 && config.num_workers <= 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("VTUN_SESSION_HINT", "77");
        std::env::set_var("VTUN_POOL_END", "10.8.0.9");
        let config = RuntimeConfig::from_env();
        std::env::remove_var("VTUN_SESSION_HINT");
        std::env::remove_var("VTUN_POOL_END");

        assert_eq!(config.session_hint, 77);
        assert_eq!(config.pool_end, Ip::from_octets(10, 8, 0, 9));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .num_workers(8)
            .queue_capacity(128)
            .wake_kind(WakeKind::Condvar)
            .session_idle(Duration::from_secs(5));

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.queue_capacity, 128);
        assert_eq!(config.wake_kind, WakeKind::Condvar);
        assert_eq!(config.session_idle, Duration::from_secs(5));
    }

    #[test]
    fn test_validation() {
        assert!(RuntimeConfig::new().num_workers(0).validate().is_err());
        assert!(RuntimeConfig::new().num_workers(1000).validate().is_err());
        assert_eq!(
            RuntimeConfig::new().queue_capacity(0).validate(),
            Err(ConfigError::ZeroCapacity)
        );

        let inverted = RuntimeConfig::new().address_range(
            Ip::from_octets(10, 8, 1, 0),
            Ip::from_octets(10, 8, 0, 0),
            Ip::from_octets(10, 8, 0, 1),
        );
        assert!(matches!(inverted.validate(), Err(ConfigError::InvalidRange { .. })));
    }

    #[test]
    fn test_build_components() {
        let config = RuntimeConfig::new()
            .queue_capacity(32)
            .wake_kind(WakeKind::Atomic)
            .address_range(
                Ip::from_octets(10, 8, 0, 0),
                Ip::from_octets(10, 8, 0, 5),
                Ip::from_octets(10, 8, 0, 1),
            );

        let wake = config.wake_strategy().unwrap();
        assert_eq!(wake.kind(), WakeKind::Atomic);
        assert_eq!(wake.enqueue_wake(b"abc"), Ok(3));

        let table = config.session_table().unwrap();
        assert_eq!(table.get_ip_cnt(), 3);
        assert_eq!(table.get_session_cnt(), 0);
    }
}
