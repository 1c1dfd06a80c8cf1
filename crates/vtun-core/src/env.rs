//! Environment variable helpers
//!
//! All runtime knobs are plain `VTUN_*` environment variables parsed through
//! `FromStr`, falling back to the compiled default on absence or parse error.
//!
//! ```ignore
//! use vtun_core::env::{env_get, env_get_bool};
//!
//! let workers: usize = env_get("VTUN_NUM_WORKERS", 4);
//! let trace: bool = env_get_bool("VTUN_TRACE_QUEUE", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other set value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// `Some(T)` if the variable is set and parses, `None` otherwise
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::Ip;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__VTUN_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        assert!(env_get_bool("__VTUN_TEST_UNSET__", true));
        assert!(env_get_opt::<usize>("__VTUN_TEST_UNSET__").is_none());
        assert_eq!(env_get_str("__VTUN_TEST_UNSET__", "futex"), "futex");
        assert!(!env_is_set("__VTUN_TEST_UNSET__"));
    }

    #[test]
    fn test_env_get_parses_ip() {
        std::env::set_var("__VTUN_TEST_IP__", " 10.9.0.1 ");
        let ip: Ip = env_get("__VTUN_TEST_IP__", Ip::UNSPECIFIED);
        assert_eq!(ip, Ip::from_octets(10, 9, 0, 1));
        std::env::remove_var("__VTUN_TEST_IP__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for (raw, expected) in [("1", true), ("TRUE", true), ("on", true), ("0", false), ("nope", false)] {
            std::env::set_var("__VTUN_TEST_BOOL__", raw);
            assert_eq!(env_get_bool("__VTUN_TEST_BOOL__", !expected), expected, "{}", raw);
        }
        std::env::remove_var("__VTUN_TEST_BOOL__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__VTUN_TEST_INVALID__", "lots");
        let val: usize = env_get("__VTUN_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__VTUN_TEST_INVALID__");
    }
}
