//! Monotonic seconds for session timestamps

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use nix::time::{clock_gettime, ClockId};

        /// Seconds on CLOCK_MONOTONIC
        pub fn monotonic_secs() -> u64 {
            clock_gettime(ClockId::CLOCK_MONOTONIC)
                .map(|ts| ts.tv_sec() as u64)
                .unwrap_or(0)
        }
    } else {
        use std::sync::OnceLock;
        use std::time::Instant;

        static EPOCH: OnceLock<Instant> = OnceLock::new();

        /// Seconds since the first call in this process
        pub fn monotonic_secs() -> u64 {
            EPOCH.get_or_init(Instant::now).elapsed().as_secs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_does_not_go_backwards() {
        let a = monotonic_secs();
        let b = monotonic_secs();
        assert!(b >= a);
    }
}
