//! Linux futex wake strategy
//!
//! Futex word semantics:
//! - 0 = consumers may sleep
//! - 1 = data (or a wake_all) was published since the last reset
//!
//! When a consumer finds the queue empty:
//! 1. Store 0 to the futex word
//! 2. Retry the dequeue
//! 3. Increment the waiter count
//! 4. FUTEX_WAIT (kernel sleeps only if the word is still 0)
//! 5. Decrement the waiter count on return
//!
//! When waking:
//! 1. Store 1 to the futex word
//! 2. FUTEX_WAKE 1 (enqueue) or all (wake_all), skipped when nobody waits

use super::{WakeKind, WakeStrategy};
use nix::errno::Errno;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use vtun_core::error::QueueError;
use vtun_core::queue::ByteQueue;

pub struct FutexWake<Q> {
    queue: Q,

    /// Futex word: 0 = sleep, 1 = wake pending (AtomicU32 is 4-byte aligned)
    futex: AtomicU32,

    /// Count of sleeping consumers
    waiters: AtomicUsize,
}

impl<Q: ByteQueue> FutexWake<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            futex: AtomicU32::new(0),
            waiters: AtomicUsize::new(0),
        }
    }

    /// The wrapped queue
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// FUTEX_WAIT while the word equals 0
    ///
    /// EAGAIN (word already changed), EINTR and genuine wakes all end the
    /// same way: the caller retries its dequeue.
    fn futex_wait(&self) {
        self.waiters.fetch_add(1, Ordering::SeqCst);

        // Safety: the word lives as long as self; null timeout waits forever.
        let result = unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,                               // Expected value
                std::ptr::null::<libc::timespec>(), // No timeout
                std::ptr::null::<u32>(),            // uaddr2 (unused)
                0u32,                               // val3 (unused)
            )
        };
        if result != 0 {
            let errno = Errno::last();
            debug_assert!(
                matches!(errno, Errno::EAGAIN | Errno::EINTR),
                "FUTEX_WAIT failed: {}",
                errno
            );
        }

        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    fn futex_wake(&self, count: i32) {
        self.futex.store(1, Ordering::SeqCst);

        if self.waiters.load(Ordering::SeqCst) == 0 {
            return; // No one to wake
        }

        // Safety: plain FUTEX_WAKE on our own word
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                count,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl<Q: ByteQueue> WakeStrategy for FutexWake<Q> {
    fn enqueue_wake(&self, data: &[u8]) -> Result<usize, QueueError> {
        let n = self.queue.enqueue(data)?;
        if n > 0 {
            self.futex_wake(1);
        }
        Ok(n)
    }

    fn wake_all(&self) {
        self.futex_wake(i32::MAX);
    }

    fn dequeue_wait(&self, out: &mut [u8]) -> Result<usize, QueueError> {
        match self.queue.dequeue(out) {
            Err(QueueError::Empty) => {}
            other => return other,
        }

        self.futex.store(0, Ordering::SeqCst);
        match self.queue.dequeue(out) {
            Err(QueueError::Empty) => {}
            other => return other,
        }

        self.futex_wait();
        Err(QueueError::WouldBlock)
    }

    fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    fn kind(&self) -> WakeKind {
        WakeKind::Futex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};
    use vtun_core::queue::SpmcRing;

    #[test]
    fn test_pending_word_returns_immediately() {
        // Word already 1 and no reset in between: FUTEX_WAIT fails with EAGAIN.
        let wake = FutexWake::new(SpmcRing::new(8).unwrap());
        wake.futex.store(1, Ordering::SeqCst);
        let start = Instant::now();
        wake.futex_wait();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(wake.waiters(), 0);
    }

    #[test]
    fn test_wake_one_consumer() {
        let wake = Arc::new(FutexWake::new(SpmcRing::new(8).unwrap()));
        let w = Arc::clone(&wake);
        let h = thread::spawn(move || {
            let mut out = [0u8; 8];
            loop {
                if let Ok(n) = w.dequeue_wait(&mut out) {
                    return n;
                }
            }
        });

        while wake.waiters() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(wake.enqueue_wake(b"abc"), Ok(3));
        assert_eq!(h.join().unwrap(), 3);
        assert_eq!(wake.kind(), WakeKind::Futex);
    }
}
