//! Atomic wait/notify wake strategy
//!
//! Flag word semantics:
//! - 0 = consumers may sleep
//! - 1 = data (or a wake_all) was published since the last reset
//!
//! Waiting is address-keyed parking from `parking_lot_core`: the flag is
//! re-validated under the parking bucket lock, so a notify that races with
//! the decision to sleep is never lost.
//!
//! Consumer, on an empty dequeue:
//! 1. Store 0 to the flag
//! 2. Retry the dequeue (closes the window between the first failed
//!    dequeue and the reset)
//! 3. Park while the flag is still 0
//!
//! Producer, on a non-empty enqueue:
//! 1. Store 1 to the flag
//! 2. Unpark one waiter

use super::{WakeKind, WakeStrategy};
use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use vtun_core::error::QueueError;
use vtun_core::queue::ByteQueue;

pub struct AtomicWake<Q> {
    queue: Q,
    flag: AtomicU32,
    waiters: AtomicUsize,
}

impl<Q: ByteQueue> AtomicWake<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            flag: AtomicU32::new(0),
            waiters: AtomicUsize::new(0),
        }
    }

    /// The wrapped queue
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Parking key: the flag's address
    #[inline]
    fn key(&self) -> usize {
        &self.flag as *const AtomicU32 as usize
    }

    fn wait_while_clear(&self) {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        // Safety: the key is the address of a field we own, and the
        // callbacks neither panic nor call back into parking_lot.
        unsafe {
            parking_lot_core::park(
                self.key(),
                || self.flag.load(Ordering::Acquire) == 0,
                || {},
                |_, _| {},
                DEFAULT_PARK_TOKEN,
                None,
            );
        }
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<Q: ByteQueue> WakeStrategy for AtomicWake<Q> {
    fn enqueue_wake(&self, data: &[u8]) -> Result<usize, QueueError> {
        let n = self.queue.enqueue(data)?;
        if n > 0 {
            self.flag.store(1, Ordering::SeqCst);
            // Safety: see wait_while_clear
            unsafe {
                parking_lot_core::unpark_one(self.key(), |_| DEFAULT_UNPARK_TOKEN);
            }
        }
        Ok(n)
    }

    fn wake_all(&self) {
        self.flag.store(1, Ordering::SeqCst);
        // Safety: see wait_while_clear
        unsafe {
            parking_lot_core::unpark_all(self.key(), DEFAULT_UNPARK_TOKEN);
        }
    }

    fn dequeue_wait(&self, out: &mut [u8]) -> Result<usize, QueueError> {
        match self.queue.dequeue(out) {
            Err(QueueError::Empty) => {}
            other => return other,
        }

        self.flag.store(0, Ordering::SeqCst);
        match self.queue.dequeue(out) {
            Err(QueueError::Empty) => {}
            other => return other,
        }

        self.wait_while_clear();
        Err(QueueError::WouldBlock)
    }

    fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    fn kind(&self) -> WakeKind {
        WakeKind::Atomic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use vtun_core::queue::SpmcRing;

    #[test]
    fn test_flag_follows_publish_and_reset() {
        let wake = Arc::new(AtomicWake::new(SpmcRing::new(8).unwrap()));
        wake.enqueue_wake(b"x").unwrap();
        assert_eq!(wake.flag.load(Ordering::SeqCst), 1);

        let mut out = [0u8; 8];
        assert_eq!(wake.dequeue_wait(&mut out), Ok(1));

        // Next empty dequeue resets the flag and sleeps until wake_all.
        let w = Arc::clone(&wake);
        let h = thread::spawn(move || {
            let mut out = [0u8; 8];
            w.dequeue_wait(&mut out)
        });
        while !h.is_finished() {
            wake.wake_all();
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(h.join().unwrap(), Err(QueueError::WouldBlock));
        assert_eq!(wake.waiters(), 0);
    }

    #[test]
    fn test_data_found_on_recheck() {
        let wake = AtomicWake::new(SpmcRing::new(8).unwrap());
        wake.queue().enqueue(b"hi").unwrap();
        let mut out = [0u8; 8];
        assert_eq!(wake.dequeue_wait(&mut out), Ok(2));
        assert_eq!(wake.kind(), WakeKind::Atomic);
    }
}
