//! Mutex + condition variable wake strategy
//!
//! The mutex protects a monotonically increasing generation counter. Both
//! the queue access and the generation bump happen under it, and a waiter
//! sleeps until the generation moves past the value it captured after its
//! failed dequeue. A notify landing between the failed dequeue and the wait
//! still bumps the generation, so it cannot be missed.

use super::{WakeKind, WakeStrategy};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use vtun_core::error::QueueError;
use vtun_core::queue::ByteQueue;

pub struct CondvarWake<Q> {
    queue: Q,
    generation: Mutex<u64>,
    condvar: Condvar,
    waiters: AtomicUsize,
}

impl<Q: ByteQueue> CondvarWake<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            generation: Mutex::new(0),
            condvar: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// The wrapped queue
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Current generation (for diagnostics)
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }
}

impl<Q: ByteQueue> WakeStrategy for CondvarWake<Q> {
    fn enqueue_wake(&self, data: &[u8]) -> Result<usize, QueueError> {
        let mut generation = self.generation.lock();
        let n = self.queue.enqueue(data)?;
        if n > 0 {
            *generation = generation.wrapping_add(1);
            // Signal only once the bytes are in and the lock is released
            drop(generation);
            self.condvar.notify_one();
        }
        Ok(n)
    }

    fn wake_all(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        drop(generation);
        self.condvar.notify_all();
    }

    fn dequeue_wait(&self, out: &mut [u8]) -> Result<usize, QueueError> {
        let mut generation = self.generation.lock();
        match self.queue.dequeue(out) {
            Err(QueueError::Empty) => {}
            other => return other,
        }

        let seen = *generation;
        self.waiters.fetch_add(1, Ordering::SeqCst);
        while *generation == seen {
            self.condvar.wait(&mut generation);
        }
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        Err(QueueError::WouldBlock)
    }

    fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    fn kind(&self) -> WakeKind {
        WakeKind::Condvar
    }
}
